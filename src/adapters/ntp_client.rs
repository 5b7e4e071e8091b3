//! Trusted time adapter.
//! SNTP client for AFIP's time service with ordered failover to public pools.
//!
//! The time source only reports what it could obtain; falling back to the
//! local clock is the caller's decision.

use crate::domain::constants::NTP_PORT;
use crate::infra::error::{WsaaError, WsaaResult};
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{lookup_host, UdpSocket};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Size of an SNTP packet without extensions
const SNTP_PACKET_LEN: usize = 48;

/// LI = 0, VN = 3, Mode = 3 (client)
const SNTP_CLIENT_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;
const ORIGIN_OFFSET: usize = 24;
const TRANSMIT_OFFSET: usize = 40;

/// Source of the current time used for TRA stamps and ticket validity checks.
pub trait TimeSource {
    async fn now(&self) -> WsaaResult<DateTime<Utc>>;
}

/// SNTP client over an ordered server list
#[derive(Debug, Clone)]
pub struct NtpTimeSource {
    primary: Option<String>,
    fallbacks: Vec<String>,
    timeout: Duration,
}

impl NtpTimeSource {
    #[must_use]
    pub fn new(primary: Option<String>, fallbacks: Vec<String>, timeout: Duration) -> Self {
        Self {
            primary: primary.filter(|p| !p.trim().is_empty()),
            fallbacks,
            timeout,
        }
    }

    /// Servers in the order they are tried.
    #[must_use]
    pub fn servers(&self) -> Vec<&str> {
        self.primary
            .iter()
            .chain(self.fallbacks.iter())
            .map(String::as_str)
            .collect()
    }

    /// Query a single server.
    pub async fn query(&self, server: &str) -> WsaaResult<DateTime<Utc>> {
        let target = socket_target(server);
        let addr = tokio::time::timeout(self.timeout, lookup_host(target.as_str()))
            .await
            .map_err(|_| WsaaError::TimeSource(format!("{server}: DNS lookup timed out")))?
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))?
            .next()
            .ok_or_else(|| WsaaError::TimeSource(format!("{server}: no address found")))?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))?;

        let request = client_packet(SystemTime::now());
        socket
            .send(&request)
            .await
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))?;

        let mut reply = [0u8; 512];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut reply))
            .await
            .map_err(|_| {
                WsaaError::TimeSource(format!(
                    "{server}: no reply within {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))?;

        let transmitted = request.get(TRANSMIT_OFFSET..).unwrap_or_default();
        parse_server_packet(reply.get(..len).unwrap_or_default(), transmitted)
            .map_err(|e| WsaaError::TimeSource(format!("{server}: {e}")))
    }

    /// Query every configured server, reporting each result (used for diagnostics).
    pub async fn test_server_connectivity(&self) -> Vec<(String, WsaaResult<DateTime<Utc>>)> {
        let mut results = Vec::new();
        for server in self.servers() {
            results.push((server.to_string(), self.query(server).await));
        }
        results
    }
}

impl TimeSource for NtpTimeSource {
    async fn now(&self) -> WsaaResult<DateTime<Utc>> {
        let servers = self.servers();
        if servers.is_empty() {
            return Err(WsaaError::TimeSource(
                "No time servers configured".to_string(),
            ));
        }

        let mut last_err: Option<WsaaError> = None;
        for (idx, server) in servers.iter().enumerate() {
            log::debug!("time server attempt {}: {server}", idx + 1);
            match self.query(server).await {
                Ok(now) => {
                    log::debug!("time from {server}: {now}");
                    return Ok(now);
                }
                Err(e) => {
                    log::warn!("time server {server} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| WsaaError::TimeSource("All servers failed".into())))
    }
}

/// Local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    async fn now(&self) -> WsaaResult<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    async fn now(&self) -> WsaaResult<DateTime<Utc>> {
        Ok(self.0)
    }
}

/// Time source chosen by configuration.
#[derive(Debug, Clone)]
pub enum TrustedClock {
    Network(NtpTimeSource),
    Local(SystemTimeSource),
}

impl TimeSource for TrustedClock {
    async fn now(&self) -> WsaaResult<DateTime<Utc>> {
        match self {
            Self::Network(ntp) => ntp.now().await,
            Self::Local(local) => local.now().await,
        }
    }
}

/// `host` gets the default NTP port; `host:port` and `[v6]:port` are used as given.
fn socket_target(server: &str) -> String {
    let server = server.trim();
    if server.starts_with('[') {
        if server.contains("]:") {
            server.to_string()
        } else {
            format!("{server}:{NTP_PORT}")
        }
    } else {
        match server.matches(':').count() {
            0 => format!("{server}:{NTP_PORT}"),
            1 => server.to_string(),
            _ => format!("[{server}]:{NTP_PORT}"),
        }
    }
}

/// Client-mode request carrying our transmit time, which the server echoes as origin.
fn client_packet(now: SystemTime) -> [u8; SNTP_PACKET_LEN] {
    let mut packet = [0u8; SNTP_PACKET_LEN];
    packet[0] = SNTP_CLIENT_HEADER;

    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seconds = (since_epoch.as_secs() as i64 + NTP_UNIX_OFFSET) as u32;
    let fraction = ((u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000) as u32;
    packet[TRANSMIT_OFFSET..TRANSMIT_OFFSET + 4].copy_from_slice(&seconds.to_be_bytes());
    packet[TRANSMIT_OFFSET + 4..].copy_from_slice(&fraction.to_be_bytes());
    packet
}

/// Validate a server reply and extract its transmit timestamp.
fn parse_server_packet(reply: &[u8], sent_transmit: &[u8]) -> Result<DateTime<Utc>, String> {
    let packet: &[u8; SNTP_PACKET_LEN] = reply
        .get(..SNTP_PACKET_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| format!("short reply ({} bytes)", reply.len()))?;

    let mode = packet[0] & 0x07;
    if mode != MODE_SERVER {
        return Err(format!("unexpected mode {mode}"));
    }
    if packet[1] == 0 {
        let code = String::from_utf8_lossy(&packet[12..16]).into_owned();
        return Err(format!("kiss-o'-death ({code})"));
    }
    if packet[ORIGIN_OFFSET..ORIGIN_OFFSET + 8] != *sent_transmit {
        return Err("reply does not match our request".to_string());
    }

    let seconds = u32::from_be_bytes([
        packet[TRANSMIT_OFFSET],
        packet[TRANSMIT_OFFSET + 1],
        packet[TRANSMIT_OFFSET + 2],
        packet[TRANSMIT_OFFSET + 3],
    ]);
    let fraction = u32::from_be_bytes([
        packet[TRANSMIT_OFFSET + 4],
        packet[TRANSMIT_OFFSET + 5],
        packet[TRANSMIT_OFFSET + 6],
        packet[TRANSMIT_OFFSET + 7],
    ]);
    if seconds == 0 && fraction == 0 {
        return Err("empty transmit timestamp".to_string());
    }

    // Era 1 (from 2036-02-07) wraps the 32-bit seconds field; MSB clear means the later era.
    let mut ntp_seconds = i64::from(seconds);
    if seconds & 0x8000_0000 == 0 {
        ntp_seconds += 1 << 32;
    }
    let nanos = ((u64::from(fraction) * 1_000_000_000) >> 32) as u32;

    DateTime::from_timestamp(ntp_seconds - NTP_UNIX_OFFSET, nanos)
        .ok_or_else(|| "timestamp out of range".to_string())
}
