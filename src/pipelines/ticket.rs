//! `TicketManager`: returns a usable WSAA ticket for one web service.
//!
//! Steps:
//! 1. Read the cached TA for the service (skipped with `force_renewal`)
//! 2. Reuse it when still valid against a fresh trusted-time reading
//! 3. Otherwise build a TRA stamped with another fresh reading (`TraBuilder`)
//! 4. Sign it as CMS (`CmsSigner`) and submit it (`LoginTransport`)
//! 5. Parse the TA, then persist the exact XML (`TicketCache`)
//!
//! Nothing is written unless a ticket was obtained and parsed, so a failed
//! renewal leaves any previous ticket in place.

use crate::adapters::cms_signer::{
    CmsSigner, NativeCmsSigner, OpenSslCommandSigner, SignerBackend,
};
use crate::adapters::ntp_client::{NtpTimeSource, SystemTimeSource, TimeSource, TrustedClock};
use crate::adapters::wsaa_client::{LoginTransport, WsaaHttpClient};
use crate::domain::ticket::{Credentials, TicketRequest, TicketResponse};
use crate::domain::time::local_offset_at;
use crate::domain::types::{Environment, WebService};
use crate::infra::config::{SignerKind, WsaaSettings};
use crate::infra::error::WsaaResult;
use crate::services::{parse_ticket_response, TicketCache, TraBuilder};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::path::PathBuf;

/// What to request and how to stamp it
#[derive(Debug, Clone)]
pub struct TicketSettings {
    pub service: WebService,
    pub environment: Environment,
    pub source: Option<String>,
    /// Overrides the local offset of each instant when set
    pub utc_offset: Option<FixedOffset>,
    /// Ignore the cached ticket and always ask WSAA
    pub force_renewal: bool,
}

impl TicketSettings {
    #[must_use]
    pub fn new(service: WebService, environment: Environment) -> Self {
        Self {
            service,
            environment,
            source: None,
            utc_offset: None,
            force_renewal: false,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_utc_offset(mut self, offset: Option<FixedOffset>) -> Self {
        self.utc_offset = offset;
        self
    }

    #[must_use]
    pub fn with_force_renewal(mut self, force: bool) -> Self {
        self.force_renewal = force;
        self
    }

    /// TRA for these settings, generated at `now`.
    #[must_use]
    pub fn ticket_request(&self, now: DateTime<Utc>) -> TicketRequest {
        let offset = self.utc_offset.unwrap_or_else(|| local_offset_at(now));
        TicketRequest::new(
            self.service.clone(),
            self.environment,
            self.source.as_deref(),
            now.with_timezone(&offset),
        )
    }
}

impl From<&WsaaSettings> for TicketSettings {
    fn from(settings: &WsaaSettings) -> Self {
        Self::new(settings.service.clone(), settings.environment)
            .with_source(settings.source.clone())
            .with_utc_offset(settings.utc_offset)
            .with_force_renewal(settings.force_renewal)
    }
}

/// Where the returned ticket came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOrigin {
    Cached,
    Issued,
}

impl std::fmt::Display for TicketOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached => f.write_str("cached"),
            Self::Issued => f.write_str("issued"),
        }
    }
}

/// Result of [`TicketManager::get_ticket`]
#[derive(Debug, Clone)]
pub struct TicketOutcome {
    pub ticket: TicketResponse,
    pub origin: TicketOrigin,
    /// Location of the cached TA file
    pub path: PathBuf,
}

impl TicketOutcome {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.ticket.credentials()
    }
}

/// Current time from `clock`, or the local clock if it cannot answer.
pub async fn trusted_now<T: TimeSource>(clock: &T) -> DateTime<Utc> {
    match clock.now().await {
        Ok(now) => now,
        Err(e) => {
            log::warn!("Trusted time unavailable ({e}); using local clock");
            Utc::now()
        }
    }
}

/// Time source selected by `use_network_time`.
#[must_use]
pub fn trusted_clock(settings: &WsaaSettings) -> TrustedClock {
    if settings.use_network_time {
        TrustedClock::Network(NtpTimeSource::new(
            settings.primary_time_server.clone(),
            settings.fallback_time_servers.clone(),
            settings.time_server_timeout,
        ))
    } else {
        TrustedClock::Local(SystemTimeSource)
    }
}

enum CacheState {
    Missing,
    Valid(TicketResponse, TimeDelta),
    Expired,
}

pub struct TicketManager<T, S, L> {
    settings: TicketSettings,
    cache: TicketCache,
    clock: T,
    signer: S,
    transport: L,
    builder: TraBuilder,
}

impl TicketManager<TrustedClock, SignerBackend, WsaaHttpClient> {
    /// Wire the production adapters from resolved settings.
    ///
    /// Certificate, key and CA bundle problems surface here, before any
    /// network activity.
    pub fn from_settings(settings: &WsaaSettings) -> WsaaResult<Self> {
        let clock = trusted_clock(settings);
        let signer = match settings.signer {
            SignerKind::OpenSslCli => SignerBackend::Command(
                OpenSslCommandSigner::new(&settings.certificate, &settings.private_key)?
                    .with_program(&settings.openssl_path)
                    .with_passphrase(settings.passphrase.clone())
                    .with_timeout(settings.signing_timeout),
            ),
            SignerKind::Native => SignerBackend::Native(NativeCmsSigner::new(
                &settings.certificate,
                &settings.private_key,
                settings.passphrase.as_deref(),
            )?),
        };

        let transport = WsaaHttpClient::new(
            &settings.wsdl,
            settings.ca_cert.as_deref(),
            settings.network_timeout,
        )?;

        Ok(Self::new(
            TicketSettings::from(settings),
            TicketCache::new(&settings.output_dir),
            clock,
            signer,
            transport,
        ))
    }
}

impl<T: TimeSource, S: CmsSigner, L: LoginTransport> TicketManager<T, S, L> {
    #[must_use]
    pub fn new(settings: TicketSettings, cache: TicketCache, clock: T, signer: S, transport: L) -> Self {
        Self {
            settings,
            cache,
            clock,
            signer,
            transport,
            builder: TraBuilder::new(),
        }
    }

    /// Return a valid ticket, reusing the cached one when possible.
    pub async fn get_ticket(&self) -> WsaaResult<TicketOutcome> {
        let service = &self.settings.service;
        let path = self.cache.path_for(service);

        if self.settings.force_renewal {
            log::info!("Renewal forced for {service}");
        } else {
            match self.inspect_cache().await {
                CacheState::Valid(ticket, remaining) => {
                    log::info!(
                        "Reusing ticket for {service} (expires {}, {} min left)",
                        ticket.expiration_time,
                        remaining.num_minutes()
                    );
                    return Ok(TicketOutcome {
                        ticket,
                        origin: TicketOrigin::Cached,
                        path,
                    });
                }
                CacheState::Expired => log::info!("Cached ticket for {service} expired"),
                CacheState::Missing => log::info!("No cached ticket for {service}"),
            }
        }

        let ticket = self.request_ticket().await?;
        Ok(TicketOutcome {
            ticket,
            origin: TicketOrigin::Issued,
            path,
        })
    }

    async fn inspect_cache(&self) -> CacheState {
        let ticket = match self.cache.load(&self.settings.service) {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return CacheState::Missing,
            Err(e) => {
                log::warn!("{e}; requesting a new ticket");
                return CacheState::Missing;
            }
        };

        let now = trusted_now(&self.clock).await;
        if ticket.is_usable_at(now) {
            let remaining = ticket.remaining_at(now);
            CacheState::Valid(ticket, remaining)
        } else {
            CacheState::Expired
        }
    }

    async fn request_ticket(&self) -> WsaaResult<TicketResponse> {
        let service = &self.settings.service;

        let now = trusted_now(&self.clock).await;
        let request = self.settings.ticket_request(now);
        let tra = self.builder.build(&request)?;
        log::debug!("TRA:\n{}", String::from_utf8_lossy(&tra));

        let cms = self.signer.sign(&tra).await?;
        log::info!(
            "Requesting ticket for {service} from WSAA ({})",
            self.settings.environment
        );
        let raw = self.transport.login_cms(&cms).await?;

        let ticket = parse_ticket_response(&raw)?;

        self.cache.store(service, &raw)?;
        log::info!(
            "Ticket for {service} issued, expires {}",
            ticket.expiration_time
        );
        Ok(ticket)
    }
}
