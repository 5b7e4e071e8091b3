//! In-memory implementations of the ticket pipeline capabilities.

use afip_ws::services::parse_login_cms_response;
use afip_ws::{CmsSigner, LoginTransport, TimeSource, WsaaError, WsaaResult};
use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Clock that cannot answer, forcing the local-time fallback.
pub struct UnreachableClock;

impl TimeSource for UnreachableClock {
    async fn now(&self) -> WsaaResult<DateTime<Utc>> {
        Err(WsaaError::TimeSource("no time server reachable".into()))
    }
}

/// Counts calls and remembers the last TRA it was given.
#[derive(Clone, Default)]
pub struct RecordingSigner {
    calls: Arc<AtomicUsize>,
    last_tra: Arc<Mutex<Option<String>>>,
}

impl RecordingSigner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_tra(&self) -> Option<String> {
        self.last_tra.lock().unwrap().clone()
    }
}

impl CmsSigner for RecordingSigner {
    async fn sign(&self, tra: &[u8]) -> WsaaResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_tra.lock().unwrap() = Some(String::from_utf8_lossy(tra).into_owned());
        Ok(BASE64_STANDARD.encode(tra))
    }
}

/// Replies with a canned SOAP body, decoded the way the HTTP client does.
#[derive(Clone)]
pub struct ScriptedTransport {
    soap_body: Arc<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn replying(soap_body: impl Into<String>) -> Self {
        Self {
            soap_body: Arc::new(soap_body.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Transport for tests that must not reach WSAA.
    pub fn unused() -> Self {
        Self::replying("<unexpected/>")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LoginTransport for ScriptedTransport {
    async fn login_cms(&self, cms_base64: &str) -> WsaaResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!cms_base64.is_empty(), "empty CMS submitted");
        parse_login_cms_response(&self.soap_body)
    }
}
