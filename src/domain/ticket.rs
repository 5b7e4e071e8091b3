//! Login ticket value types.
//!
//! - [`TicketRequest`]: the TRA, built fresh for every authentication attempt.
//! - [`TicketResponse`]: the TA issued by WSAA, immutable once parsed.
//! - [`Credentials`]: the token/sign pair relayed to downstream services.

use crate::domain::constants::{SAFETY_MARGIN_SECONDS, TRA_LIFETIME_SECONDS};
use crate::domain::types::{Environment, WebService};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::fmt;

/// Login Ticket Request (TRA)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    /// Requester's distinguished name; omitted from the XML when absent
    pub source: Option<String>,
    /// Distinguished name of the WSAA instance
    pub destination: String,
    /// Decorrelates replayed requests; not globally unique
    pub unique_id: u32,
    pub generation_time: DateTime<FixedOffset>,
    pub expiration_time: DateTime<FixedOffset>,
    /// Web service the ticket is requested for
    pub service: WebService,
}

impl TicketRequest {
    /// Build a request stamped at `generation_time` with a random unique id.
    #[must_use]
    pub fn new(
        service: WebService,
        environment: Environment,
        source: Option<&str>,
        generation_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            source: source
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            destination: environment.destination(),
            unique_id: rand::random::<u32>(),
            generation_time,
            expiration_time: generation_time + TimeDelta::seconds(TRA_LIFETIME_SECONDS),
            service,
        }
    }

    /// Replace the random unique id (reproducible output).
    #[must_use]
    pub fn with_unique_id(mut self, unique_id: u32) -> Self {
        self.unique_id = unique_id;
        self
    }
}

/// Ticket of Access (TA) as issued by WSAA
#[derive(Clone, PartialEq, Eq)]
pub struct TicketResponse {
    pub token: String,
    pub sign: String,
    pub expiration_time: DateTime<FixedOffset>,
    pub generation_time: Option<DateTime<FixedOffset>>,
    pub unique_id: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
}

impl TicketResponse {
    /// A ticket is usable while `now + safety margin < expirationTime`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(SAFETY_MARGIN_SECONDS) < self.expiration_time.with_timezone(&Utc)
    }

    /// Time left before the ticket expires (negative once expired).
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> TimeDelta {
        self.expiration_time.with_timezone(&Utc) - now
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token.clone(),
            sign: self.sign.clone(),
        }
    }
}

// Token and sign are bearer credentials; keep them out of logs.
impl fmt::Debug for TicketResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketResponse")
            .field("token", &"[REDACTED]")
            .field("sign", &"[REDACTED]")
            .field("expiration_time", &self.expiration_time)
            .field("generation_time", &self.generation_time)
            .field("unique_id", &self.unique_id)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish()
    }
}

/// Token/sign pair consumed by downstream AFIP web services
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub sign: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .field("sign", &"[REDACTED]")
            .finish()
    }
}
