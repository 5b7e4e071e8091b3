//! AFIP Web Services client library
//!
//! Obtains and caches WSAA login tickets ("Ticket de Acceso") for AFIP's SOAP
//! web services. A ticket is requested by signing a login ticket request (TRA)
//! as a CMS envelope and submitting it to the WSAA `loginCms` operation; the
//! returned token/sign pair is what every downstream AFIP service expects.

// Capability traits are consumed through generics, never as trait objects.
#![allow(async_fn_in_trait)]

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::cms_signer::{CmsSigner, NativeCmsSigner, OpenSslCommandSigner};
pub use adapters::ntp_client::{FixedTimeSource, NtpTimeSource, SystemTimeSource, TimeSource};
pub use adapters::wsaa_client::{LoginTransport, WsaaHttpClient};
pub use domain::ticket::{Credentials, TicketRequest, TicketResponse};
pub use domain::types::{Environment, WebService};
pub use infra::config::{ConfigManager, WsaaConfiguration, WsaaSettings};
pub use infra::error::{TransportErrorKind, WsaaError, WsaaResult};
pub use pipelines::ticket::{TicketManager, TicketOrigin, TicketOutcome, TicketSettings};
pub use services::ticket_cache::TicketCache;
