//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - CMS signing through the `openssl` binary or the openssl crate
//! - WSAA `loginCms` over HTTPS
//! - SNTP time servers with ordered failover

pub mod cms_signer;
pub mod ntp_client;
pub mod wsaa_client;

pub use cms_signer::{CmsSigner, NativeCmsSigner, OpenSslCommandSigner, SignerBackend};
pub use ntp_client::{FixedTimeSource, NtpTimeSource, SystemTimeSource, TimeSource, TrustedClock};
pub use wsaa_client::{LoginTransport, WsaaHttpClient};
