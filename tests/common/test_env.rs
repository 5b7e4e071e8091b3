//! Test environment helpers.
//!
//! Tests against the real WSAA homologation service read their certificate
//! locations from the environment. A repository-root `.env` file is loaded
//! first so the values can live outside the shell profile.
//!
//! Values already present in the process environment are **not** overwritten.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Load `KEY=VALUE` lines from `<repo>/.env`, ignoring blanks and `#` comments.
///
/// # Panics
/// Never panics; a missing or unreadable file is ignored.
pub fn load_dotenv_if_present() {
    let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let Ok(content) = fs::read_to_string(&env_path) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }

        let value = value.trim().trim_end_matches('\r');
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        env::set_var(key, value);
    }
}

/// Certificate and key for the homologation environment, if configured.
pub struct LiveCredentials {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub ca_cert: Option<PathBuf>,
    pub web_service: String,
}

impl LiveCredentials {
    /// Reads `AFIP_WS_TEST_CERT` and `AFIP_WS_TEST_KEY` (required) plus
    /// `AFIP_WS_TEST_CA` and `AFIP_WS_TEST_SERVICE` (optional).
    pub fn from_env() -> Option<Self> {
        load_dotenv_if_present();
        Some(Self {
            certificate: env::var_os("AFIP_WS_TEST_CERT")?.into(),
            private_key: env::var_os("AFIP_WS_TEST_KEY")?.into(),
            ca_cert: env::var_os("AFIP_WS_TEST_CA").map(PathBuf::from),
            web_service: env::var("AFIP_WS_TEST_SERVICE")
                .unwrap_or_else(|_| "ws_sr_padron_a4".to_string()),
        })
    }
}
