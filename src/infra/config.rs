//! Configuration management infrastructure.
//!
//! This module provides configuration file support: certificate and key
//! locations per environment, WSAA endpoints, time servers, timeouts and
//! the web service allow-list. Command line flags are merged on top of the
//! file into a [`WsaaSettings`] value for a single run.

use crate::domain::constants::{FALLBACK_TIME_SERVERS, PRIMARY_TIME_SERVER};
use crate::domain::time::parse_offset;
use crate::domain::types::{Environment, WebService};
use crate::infra::error::{WsaaError, WsaaResult};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Application configuration as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsaaConfiguration {
    /// Certificate issued by AFIP for the testing environment
    pub testing_certificate: PathBuf,

    /// Certificate issued by AFIP for production
    pub production_certificate: PathBuf,

    /// Private key matching both certificates
    pub private_key: PathBuf,

    /// Private key passphrase, if the key is encrypted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// CA bundle trusted for the WSAA TLS connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    pub testing_wsdl: String,
    pub production_wsdl: String,

    /// Directory holding one ticket folder per web service
    pub output_dir: PathBuf,

    /// Optional `source` DN for the TRA header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Query SNTP servers instead of trusting the local clock
    pub use_network_time: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_time_server: Option<String>,

    pub fallback_time_servers: Vec<String>,

    pub time_server_timeout_seconds: u64,
    pub network_timeout_seconds: u64,
    pub signing_timeout_seconds: u64,

    /// `openssl` executable used by the command line signer
    pub openssl_path: PathBuf,

    pub signer: SignerKind,

    /// Fixed UTC offset for TRA timestamps, e.g. `-03:00`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,

    /// Web services tickets may be requested for; empty allows any valid name
    pub web_services: Vec<String>,
}

impl Default for WsaaConfiguration {
    fn default() -> Self {
        Self {
            testing_certificate: PathBuf::from("config/certificates/testing.crt"),
            production_certificate: PathBuf::from("config/certificates/production.crt"),
            private_key: PathBuf::from("config/certificates/private.key"),
            passphrase: None,
            ca_cert: None,
            testing_wsdl: Environment::Testing.default_wsdl().to_string(),
            production_wsdl: Environment::Production.default_wsdl().to_string(),
            output_dir: PathBuf::from("data"),
            source: None,
            use_network_time: true,
            primary_time_server: Some(PRIMARY_TIME_SERVER.to_string()),
            fallback_time_servers: FALLBACK_TIME_SERVERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            time_server_timeout_seconds: 5,
            network_timeout_seconds: 30,
            signing_timeout_seconds: 30,
            openssl_path: PathBuf::from("openssl"),
            signer: SignerKind::OpenSslCli,
            utc_offset: None,
            web_services: [
                "ws_sr_padron_a4",
                "ws_sr_padron_a5",
                "ws_sr_padron_a10",
                "ws_sr_padron_a100",
                "wsfe",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// CMS signing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignerKind {
    /// `openssl smime` subprocess
    #[default]
    #[serde(rename = "openssl-cli")]
    OpenSslCli,
    /// openssl crate, in process
    #[serde(rename = "native")]
    Native,
}

impl FromStr for SignerKind {
    type Err = WsaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openssl-cli" | "openssl" | "cli" => Ok(Self::OpenSslCli),
            "native" => Ok(Self::Native),
            _ => Err(WsaaError::ConfigurationError(format!(
                "Unknown signer: {s} (expected openssl-cli or native)"
            ))),
        }
    }
}

/// Fully resolved settings for one ticket request.
#[derive(Clone)]
pub struct WsaaSettings {
    pub service: WebService,
    pub environment: Environment,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
    pub ca_cert: Option<PathBuf>,
    pub wsdl: String,
    pub output_dir: PathBuf,
    pub source: Option<String>,
    pub utc_offset: Option<FixedOffset>,
    pub use_network_time: bool,
    pub primary_time_server: Option<String>,
    pub fallback_time_servers: Vec<String>,
    pub time_server_timeout: Duration,
    pub network_timeout: Duration,
    pub signing_timeout: Duration,
    pub openssl_path: PathBuf,
    pub signer: SignerKind,
    pub force_renewal: bool,
}

impl std::fmt::Debug for WsaaSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsaaSettings")
            .field("service", &self.service)
            .field("environment", &self.environment)
            .field("certificate", &self.certificate)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("ca_cert", &self.ca_cert)
            .field("wsdl", &self.wsdl)
            .field("output_dir", &self.output_dir)
            .field("signer", &self.signer)
            .field("force_renewal", &self.force_renewal)
            .finish_non_exhaustive()
    }
}

impl WsaaConfiguration {
    /// Merge the file values for `service` in `environment`.
    pub fn resolve(&self, service: &str, environment: Environment) -> WsaaResult<WsaaSettings> {
        validate(self)?;

        let service = WebService::new(service)?;
        if !self.web_services.is_empty()
            && !self.web_services.iter().any(|s| s == service.as_str())
        {
            return Err(WsaaError::InvalidInput(format!(
                "Unknown web service {service}. Enabled web services: {}",
                self.web_services.join(", ")
            )));
        }

        let (certificate, wsdl) = match environment {
            Environment::Testing => (&self.testing_certificate, &self.testing_wsdl),
            Environment::Production => (&self.production_certificate, &self.production_wsdl),
        };

        Ok(WsaaSettings {
            service,
            environment,
            certificate: certificate.clone(),
            private_key: self.private_key.clone(),
            passphrase: self.passphrase.clone(),
            ca_cert: self.ca_cert.clone(),
            wsdl: wsdl.clone(),
            output_dir: self.output_dir.clone(),
            source: self.source.clone(),
            utc_offset: self.utc_offset.as_deref().map(parse_offset).transpose()?,
            use_network_time: self.use_network_time,
            primary_time_server: self.primary_time_server.clone(),
            fallback_time_servers: self.fallback_time_servers.clone(),
            time_server_timeout: Duration::from_secs(self.time_server_timeout_seconds),
            network_timeout: Duration::from_secs(self.network_timeout_seconds),
            signing_timeout: Duration::from_secs(self.signing_timeout_seconds),
            openssl_path: self.openssl_path.clone(),
            signer: self.signer,
            force_renewal: false,
        })
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> WsaaResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> WsaaResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("afip-ws").join("config.toml"))
        } else {
            Ok(PathBuf::from("afip-ws-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> WsaaResult<WsaaConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = WsaaConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, falling back to defaults without writing
    pub fn load_or_default(&self) -> WsaaResult<WsaaConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(WsaaConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> WsaaResult<WsaaConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            WsaaError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: WsaaConfiguration = toml::from_str(&content).map_err(|e| {
            WsaaError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        validate(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &WsaaConfiguration) -> WsaaResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                WsaaError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            WsaaError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            WsaaError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> WsaaResult<()> {
        let mut config = self.load_or_default()?;
        let optional = |v: &str| (!v.trim().is_empty()).then(|| v.trim().to_string());

        match key {
            "testing_certificate" => config.testing_certificate = PathBuf::from(value),
            "production_certificate" => config.production_certificate = PathBuf::from(value),
            "private_key" => config.private_key = PathBuf::from(value),
            "passphrase" => config.passphrase = optional(value),
            "ca_cert" => config.ca_cert = optional(value).map(PathBuf::from),
            "testing_wsdl" => config.testing_wsdl = value.to_string(),
            "production_wsdl" => config.production_wsdl = value.to_string(),
            "output_dir" => config.output_dir = PathBuf::from(value),
            "source" => config.source = optional(value),
            "use_network_time" => config.use_network_time = parse_bool(value)?,
            "primary_time_server" => config.primary_time_server = optional(value),
            "fallback_time_servers" => config.fallback_time_servers = parse_list(value),
            "time_server_timeout_seconds" => {
                config.time_server_timeout_seconds = parse_seconds(value)?;
            }
            "network_timeout_seconds" => config.network_timeout_seconds = parse_seconds(value)?,
            "signing_timeout_seconds" => config.signing_timeout_seconds = parse_seconds(value)?,
            "openssl_path" => config.openssl_path = PathBuf::from(value),
            "signer" => config.signer = value.parse()?,
            "utc_offset" => config.utc_offset = optional(value),
            "web_services" => config.web_services = parse_list(value),
            _ => {
                return Err(WsaaError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        validate(&config)?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> WsaaResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| WsaaError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| WsaaError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| WsaaError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> WsaaResult<()> {
        let config: WsaaConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                WsaaError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                WsaaError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                WsaaError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        validate(&config)?;
        self.save(&config)
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

impl FromStr for ExportFormat {
    type Err = WsaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(WsaaError::ConfigurationError(format!(
                "Unknown format: {s} (expected toml, json or yaml)"
            ))),
        }
    }
}

/// Fail with a configuration error unless `path` can be opened for reading.
pub fn ensure_readable(path: &Path, what: &str) -> WsaaResult<()> {
    fs::File::open(path).map(drop).map_err(|e| {
        WsaaError::ConfigurationError(format!("Cannot read {what} {}: {e}", path.display()))
    })
}

fn validate(config: &WsaaConfiguration) -> WsaaResult<()> {
    for (name, value) in [
        ("time_server_timeout_seconds", config.time_server_timeout_seconds),
        ("network_timeout_seconds", config.network_timeout_seconds),
        ("signing_timeout_seconds", config.signing_timeout_seconds),
    ] {
        if value == 0 {
            return Err(WsaaError::ConfigurationError(format!(
                "{name} must be greater than 0"
            )));
        }
    }

    for (name, url) in [
        ("testing_wsdl", &config.testing_wsdl),
        ("production_wsdl", &config.production_wsdl),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(WsaaError::ConfigurationError(format!(
                "{name} must be an http(s) URL: {url}"
            )));
        }
    }

    if let Some(offset) = &config.utc_offset {
        parse_offset(offset).map_err(|e| {
            WsaaError::ConfigurationError(format!("Invalid utc_offset {offset}: {e}"))
        })?;
    }

    for service in &config.web_services {
        WebService::new(service).map_err(|e| {
            WsaaError::ConfigurationError(format!("Invalid entry in web_services: {e}"))
        })?;
    }

    Ok(())
}

fn parse_bool(value: &str) -> WsaaResult<bool> {
    value
        .parse()
        .map_err(|_| WsaaError::ConfigurationError(format!("Invalid boolean value: {value}")))
}

fn parse_seconds(value: &str) -> WsaaResult<u64> {
    value
        .parse()
        .map_err(|_| WsaaError::ConfigurationError(format!("Invalid number of seconds: {value}")))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = WsaaConfiguration::default();
        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert_eq!(config.primary_time_server.as_deref(), Some("afip.time.gob.ar"));
        assert_eq!(config.fallback_time_servers.len(), 2);
        assert_eq!(config.signer, SignerKind::OpenSslCli);
        assert!(config.web_services.contains(&"ws_sr_padron_a4".to_string()));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: WsaaConfiguration = toml::from_str(
            r#"
private_key = "/etc/afip/key.pem"
signer = "native"
utc_offset = "-03:00"
"#,
        )
        .unwrap();
        assert_eq!(config.private_key, PathBuf::from("/etc/afip/key.pem"));
        assert_eq!(config.signer, SignerKind::Native);
        assert_eq!(config.network_timeout_seconds, 30);
    }

    #[test]
    fn test_resolve_picks_environment() {
        let config = WsaaConfiguration {
            utc_offset: Some("-03:00".into()),
            ..WsaaConfiguration::default()
        };

        let testing = config.resolve("wsfe", Environment::Testing).unwrap();
        assert_eq!(testing.certificate, config.testing_certificate);
        assert!(testing.wsdl.contains("wsaahomo"));
        assert_eq!(
            testing.utc_offset,
            Some(FixedOffset::west_opt(3 * 3600).unwrap())
        );

        let production = config.resolve("wsfe", Environment::Production).unwrap();
        assert_eq!(production.certificate, config.production_certificate);
        assert!(production.wsdl.starts_with("https://wsaa.afip.gov.ar"));
    }

    #[test]
    fn test_resolve_enforces_allow_list() {
        let config = WsaaConfiguration::default();
        assert!(matches!(
            config.resolve("wsmtxca", Environment::Testing),
            Err(WsaaError::InvalidInput(_))
        ));
        assert!(config.resolve("../etc", Environment::Testing).is_err());

        let open = WsaaConfiguration {
            web_services: Vec::new(),
            ..WsaaConfiguration::default()
        };
        assert!(open.resolve("wsmtxca", Environment::Testing).is_ok());
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded_config = manager.load().unwrap();
        assert_eq!(config.testing_wsdl, loaded_config.testing_wsdl);
    }

    #[test]
    fn test_update_value() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.update_value("signer", "native").unwrap();
        manager.update_value("utc_offset", "-03:00").unwrap();
        manager
            .update_value("fallback_time_servers", "a.example, b.example")
            .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.signer, SignerKind::Native);
        assert_eq!(config.utc_offset.as_deref(), Some("-03:00"));
        assert_eq!(config.fallback_time_servers, vec!["a.example", "b.example"]);

        assert!(manager.update_value("network_timeout_seconds", "0").is_err());
        assert!(manager.update_value("utc_offset", "3 hours").is_err());
        assert!(manager.update_value("no_such_key", "1").is_err());
    }

    #[test]
    fn test_export_import_round_trip_formats() {
        let temp_dir = TempDir::new().unwrap();
        let source = ConfigManager::with_path(temp_dir.path().join("source.toml"));
        source.update_value("output_dir", "/var/lib/afip").unwrap();

        for format in [ExportFormat::Toml, ExportFormat::Json, ExportFormat::Yaml] {
            let exported = source.export_config(format).unwrap();
            let target = ConfigManager::with_path(temp_dir.path().join(format!("{format:?}.toml")));
            target.import_config(&exported, format).unwrap();
            assert_eq!(target.load().unwrap().output_dir, PathBuf::from("/var/lib/afip"));
        }
    }

    #[test]
    fn test_ensure_readable() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("cert.crt");
        fs::write(&present, "x").unwrap();
        assert!(ensure_readable(&present, "certificate").is_ok());
        assert!(matches!(
            ensure_readable(&temp_dir.path().join("absent.crt"), "certificate"),
            Err(WsaaError::ConfigurationError(_))
        ));
    }
}
