//! Type-safe wrappers using new-type pattern
//!
//! Validated inputs for the ticket pipeline, so that service names can be used
//! as path components and environments map to exactly one WSAA identity.

use crate::domain::constants::{
    AFIP_WSAA_CUIT, PRODUCTION_DESTINATION_CN, PRODUCTION_WSDL, TESTING_DESTINATION_CN,
    TESTING_WSDL,
};
use crate::infra::error::{WsaaError, WsaaResult};
use std::fmt;
use std::str::FromStr;

/// Target WSAA environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Homologation environment (`wsaahomo`)
    #[default]
    Testing,
    /// Production environment (`wsaa`)
    Production,
}

impl Environment {
    #[must_use]
    pub fn from_production_flag(production: bool) -> Self {
        if production {
            Self::Production
        } else {
            Self::Testing
        }
    }

    /// Distinguished name of the WSAA instance the TRA is addressed to.
    #[must_use]
    pub fn destination(&self) -> String {
        let cn = match self {
            Self::Testing => TESTING_DESTINATION_CN,
            Self::Production => PRODUCTION_DESTINATION_CN,
        };
        format!("cn={cn},o=afip,c=ar,serialNumber=CUIT {AFIP_WSAA_CUIT}")
    }

    #[must_use]
    pub fn default_wsdl(&self) -> &'static str {
        match self {
            Self::Testing => TESTING_WSDL,
            Self::Production => PRODUCTION_WSDL,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-safe wrapper for web service names (e.g. `ws_sr_padron_a4`, `wsfe`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebService(String);

impl WebService {
    /// Create a new `WebService` after validation
    pub fn new(name: impl AsRef<str>) -> WsaaResult<Self> {
        let name = name.as_ref();
        Self::validate_name(name)?;
        Ok(WebService(name.to_string()))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names end up as cache directory names, so only path-safe characters are allowed.
    fn validate_name(name: &str) -> WsaaResult<()> {
        if name.is_empty() {
            return Err(WsaaError::InvalidInput(
                "Web service name must not be empty".to_string(),
            ));
        }

        if name.len() > 64 {
            return Err(WsaaError::InvalidInput(format!(
                "Web service name too long: {} characters (maximum 64)",
                name.len()
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(WsaaError::InvalidInput(format!(
                "Web service name may only contain letters, digits, '_' and '-': {name}"
            )));
        }

        Ok(())
    }
}

impl FromStr for WebService {
    type Err = WsaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for WebService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_identity_per_environment() {
        assert_eq!(
            Environment::Production.destination(),
            "cn=wsaa,o=afip,c=ar,serialNumber=CUIT 33693450239"
        );
        assert_eq!(
            Environment::Testing.destination(),
            "cn=wsaahomo,o=afip,c=ar,serialNumber=CUIT 33693450239"
        );
    }

    #[test]
    fn production_flag_selects_environment() {
        assert_eq!(
            Environment::from_production_flag(true),
            Environment::Production
        );
        assert_eq!(Environment::from_production_flag(false), Environment::Testing);
        assert!(Environment::Testing.default_wsdl().contains("wsaahomo"));
    }

    #[test]
    fn web_service_accepts_afip_names() {
        for name in ["ws_sr_padron_a4", "wsfe", "ws-sr-constancia-inscripcion"] {
            assert_eq!(WebService::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn web_service_rejects_path_like_names() {
        assert!(WebService::new("").is_err());
        assert!(WebService::new("../etc").is_err());
        assert!(WebService::new("ws/fe").is_err());
        assert!(WebService::new("ws fe").is_err());
        assert!(WebService::new("a".repeat(65)).is_err());
    }
}
