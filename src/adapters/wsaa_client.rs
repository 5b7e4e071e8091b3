//! HTTP transport for the WSAA `loginCms` operation.
//! Posts the SOAP envelope and classifies failures below the SOAP layer.

use crate::infra::config::ensure_readable;
use crate::infra::error::{TransportErrorKind, WsaaError, WsaaResult};
use crate::services::soap::{login_cms_envelope, parse_login_cms_response};
use openssl::x509::X509;
use reqwest::header::CONTENT_TYPE;
use std::error::Error as _;
use std::path::Path;
use std::time::Duration;

/// Submits a Base64 CMS to WSAA and returns the raw TA XML.
pub trait LoginTransport {
    async fn login_cms(&self, cms_base64: &str) -> WsaaResult<String>;
}

/// reqwest-based WSAA client
#[derive(Debug, Clone)]
pub struct WsaaHttpClient {
    endpoint: String,
    http: reqwest::Client,
}

impl WsaaHttpClient {
    /// Create a client for the service described by `wsdl_url`.
    ///
    /// With a `ca_bundle`, only the certificates it contains are trusted.
    pub fn new(wsdl_url: &str, ca_bundle: Option<&Path>, timeout: Duration) -> WsaaResult<Self> {
        let endpoint = endpoint_from_wsdl(wsdl_url)?;

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("afip-ws/", env!("CARGO_PKG_VERSION")));

        if let Some(ca_path) = ca_bundle {
            for certificate in load_ca_bundle(ca_path)? {
                builder = builder.add_root_certificate(certificate);
            }
            builder = builder.tls_built_in_root_certs(false);
        }

        let http = builder.build().map_err(|e| {
            WsaaError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self { endpoint, http })
    }

    /// SOAP endpoint derived from the WSDL location
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LoginTransport for WsaaHttpClient {
    async fn login_cms(&self, cms_base64: &str) -> WsaaResult<String> {
        let envelope = login_cms_envelope(cms_base64)?;
        log::debug!("POST {} ({} bytes)", self.endpoint, envelope.len());

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        log::debug!("WSAA replied {status} ({} bytes)", body.len());

        // Faults arrive with HTTP 500, so the body is decoded whatever the status.
        match parse_login_cms_response(&body) {
            Err(WsaaError::MalformedResponse(message)) if !status.is_success() => Err(
                WsaaError::transport(TransportErrorKind::Http, format!("HTTP {status}: {message}")),
            ),
            other => other,
        }
    }
}

/// Strip the `?WSDL` query from a WSDL location.
fn endpoint_from_wsdl(wsdl_url: &str) -> WsaaResult<String> {
    let url = wsdl_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(WsaaError::ConfigurationError(format!(
            "WSDL location must be an http(s) URL: {url}"
        )));
    }

    let endpoint = match url.to_ascii_lowercase().rfind("?wsdl") {
        Some(idx) => &url[..idx],
        None => url,
    };
    Ok(endpoint.to_string())
}

fn load_ca_bundle(path: &Path) -> WsaaResult<Vec<reqwest::Certificate>> {
    ensure_readable(path, "CA bundle")?;
    let pem = std::fs::read(path)?;

    let stack = X509::stack_from_pem(&pem).map_err(|e| {
        WsaaError::ConfigurationError(format!("{} is not a PEM bundle: {e}", path.display()))
    })?;
    if stack.is_empty() {
        return Err(WsaaError::ConfigurationError(format!(
            "{} contains no certificates",
            path.display()
        )));
    }

    stack
        .iter()
        .map(|cert| {
            let der = cert.to_der().map_err(|e| {
                WsaaError::ConfigurationError(format!(
                    "Cannot encode certificate in {}: {e}",
                    path.display()
                ))
            })?;
            reqwest::Certificate::from_der(&der).map_err(|e| {
                WsaaError::ConfigurationError(format!(
                    "Unusable certificate in {}: {e}",
                    path.display()
                ))
            })
        })
        .collect()
}

fn classify(error: reqwest::Error) -> WsaaError {
    let mut message = error.to_string();
    let mut tls = false;
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        let lower = text.to_ascii_lowercase();
        tls |= ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| lower.contains(needle));
        message.push_str(": ");
        message.push_str(&text);
        source = cause.source();
    }

    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if tls {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Http
    };
    log::warn!("loginCms {kind} failure: {message}");
    WsaaError::transport(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn endpoint_drops_wsdl_query() {
        assert_eq!(
            endpoint_from_wsdl("https://wsaahomo.afip.gov.ar/ws/services/LoginCms?WSDL").unwrap(),
            "https://wsaahomo.afip.gov.ar/ws/services/LoginCms"
        );
        assert_eq!(
            endpoint_from_wsdl("http://127.0.0.1:8080/LoginCms?wsdl").unwrap(),
            "http://127.0.0.1:8080/LoginCms"
        );
        assert_eq!(
            endpoint_from_wsdl("https://wsaa.afip.gov.ar/ws/services/LoginCms").unwrap(),
            "https://wsaa.afip.gov.ar/ws/services/LoginCms"
        );
        assert!(endpoint_from_wsdl("wsaa.afip.gov.ar").is_err());
    }

    #[test]
    fn bad_ca_bundle_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("afip_ca.crt");
        let result = WsaaHttpClient::new(
            "https://wsaahomo.afip.gov.ar/ws/services/LoginCms?WSDL",
            Some(&missing),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(WsaaError::ConfigurationError(_))));

        let garbage = dir.path().join("garbage.crt");
        std::fs::write(&garbage, "not a certificate").unwrap();
        let result = WsaaHttpClient::new(
            "https://wsaahomo.afip.gov.ar/ws/services/LoginCms?WSDL",
            Some(&garbage),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(WsaaError::ConfigurationError(_))));
    }

    #[test]
    fn pem_ca_bundle_is_accepted() {
        use openssl::asn1::Asn1Time;
        use openssl::hash::MessageDigest;
        use openssl::pkey::PKey;
        use openssl::rsa::Rsa;
        use openssl::x509::{X509Builder, X509NameBuilder};

        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "AFIP test CA").unwrap();
        let name = name.build();
        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("afip_ca.crt");
        std::fs::write(&bundle, builder.build().to_pem().unwrap()).unwrap();

        assert_eq!(load_ca_bundle(&bundle).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_classified() {
        let client = WsaaHttpClient::new(
            "http://127.0.0.1:1/ws/services/LoginCms?WSDL",
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        match client.login_cms("TUlJ").await {
            Err(WsaaError::Transport { kind, .. }) => {
                assert_eq!(kind, TransportErrorKind::Connection);
            }
            other => panic!("Expected transport error, got: {other:?}"),
        }
    }
}
