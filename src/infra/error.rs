//! Error types for WSAA ticket operations.
//! Error handling types and result definitions for the ticket pipeline.

use thiserror::Error;

/// Result type for ticket operations
pub type WsaaResult<T> = Result<T, WsaaError>;

/// Distinguishes the ways a loginCms submission can fail below the SOAP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// TLS handshake or CA validation failed
    Tls,
    /// The endpoint could not be reached
    Connection,
    /// The request exceeded its timeout
    Timeout,
    /// Any other HTTP-level failure
    Http,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tls => "TLS",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Http => "HTTP",
        };
        f.write_str(label)
    }
}

/// Error taxonomy for the ticket pipeline
#[derive(Error, Debug, miette::Diagnostic)]
pub enum WsaaError {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(afip_ws::config),
        help("check the certificate, private key and CA bundle paths")
    )]
    ConfigurationError(String),

    #[error("Signing unavailable: {0}")]
    #[diagnostic(
        code(afip_ws::signing_unavailable),
        help("install openssl or set `openssl_path`, or switch to the native signer")
    )]
    SigningUnavailable(String),

    #[error("Signing failed: {0}")]
    #[diagnostic(code(afip_ws::signing_failed))]
    SigningFailed(String),

    #[error("{kind} error talking to WSAA: {message}")]
    #[diagnostic(code(afip_ws::transport))]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("WSAA fault {code}: {message}")]
    #[diagnostic(code(afip_ws::protocol_fault))]
    ProtocolFault { code: String, message: String },

    #[error("Cached ticket is unusable: {0}")]
    #[diagnostic(code(afip_ws::cache_corrupt))]
    CacheCorrupt(String),

    #[error("Malformed response: {0}")]
    #[diagnostic(code(afip_ws::malformed_response))]
    MalformedResponse(String),

    #[error("Time source error: {0}")]
    #[diagnostic(code(afip_ws::time_source))]
    TimeSource(String),

    #[error("Invalid input: {0}")]
    #[diagnostic(code(afip_ws::invalid_input))]
    InvalidInput(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(afip_ws::io))]
    IoError(String),
}

impl WsaaError {
    /// Shorthand for a transport failure of the given kind.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for WsaaError {
    fn from(error: std::io::Error) -> Self {
        WsaaError::IoError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for WsaaError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        WsaaError::SigningFailed(error.to_string())
    }
}

impl From<quick_xml::Error> for WsaaError {
    fn from(error: quick_xml::Error) -> Self {
        WsaaError::MalformedResponse(error.to_string())
    }
}
