//! CMS signing adapters.
//!
//! WSAA accepts a TRA only as an attached (non-detached) CMS `SignedData`
//! envelope signed with the taxpayer's certificate, DER-encoded and Base64'd.
//! Two backends produce it: the `openssl` command line tool, and the openssl
//! crate in process.

use crate::domain::constants::PASSPHRASE_ENV_VAR;
use crate::infra::config::ensure_readable;
use crate::infra::error::{WsaaError, WsaaResult};
use base64::{prelude::BASE64_STANDARD, Engine};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::X509;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Produces the Base64 CMS envelope submitted to `loginCms`.
pub trait CmsSigner {
    async fn sign(&self, tra: &[u8]) -> WsaaResult<String>;
}

/// Signs by running `openssl smime -sign ... -outform DER -nodetach`.
#[derive(Clone)]
pub struct OpenSslCommandSigner {
    program: PathBuf,
    certificate: PathBuf,
    private_key: PathBuf,
    passphrase: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for OpenSslCommandSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSslCommandSigner")
            .field("program", &self.program)
            .field("certificate", &self.certificate)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenSslCommandSigner {
    /// Create a signer for the given certificate and key.
    ///
    /// Both files must be readable; the `openssl` binary itself is only
    /// looked up when signing.
    pub fn new(certificate: impl Into<PathBuf>, private_key: impl Into<PathBuf>) -> WsaaResult<Self> {
        let certificate = certificate.into();
        let private_key = private_key.into();
        ensure_readable(&certificate, "certificate")?;
        ensure_readable(&private_key, "private key")?;

        Ok(Self {
            program: PathBuf::from("openssl"),
            certificate,
            private_key,
            passphrase: None,
            timeout: Duration::from_secs(30),
        })
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "smime".into(),
            "-sign".into(),
            "-signer".into(),
            self.certificate.clone().into_os_string(),
            "-inkey".into(),
            self.private_key.clone().into_os_string(),
            "-outform".into(),
            "DER".into(),
            "-nodetach".into(),
        ];
        if self.passphrase.is_some() {
            args.push("-passin".into());
            args.push(format!("env:{PASSPHRASE_ENV_VAR}").into());
        }
        args
    }
}

impl CmsSigner for OpenSslCommandSigner {
    async fn sign(&self, tra: &[u8]) -> WsaaResult<String> {
        log::debug!("Signing TRA with {}", self.program.display());

        let mut command = Command::new(&self.program);
        command
            .args(self.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(passphrase) = &self.passphrase {
            command.env(PASSPHRASE_ENV_VAR, passphrase);
        }

        let mut child = command.spawn().map_err(|e| {
            WsaaError::SigningUnavailable(format!(
                "cannot run {}: {e}",
                self.program.display()
            ))
        })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            WsaaError::SigningFailed("openssl stdin was not captured".to_string())
        })?;
        let feed = async move {
            // A process that exits early closes its stdin; its exit status tells the story.
            if let Err(e) = stdin.write_all(tra).await {
                log::debug!("openssl closed stdin early: {e}");
            }
            drop(stdin);
        };

        let (_, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| {
            WsaaError::SigningFailed(format!(
                "openssl did not finish within {}s",
                self.timeout.as_secs()
            ))
        })?;
        let output = output.map_err(|e| WsaaError::SigningFailed(format!("openssl: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(WsaaError::SigningFailed(format!(
                "openssl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            return Err(WsaaError::SigningFailed(stderr.trim().to_string()));
        }
        if output.stdout.is_empty() {
            return Err(WsaaError::SigningFailed(
                "openssl produced no output".to_string(),
            ));
        }

        log::debug!("CMS envelope: {} bytes", output.stdout.len());
        Ok(BASE64_STANDARD.encode(&output.stdout))
    }
}

/// Signs in process with the openssl crate's PKCS#7 support.
pub struct NativeCmsSigner {
    certificate: X509,
    private_key: PKey<Private>,
}

impl std::fmt::Debug for NativeCmsSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCmsSigner").finish_non_exhaustive()
    }
}

impl NativeCmsSigner {
    /// Load a PEM (or DER) certificate and a PEM private key.
    pub fn new(
        certificate: &Path,
        private_key: &Path,
        passphrase: Option<&str>,
    ) -> WsaaResult<Self> {
        ensure_readable(certificate, "certificate")?;
        ensure_readable(private_key, "private key")?;

        let cert_bytes = std::fs::read(certificate)?;
        let certificate_x509 = X509::from_pem(&cert_bytes)
            .or_else(|_| X509::from_der(&cert_bytes))
            .map_err(|e| {
                WsaaError::ConfigurationError(format!(
                    "{} is not a certificate: {e}",
                    certificate.display()
                ))
            })?;

        let key_bytes = std::fs::read(private_key)?;
        let key = match passphrase.filter(|p| !p.is_empty()) {
            Some(pass) => PKey::private_key_from_pem_passphrase(&key_bytes, pass.as_bytes()),
            None => PKey::private_key_from_pem(&key_bytes),
        }
        .map_err(|e| {
            WsaaError::ConfigurationError(format!(
                "cannot load private key {}: {e}",
                private_key.display()
            ))
        })?;

        let public_key = certificate_x509.public_key().map_err(|e| {
            WsaaError::ConfigurationError(format!(
                "{} has an unusable public key: {e}",
                certificate.display()
            ))
        })?;
        if !public_key.public_eq(&key) {
            return Err(WsaaError::ConfigurationError(format!(
                "private key {} does not match certificate {}",
                private_key.display(),
                certificate.display()
            )));
        }

        Ok(Self::from_parts(certificate_x509, key))
    }

    #[must_use]
    pub fn from_parts(certificate: X509, private_key: PKey<Private>) -> Self {
        Self {
            certificate,
            private_key,
        }
    }
}

impl CmsSigner for NativeCmsSigner {
    async fn sign(&self, tra: &[u8]) -> WsaaResult<String> {
        let extra_certs = Stack::<X509>::new()?;
        let signed = Pkcs7::sign(
            &self.certificate,
            &self.private_key,
            &extra_certs,
            tra,
            Pkcs7Flags::empty(),
        )?;
        let der = signed.to_der()?;
        log::debug!("CMS envelope: {} bytes", der.len());
        Ok(BASE64_STANDARD.encode(der))
    }
}

/// Signing backend chosen by configuration.
#[derive(Debug)]
pub enum SignerBackend {
    Command(OpenSslCommandSigner),
    Native(NativeCmsSigner),
}

impl CmsSigner for SignerBackend {
    async fn sign(&self, tra: &[u8]) -> WsaaResult<String> {
        match self {
            Self::Command(signer) => signer.sign(tra).await,
            Self::Native(signer) => signer.sign(tra).await,
        }
    }
}
