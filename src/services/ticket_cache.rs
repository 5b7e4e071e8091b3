//! On-disk ticket cache.
//!
//! One file per web service at `<output-dir>/<web-service>/ta.xml`, holding the
//! exact TA XML returned by WSAA. Writes go through a temporary file in the
//! same directory and are renamed into place, so a concurrent reader sees
//! either the previous ticket or the new one. Concurrent writers are not
//! serialized: the last rename wins.

use crate::domain::constants::TICKET_FILE_NAME;
use crate::domain::ticket::TicketResponse;
use crate::domain::types::WebService;
use crate::infra::error::{WsaaError, WsaaResult};
use crate::services::ta_parser::parse_ticket_response;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

/// Per-service ticket files below an output directory
#[derive(Debug, Clone)]
pub struct TicketCache {
    root: PathBuf,
}

impl TicketCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the cached ticket for `service`.
    #[must_use]
    pub fn path_for(&self, service: &WebService) -> PathBuf {
        self.root.join(service.as_str()).join(TICKET_FILE_NAME)
    }

    /// Read the cached ticket.
    ///
    /// Returns `Ok(None)` when no file exists and [`WsaaError::CacheCorrupt`]
    /// when the file cannot be read or parsed.
    pub fn load(&self, service: &WebService) -> WsaaResult<Option<TicketResponse>> {
        let path = self.path_for(service);
        let xml = match fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No cached ticket at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(WsaaError::CacheCorrupt(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        parse_ticket_response(&xml)
            .map(Some)
            .map_err(|e| WsaaError::CacheCorrupt(format!("{}: {e}", path.display())))
    }

    /// Persist the raw TA XML for `service`, replacing any previous ticket.
    pub fn store(&self, service: &WebService, raw_xml: &str) -> WsaaResult<PathBuf> {
        let path = self.path_for(service);
        let dir = path.parent().unwrap_or(&self.root);

        fs::create_dir_all(dir).map_err(|e| {
            WsaaError::IoError(format!(
                "Failed to create ticket directory {}: {e}",
                dir.display()
            ))
        })?;

        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            WsaaError::IoError(format!("Failed to stage ticket in {}: {e}", dir.display()))
        })?;
        staged
            .write_all(raw_xml.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| WsaaError::IoError(format!("Failed to write ticket: {e}")))?;
        staged.persist(&path).map_err(|e| {
            WsaaError::IoError(format!("Failed to replace {}: {}", path.display(), e.error))
        })?;

        log::info!("Ticket for {service} saved to {}", path.display());
        Ok(path)
    }
}
