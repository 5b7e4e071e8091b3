//! Protocol constants for WSAA login tickets.
//! Keep this intentionally small; only broadly reused literals should live here.

// === Ticket lifetime ===

/// Validity window requested in every TRA (expirationTime - generationTime)
pub const TRA_LIFETIME_SECONDS: i64 = 15 * 60;

/// Buffer subtracted from a ticket's expiration when judging whether it is still usable
pub const SAFETY_MARGIN_SECONDS: i64 = 120;

/// Version attribute of the `loginTicketRequest` root element
pub const TRA_VERSION: &str = "1.0";

// === Destination identity ===

/// Fixed CUIT of AFIP's WSAA in the destination distinguished name
pub const AFIP_WSAA_CUIT: &str = "33693450239";

/// Common name of the production WSAA
pub const PRODUCTION_DESTINATION_CN: &str = "wsaa";

/// Common name of the homologation (testing) WSAA
pub const TESTING_DESTINATION_CN: &str = "wsaahomo";

// === Endpoints ===

/// Production WSAA WSDL
pub const PRODUCTION_WSDL: &str = "https://wsaa.afip.gov.ar/ws/services/LoginCms?WSDL";

/// Homologation WSAA WSDL
pub const TESTING_WSDL: &str = "https://wsaahomo.afip.gov.ar/ws/services/LoginCms?WSDL";

/// Namespace of the `loginCms` operation
pub const WSAA_NAMESPACE: &str = "http://wsaa.view.sua.dvadac.desein.afip.gov";

/// SOAP 1.1 envelope namespace
pub const SOAP_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

// === Time servers ===

/// AFIP's own time service, queried first
pub const PRIMARY_TIME_SERVER: &str = "afip.time.gob.ar";

/// Public pools tried in order when the primary does not answer
pub const FALLBACK_TIME_SERVERS: &[&str] = &["ar.pool.ntp.org", "south-america.pool.ntp.org"];

/// Default NTP port
pub const NTP_PORT: u16 = 123;

// === Cache layout ===

/// File name of a cached ticket inside `<output-dir>/<web-service>/`
pub const TICKET_FILE_NAME: &str = "ta.xml";

/// Environment variable carrying the private key passphrase to the signing subprocess
pub const PASSPHRASE_ENV_VAR: &str = "AFIP_WS_KEY_PASSPHRASE";
