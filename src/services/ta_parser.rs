//! Ticket of Access parser.
//!
//! Extracts the credentials from a `loginTicketResponse` document. The same
//! parser reads freshly issued tickets and cached ones, since the cache file
//! holds the exact XML WSAA returned.

use crate::domain::ticket::TicketResponse;
use crate::domain::time::parse_afip_timestamp;
use crate::infra::error::{WsaaError, WsaaResult};
use crate::services::xml::walk_text;

#[derive(Default)]
struct Fields {
    token: Option<String>,
    sign: Option<String>,
    expiration_time: Option<String>,
    generation_time: Option<String>,
    unique_id: Option<String>,
    source: Option<String>,
    destination: Option<String>,
}

/// Parse a TA document; every required element must be present.
pub fn parse_ticket_response(xml: &str) -> WsaaResult<TicketResponse> {
    let mut fields = Fields::default();

    walk_text(xml, |path, text| {
        // Paths are relative to the root element, whatever it is called.
        let slot = match path.get(1..) {
            Some([section, leaf]) => match (section.as_str(), leaf.as_str()) {
                ("credentials", "token") => &mut fields.token,
                ("credentials", "sign") => &mut fields.sign,
                ("header", "expirationTime") => &mut fields.expiration_time,
                ("header", "generationTime") => &mut fields.generation_time,
                ("header", "uniqueId") => &mut fields.unique_id,
                ("header", "source") => &mut fields.source,
                ("header", "destination") => &mut fields.destination,
                _ => return,
            },
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    })?;

    let token = require(fields.token, "credentials/token")?;
    let sign = require(fields.sign, "credentials/sign")?;
    let expiration_time = parse_afip_timestamp(&require(
        fields.expiration_time,
        "header/expirationTime",
    )?)?;
    let generation_time = fields
        .generation_time
        .as_deref()
        .map(parse_afip_timestamp)
        .transpose()?;

    Ok(TicketResponse {
        token,
        sign,
        expiration_time,
        generation_time,
        unique_id: fields.unique_id,
        source: fields.source,
        destination: fields.destination,
    })
}

fn require(value: Option<String>, element: &str) -> WsaaResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WsaaError::MalformedResponse(format!("Ticket is missing <{element}>")))
}
