//! UTC offset helpers for AFIP timestamps.
//!
//! AFIP expects ISO-8601 timestamps carrying an explicit `±hh:mm` offset
//! (`2024-05-10T09:00:00-03:00`). Offsets are rendered with chrono's `%:z`
//! formatting rather than by comparing local and UTC renderings by hand.

use crate::infra::error::{WsaaError, WsaaResult};
use chrono::{DateTime, FixedOffset, Local, Offset, SecondsFormat, TimeZone, Utc};

/// Render an offset as `±hh:mm`.
#[must_use]
pub fn format_offset(offset: FixedOffset) -> String {
    Utc::now().with_timezone(&offset).format("%:z").to_string()
}

/// Local UTC offset in effect at `instant`.
#[must_use]
pub fn local_offset_at(instant: DateTime<Utc>) -> FixedOffset {
    Local.offset_from_utc_datetime(&instant.naive_utc()).fix()
}

/// Signed `±hh:mm` local offset for the given instant.
#[must_use]
pub fn offset_for(instant: DateTime<Utc>) -> String {
    format_offset(local_offset_at(instant))
}

/// Parse a `±hh:mm` (or `Z`) offset, as accepted in configuration.
pub fn parse_offset(value: &str) -> WsaaResult<FixedOffset> {
    let invalid =
        || WsaaError::InvalidInput(format!("Invalid UTC offset '{value}', expected ±hh:mm"));

    let value = value.trim();
    if value.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };

    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }

    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Render a timestamp the way AFIP documents expect: second precision, explicit offset.
#[must_use]
pub fn to_afip_timestamp(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse an AFIP timestamp (fractional seconds tolerated).
pub fn parse_afip_timestamp(value: &str) -> WsaaResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
        WsaaError::MalformedResponse(format!("Invalid timestamp '{}': {e}", value.trim()))
    })
}
