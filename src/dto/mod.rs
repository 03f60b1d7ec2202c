//! Wire-level data transfer objects and timestamp helpers.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Broadcast event payloads.
pub mod events;
/// Health check responses.
pub mod health;
/// Room bootstrap requests and summaries.
pub mod room;
/// Validation helpers for DTOs.
pub mod validation;
/// Inbound WebSocket commands.
pub mod ws;

/// Format a timestamp in the RFC 3339 interchange form used on the wire.
pub fn format_offset_datetime(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp supplied by a client.
pub fn parse_offset_datetime(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}
