//! Cursor-based pagination utilities.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound for a caller-supplied page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Error type for cursor operations.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Encodes a cursor from timestamp and ID.
///
/// The cursor format is: base64(RFC3339_timestamp:id)
/// The id breaks ties between rows created in the same microsecond.
pub fn encode_cursor(created_at: DateTime<Utc>, id: Uuid) -> String {
    let raw = format!(
        "{}:{}",
        created_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        id
    );
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decodes a cursor into timestamp and ID.
pub fn decode_cursor(cursor: &str) -> Result<(DateTime<Utc>, Uuid), CursorError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| CursorError::InvalidEncoding)?;

    let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

    // Split on last colon (timestamp contains colons)
    let colon_pos = s.rfind(':').ok_or(CursorError::InvalidFormat)?;
    let timestamp_str = &s[..colon_pos];
    let id_str = &s[colon_pos + 1..];

    let id = Uuid::parse_str(id_str).map_err(|_| CursorError::InvalidId)?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .map_err(|_| CursorError::InvalidTimestamp)?
        .with_timezone(&Utc);

    Ok((timestamp, id))
}

/// Clamps a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_encode_decode_cursor_roundtrip() {
        let timestamp = Utc
            .with_ymd_and_hms(2026, 6, 15, 14, 30, 45)
            .unwrap()
            .with_nanosecond(123456000)
            .unwrap();
        let id = Uuid::new_v4();

        let (decoded_ts, decoded_id) = decode_cursor(&encode_cursor(timestamp, id)).unwrap();

        assert_eq!(decoded_ts.timestamp_micros(), timestamp.timestamp_micros());
        assert_eq!(decoded_id, id);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = decode_cursor("not-valid-base64!!!");
        assert!(matches!(result, Err(CursorError::InvalidEncoding)));
    }

    #[test]
    fn test_decode_missing_colon() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-colon-here");
        assert!(matches!(
            decode_cursor(&invalid),
            Err(CursorError::InvalidFormat)
        ));
    }

    #[test]
    fn test_decode_invalid_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2026-01-15T10:30:00Z:not-a-uuid");
        assert!(matches!(
            decode_cursor(&invalid),
            Err(CursorError::InvalidId)
        ));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let raw = format!("not-a-timestamp:{}", Uuid::nil());
        let invalid = URL_SAFE_NO_PAD.encode(raw.as_bytes());
        assert!(matches!(
            decode_cursor(&invalid),
            Err(CursorError::InvalidTimestamp)
        ));
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_SIZE);
    }
}
