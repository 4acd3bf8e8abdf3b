//! UTC timestamp formatting/parsing for the on-disk `created`/`lastUpdate`
//! fields (spec §3, §6): `MM/dd/yyyy HH:mm:ss.ffffff`, NUL-padded to 32 bytes.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

const FORMAT: &str = "%m/%d/%Y %H:%M:%S%.6f";

/// Width in bytes of the on-disk timestamp field.
pub const TIMESTAMP_FIELD_WIDTH: usize = 32;

/// Returns the current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Formats `ts` as the fixed on-disk string, NUL-padded to
/// [`TIMESTAMP_FIELD_WIDTH`] bytes.
pub fn encode(ts: DateTime<Utc>) -> Vec<u8> {
    let text = ts.format(FORMAT).to_string();
    let mut buf = vec![0u8; TIMESTAMP_FIELD_WIDTH];
    let bytes = text.as_bytes();
    assert!(bytes.len() <= TIMESTAMP_FIELD_WIDTH, "timestamp overflowed its field");
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

/// Parses a NUL-padded on-disk timestamp field back into a `DateTime<Utc>`.
pub fn decode(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let text = crate::codec::unpack_fixed_str(bytes)?;
    DateTime::parse_from_str(&format!("{text} +0000"), &format!("{FORMAT} %z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Malformed(format!("invalid timestamp `{text}`: {e}")))
}
