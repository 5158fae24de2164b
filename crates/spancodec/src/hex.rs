//! Lower-hex encoding of trace and span identifiers.
//!
//! IDs are written as exactly 16 (64-bit) or 32 (128-bit) lower-case hex
//! characters. Parsing is strict: upper-case digits and `0x` prefixes are
//! rejected rather than normalized.

use crate::error::{Error, Result};
use crate::types::TraceId;

/// Writes a 64-bit ID as 16 lower-hex characters, zero-padded.
pub fn write_id(id: u64) -> String {
    hex::encode(id.to_be_bytes())
}

/// Writes a trace ID at its original width: 32 characters when the high
/// half is set, otherwise 16.
pub fn write_trace_id(trace_id: &TraceId) -> String {
    if trace_id.high == 0 {
        write_id(trace_id.low)
    } else {
        let mut s = String::with_capacity(32);
        s.push_str(&write_id(trace_id.high));
        s.push_str(&write_id(trace_id.low));
        s
    }
}

/// Parses a 1 to 16 character lower-hex ID. `field` names the ID in errors.
pub fn parse_id(field: &str, text: &str) -> Result<u64> {
    if text.is_empty() || text.len() > 16 {
        return Err(Error::invalid(format!(
            "{field} should be a 1 to 16 character lower-hex string with no prefix"
        )));
    }
    lower_hex_to_u64(text)
}

/// Parses a 1 to 32 character lower-hex trace ID. Characters beyond the
/// trailing 16 are the high 64 bits.
pub fn parse_trace_id(text: &str) -> Result<TraceId> {
    let len = text.len();
    if len == 0 || len > 32 {
        return Err(Error::invalid(
            "traceId should be a 1 to 32 character lower-hex string with no prefix",
        ));
    }
    if !text.bytes().all(is_lower_hex) {
        return Err(not_lower_hex(text));
    }
    let split = len.saturating_sub(16);
    Ok(TraceId {
        high: lower_hex_to_u64(&text[..split])?,
        low: lower_hex_to_u64(&text[split..])?,
    })
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

fn lower_hex_to_u64(text: &str) -> Result<u64> {
    let mut result = 0u64;
    for b in text.bytes() {
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => return Err(not_lower_hex(text)),
        };
        result = (result << 4) | nibble as u64;
    }
    Ok(result)
}

fn not_lower_hex(text: &str) -> Error {
    Error::invalid(format!("{text} should be lower-hex encoded with no prefix"))
}
