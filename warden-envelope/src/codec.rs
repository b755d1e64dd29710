//! Payload and identity codecs.
//!
//! Every token in the system is a dot-joined list of URL-safe unpadded
//! base64 parts. Meaning is positional and fixed per caller, so parsing
//! always asserts the expected part count. UUIDs travel as 16 raw bytes
//! inside payloads and as the canonical hyphenated string everywhere else.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use uuid::Uuid;

use crate::error::EncodingError;

/// Separator between payload parts.
const PART_SEPARATOR: &str = ".";

/// Width of a binary UUID.
pub const UUID_BYTES: usize = 16;

/// URL-safe base64 without `=` padding (`A–Z a–z 0–9 - _`).
pub fn trimmed_b64_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Inverse of [`trimmed_b64_encode`]. Rejects `=`, `+`, `/` and any
/// other byte outside the URL-safe alphabet.
pub fn trimmed_b64_decode(encoded: &str) -> Result<Vec<u8>, EncodingError> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(|_| EncodingError)
}

/// JSON-encode a value.
pub fn safe_json_encode(value: &Value) -> Result<String, EncodingError> {
    serde_json::to_string(value).map_err(|_| EncodingError)
}

/// JSON-decode a string.
pub fn safe_json_decode(encoded: &str) -> Result<Value, EncodingError> {
    serde_json::from_str(encoded).map_err(|_| EncodingError)
}

/// Encode each part and join with `.`.
pub fn stringify_payload(parts: &[&[u8]]) -> String {
    parts
        .iter()
        .map(|part| trimmed_b64_encode(part))
        .collect::<Vec<_>>()
        .join(PART_SEPARATOR)
}

/// Split on `.`, assert the part count, decode each part.
///
/// Empty parts are invalid: every position in a payload carries data.
pub fn parse_payload(payload: &str, expected_parts: usize) -> Result<Vec<Vec<u8>>, EncodingError> {
    let encoded: Vec<&str> = payload.split(PART_SEPARATOR).collect();
    if encoded.len() != expected_parts {
        return Err(EncodingError);
    }

    let mut parts = Vec::with_capacity(encoded.len());
    for enc in encoded {
        if enc.is_empty() {
            return Err(EncodingError);
        }
        parts.push(trimmed_b64_decode(enc)?);
    }
    Ok(parts)
}

/// Canonical hyphenated UUID string → 16 bytes.
///
/// Only the lowercase `8-4-4-4-12` form is accepted; the uuid crate's
/// more permissive formats (simple, braced, urn, uppercase) are not.
pub fn compress_uuid(canonical: &str) -> Result<[u8; UUID_BYTES], EncodingError> {
    if !is_canonical_uuid(canonical) {
        return Err(EncodingError);
    }
    let uuid = Uuid::try_parse(canonical).map_err(|_| EncodingError)?;
    Ok(*uuid.as_bytes())
}

/// 16 bytes → canonical hyphenated UUID string.
pub fn decompress_uuid(bytes: &[u8]) -> Result<String, EncodingError> {
    let raw: [u8; UUID_BYTES] = bytes.try_into().map_err(|_| EncodingError)?;
    Ok(Uuid::from_bytes(raw).as_hyphenated().to_string())
}

fn is_canonical_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.bytes().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
    })
}
