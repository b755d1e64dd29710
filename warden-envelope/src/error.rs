//! Unified error types for the envelope layer.

use core::fmt;

/// Any failure while opening a token: bad payload shape, wrong key,
/// AEAD tag mismatch, malformed plaintext. Deliberately opaque — a
/// distinguishable failure would leak oracle information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptError;

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decryption failed")
    }
}

impl std::error::Error for DecryptError {}

/// Malformed base64, malformed JSON, wrong payload part count, or a
/// malformed UUID. Also covers seal-side failures (key shape, cipher
/// init) so the encrypt path never exposes primitive-level detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingError;

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error")
    }
}

impl std::error::Error for EncodingError {}

/// Normalize encode errors into decrypt errors (oracle discipline).
impl From<EncodingError> for DecryptError {
    fn from(_: EncodingError) -> Self {
        DecryptError
    }
}
