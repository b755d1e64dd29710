//! Error kinds for keychain operations.
//!
//! Envelope-layer failures are re-kinded at this boundary; no variant
//! ever carries key material, passwords, tokens, or plaintext.

use std::fmt;

use warden_envelope::{DecryptError, EncodingError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeychainError {
    /// Malformed base64, JSON, payload shape, or UUID.
    Encoding,
    /// A token failed to open: wrong key, tampering, or bad shape at the
    /// cryptographic layer. The causes are deliberately indistinguishable.
    Decrypt,
    /// The unlock token opened under the general key, but the password
    /// layer rejected the supplied password.
    InvalidPassword,
    /// Missing or structurally invalid keychain key, or a candidate pair
    /// secret that failed round-trip verification.
    InvalidCredential,
    /// The operation requires an unlocked keychain.
    Locked,
    /// The operation requires a keychain constructed with its secret.
    KeyAccessForbidden,
    /// Invariant violation; indicates a bug, not caller error.
    Internal(String),
}

impl fmt::Display for KeychainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding => write!(f, "encoding error"),
            Self::Decrypt => write!(f, "decryption failed"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::InvalidCredential => write!(f, "invalid keychain credential"),
            Self::Locked => write!(f, "keychain is locked"),
            Self::KeyAccessForbidden => write!(f, "key retrieval not permitted for this keychain"),
            Self::Internal(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for KeychainError {}

impl From<EncodingError> for KeychainError {
    fn from(_: EncodingError) -> Self {
        Self::Encoding
    }
}

impl From<DecryptError> for KeychainError {
    fn from(_: DecryptError) -> Self {
        Self::Decrypt
    }
}
