//! # Warden Envelope
//!
//! The cryptographic layer of the warden keychain: three cooperating
//! encryptors over a common token format.
//!
//! - [`GeneralEncryptor`] — AES-256-GCM under a 32-byte symmetric key
//! - [`PairEncryptor`] — `crypto_box` sealed envelopes (X25519 +
//!   XSalsa20-Poly1305) with a fresh ephemeral sender keypair per message
//! - [`PasswordEncryptor`] — Argon2id-derived key feeding the general layer
//!
//! Every token is a dot-joined list of URL-safe unpadded base64 parts
//! (see [`codec`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use warden_envelope::{Encryptor, GeneralEncryptor, OsEntropy};
//!
//! let general = GeneralEncryptor::new(Arc::new(OsEntropy));
//! let key = general.generate_key();
//!
//! let token = general.encrypt(&json!({"user": "a"}), &key).unwrap();
//! let value = general.decrypt(&token, &key).unwrap();
//!
//! assert_eq!(value, json!({"user": "a"}));
//! ```
//!
//! ## Error discipline
//!
//! All decrypt-side failures collapse into the opaque [`DecryptError`];
//! wrong key, tampered token, and malformed shape are indistinguishable
//! by design.

#![deny(unsafe_code)]

pub mod codec;
mod entropy;
mod error;
mod general;
mod pair;
mod password;

use serde_json::Value;

// ---------------------------------------------------------------------------
// The encrypt/decrypt contract
// ---------------------------------------------------------------------------

/// Contract shared by the three encryptors:
/// `decrypt(encrypt(x, k), k) = x` for every JSON-representable `x` and
/// well-formed `k`; any tampering or wrong key fails with [`DecryptError`].
pub trait Encryptor {
    /// Key material needed to produce a token.
    type SealKey: ?Sized;
    /// Key material needed to open a token.
    type OpenKey: ?Sized;

    fn encrypt(&self, value: &Value, key: &Self::SealKey) -> Result<String, EncodingError>;
    fn decrypt(&self, token: &str, key: &Self::OpenKey) -> Result<Value, DecryptError>;
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use entropy::{Entropy, OsEntropy};
pub use error::{DecryptError, EncodingError};
pub use general::{GeneralEncryptor, GeneralKey, GENERAL_KEY_BYTES, GENERAL_NONCE_BYTES};
pub use pair::{
    PairEncryptor, PairKeypair, PairPublicKey, PairSecretKey, PAIR_KEY_BYTES, PAIR_NONCE_BYTES,
};
pub use password::{PasswordEncryptor, PASSWORD_SALT_BYTES};
