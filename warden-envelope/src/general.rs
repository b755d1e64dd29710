//! General layer: AES-256-GCM over JSON plaintext.
//!
//! Token shape: `payload([nonce(12), ciphertext||tag])`. The associated
//! data is `nonce[4..8]` — a public function of a public input, fixed so
//! that tokens from conforming implementations interoperate. Do not omit
//! or vary it.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::codec;
use crate::entropy::Entropy;
use crate::error::{DecryptError, EncodingError};
use crate::Encryptor;

/// AES-256-GCM nonce width.
pub const GENERAL_NONCE_BYTES: usize = 12;

/// Symmetric key width.
pub const GENERAL_KEY_BYTES: usize = 32;

/// The nonce slice bound into the AEAD as associated data.
const AAD_START: usize = 4;
const AAD_END: usize = 8;

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// 32-byte symmetric key. Zeroized on drop, opaque in debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GeneralKey([u8; GENERAL_KEY_BYTES]);

impl GeneralKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: [u8; GENERAL_KEY_BYTES] = bytes.try_into().map_err(|_| EncodingError)?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; GENERAL_KEY_BYTES] {
        &self.0
    }
}

impl From<[u8; GENERAL_KEY_BYTES]> for GeneralKey {
    fn from(raw: [u8; GENERAL_KEY_BYTES]) -> Self {
        Self(raw)
    }
}

impl core::fmt::Debug for GeneralKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("GeneralKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Encryptor
// ---------------------------------------------------------------------------

/// Symmetric AEAD encryptor.
#[derive(Clone)]
pub struct GeneralEncryptor {
    entropy: Arc<dyn Entropy>,
}

impl GeneralEncryptor {
    pub fn new(entropy: Arc<dyn Entropy>) -> Self {
        Self { entropy }
    }

    /// 32 uniform random bytes.
    pub fn generate_key(&self) -> GeneralKey {
        let mut raw = [0u8; GENERAL_KEY_BYTES];
        self.entropy.fill_bytes(&mut raw);
        GeneralKey(raw)
    }
}

impl Encryptor for GeneralEncryptor {
    type SealKey = GeneralKey;
    type OpenKey = GeneralKey;

    fn encrypt(&self, value: &Value, key: &GeneralKey) -> Result<String, EncodingError> {
        let plaintext = Zeroizing::new(codec::safe_json_encode(value)?);

        let mut nonce = [0u8; GENERAL_NONCE_BYTES];
        self.entropy.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| EncodingError)?;
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: &nonce[AAD_START..AAD_END],
        };
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| EncodingError)?;

        Ok(codec::stringify_payload(&[&nonce, &ciphertext]))
    }

    fn decrypt(&self, token: &str, key: &GeneralKey) -> Result<Value, DecryptError> {
        let parts = codec::parse_payload(token, 2)?;
        let (nonce, ciphertext) = (&parts[0], &parts[1]);
        if nonce.len() != GENERAL_NONCE_BYTES {
            return Err(DecryptError);
        }

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| DecryptError)?;
        let payload = Payload {
            msg: ciphertext.as_slice(),
            aad: &nonce[AAD_START..AAD_END],
        };
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| DecryptError)?,
        );

        let text = core::str::from_utf8(&plaintext).map_err(|_| DecryptError)?;
        codec::safe_json_decode(text).map_err(|_| DecryptError)
    }
}
