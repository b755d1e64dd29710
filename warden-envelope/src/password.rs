//! Password layer: Argon2id key derivation over the general layer.
//!
//! Token shape: `payload([salt(16), general_token_bytes])`. The inner
//! part is a complete general token produced under the derived key.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::codec;
use crate::entropy::Entropy;
use crate::error::{DecryptError, EncodingError};
use crate::general::{GeneralEncryptor, GeneralKey, GENERAL_KEY_BYTES};
use crate::Encryptor;

/// Argon2id salt width.
pub const PASSWORD_SALT_BYTES: usize = 16;

// Argon2id MODERATE parameters. Frozen: existing tokens were produced
// with exactly these and rotating them breaks every stored token.
const ARGON2_M_COST_KIB: u32 = 262_144; // 256 MiB
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 1;

/// Password-based encryptor. Owns the general encryptor it delegates
/// the symmetric seal to.
#[derive(Clone)]
pub struct PasswordEncryptor {
    general: GeneralEncryptor,
    entropy: Arc<dyn Entropy>,
}

impl PasswordEncryptor {
    pub fn new(entropy: Arc<dyn Entropy>) -> Self {
        Self {
            general: GeneralEncryptor::new(entropy.clone()),
            entropy,
        }
    }

    /// Derive the 32-byte symmetric key for `password` under `salt`.
    fn derive_key(password: &str, salt: &[u8]) -> Result<GeneralKey, EncodingError> {
        let params = Params::new(
            ARGON2_M_COST_KIB,
            ARGON2_T_COST,
            ARGON2_P_COST,
            Some(GENERAL_KEY_BYTES),
        )
        .map_err(|_| EncodingError)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; GENERAL_KEY_BYTES]);
        argon2
            .hash_password_into(password.as_bytes(), salt, key.as_mut_slice())
            .map_err(|_| EncodingError)?;
        Ok(GeneralKey::from(*key))
    }
}

impl Encryptor for PasswordEncryptor {
    type SealKey = str;
    type OpenKey = str;

    fn encrypt(&self, value: &Value, password: &str) -> Result<String, EncodingError> {
        let mut salt = [0u8; PASSWORD_SALT_BYTES];
        self.entropy.fill_bytes(&mut salt);

        let key = Self::derive_key(password, &salt)?;
        let inner = self.general.encrypt(value, &key)?;

        Ok(codec::stringify_payload(&[&salt, inner.as_bytes()]))
    }

    fn decrypt(&self, token: &str, password: &str) -> Result<Value, DecryptError> {
        let parts = codec::parse_payload(token, 2)?;
        let (salt, inner) = (&parts[0], &parts[1]);
        if salt.len() != PASSWORD_SALT_BYTES {
            return Err(DecryptError);
        }

        let key = Self::derive_key(password, salt).map_err(|_| DecryptError)?;
        let inner = core::str::from_utf8(inner).map_err(|_| DecryptError)?;
        self.general.decrypt(inner, &key)
    }
}
