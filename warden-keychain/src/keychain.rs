//! The keychain aggregate: credential pipeline, unlock protocols, and
//! gated key exports.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use warden_envelope::codec;
use warden_envelope::{
    Encryptor, Entropy, GeneralEncryptor, GeneralKey, OsEntropy, PairEncryptor, PairPublicKey,
    PairSecretKey, PasswordEncryptor,
};

use crate::error::KeychainError;

/// Width of the verifier drawn when checking a candidate pair secret.
const VERIFIER_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// The three-part public identity of a keychain. Positional order is the
/// wire order: uuid(16), general key(32), pair public(32).
struct Credentials {
    uuid_bytes: [u8; codec::UUID_BYTES],
    general_key: GeneralKey,
    pair_public: PairPublicKey,
}

impl Credentials {
    fn parse(keychain_key: &str) -> Result<Self, KeychainError> {
        let parts =
            codec::parse_payload(keychain_key, 3).map_err(|_| KeychainError::InvalidCredential)?;

        let uuid_bytes: [u8; codec::UUID_BYTES] = parts[0]
            .as_slice()
            .try_into()
            .map_err(|_| KeychainError::InvalidCredential)?;
        let general_key =
            GeneralKey::from_bytes(&parts[1]).map_err(|_| KeychainError::InvalidCredential)?;
        let pair_public =
            PairPublicKey::from_bytes(&parts[2]).map_err(|_| KeychainError::InvalidCredential)?;

        Ok(Self {
            uuid_bytes,
            general_key,
            pair_public,
        })
    }

    fn to_payload(&self) -> String {
        codec::stringify_payload(&[
            &self.uuid_bytes,
            self.general_key.as_bytes(),
            self.pair_public.as_bytes(),
        ])
    }
}

// ---------------------------------------------------------------------------
// Password grant
// ---------------------------------------------------------------------------

/// A freshly issued `(password, token)` pair. The password is the secret
/// half and is zeroized when the grant drops; the token is storable.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PasswordGrant {
    pub password: String,
    #[zeroize(skip)]
    pub token: String,
}

impl std::fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("password", &"..")
            .field("token", &self.token)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Keychain
// ---------------------------------------------------------------------------

/// A credential vault with a stable UUID identity.
///
/// The aggregate is write-capable from birth (sealing needs only the
/// public credentials) and read-capable once the pair secret is present —
/// either from construction or from a later unlock. All fields except the
/// one-shot secret slot are immutable, so `&self` methods are safe to
/// call from a shared `Arc<Keychain>`.
pub struct Keychain {
    uuid: String,
    credentials: Credentials,
    pair_secret: OnceCell<PairSecretKey>,
    can_retrieve_keys: bool,
    general: GeneralEncryptor,
    pair: PairEncryptor,
    password: PasswordEncryptor,
    entropy: Arc<dyn Entropy>,
}

impl Keychain {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Create a brand-new keychain: fresh UUID, fresh general key, fresh
    /// pair keypair. The secret is held, so the result is unlocked and
    /// key-retrieval capable.
    pub fn generate() -> Result<Self, KeychainError> {
        Self::generate_with_entropy(Arc::new(OsEntropy))
    }

    /// [`Keychain::generate`] with an explicit entropy source.
    pub fn generate_with_entropy(entropy: Arc<dyn Entropy>) -> Result<Self, KeychainError> {
        let mut seed = [0u8; codec::UUID_BYTES];
        entropy.fill_bytes(&mut seed);
        let uuid_bytes = *uuid::Builder::from_random_bytes(seed).into_uuid().as_bytes();

        let general = GeneralEncryptor::new(entropy.clone());
        let pair = PairEncryptor::new(entropy.clone());
        let general_key = general.generate_key();
        let keys = pair.generate_keys();

        let credentials = Credentials {
            uuid_bytes,
            general_key,
            pair_public: keys.public,
        };
        let keychain = Self::from_parts(credentials, Some(keys.secret), entropy)?;
        info!(uuid = %keychain.uuid, "keychain generated");
        Ok(keychain)
    }

    /// Adopt an existing keychain from its serialized keychain key. The
    /// result is locked and can never retrieve keys; it accepts writes
    /// and may be unlocked later by password token or master key.
    pub fn adopt(keychain_key: &str) -> Result<Self, KeychainError> {
        Self::adopt_with_entropy(keychain_key, Arc::new(OsEntropy))
    }

    /// [`Keychain::adopt`] with an explicit entropy source.
    pub fn adopt_with_entropy(
        keychain_key: &str,
        entropy: Arc<dyn Entropy>,
    ) -> Result<Self, KeychainError> {
        let credentials = Credentials::parse(keychain_key)?;
        let keychain = Self::from_parts(credentials, None, entropy)?;
        info!(uuid = %keychain.uuid, "keychain adopted (locked)");
        Ok(keychain)
    }

    /// Adopt with the pair secret injected at birth: unlocked and
    /// key-retrieval capable, as if this process had generated it.
    pub fn adopt_with_master_key(
        keychain_key: &str,
        master_key: &str,
    ) -> Result<Self, KeychainError> {
        let credentials = Credentials::parse(keychain_key)?;
        let secret = Self::decode_master_key(master_key)?;
        let keychain = Self::from_parts(credentials, Some(secret), Arc::new(OsEntropy))?;
        info!(uuid = %keychain.uuid, "keychain adopted with master key");
        Ok(keychain)
    }

    /// Common constructor. Validates the credential invariants and, when
    /// a pair secret is supplied, verifies it against the pair public key
    /// before installing it.
    fn from_parts(
        credentials: Credentials,
        pair_secret: Option<PairSecretKey>,
        entropy: Arc<dyn Entropy>,
    ) -> Result<Self, KeychainError> {
        let uuid = codec::decompress_uuid(&credentials.uuid_bytes)
            .map_err(|_| KeychainError::InvalidCredential)?;

        let keychain = Self {
            uuid,
            credentials,
            pair_secret: OnceCell::new(),
            can_retrieve_keys: pair_secret.is_some(),
            general: GeneralEncryptor::new(entropy.clone()),
            pair: PairEncryptor::new(entropy.clone()),
            password: PasswordEncryptor::new(entropy.clone()),
            entropy,
        };

        if let Some(secret) = pair_secret {
            keychain.verify_pair_secret(&secret)?;
            let _ = keychain.pair_secret.set(secret);
        }
        Ok(keychain)
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Whether the pair secret is present (credentials can be read).
    pub fn is_unlocked(&self) -> bool {
        self.pair_secret.get().is_some()
    }

    /// Canonical UUID string identity.
    pub fn get_uuid(&self) -> &str {
        &self.uuid
    }

    // -----------------------------------------------------------------------
    // Unlock protocols
    // -----------------------------------------------------------------------

    /// Unlock with a `(password, token)` pair previously issued by
    /// [`Keychain::generate_keychain_password_and_token`].
    ///
    /// The token opens in two stages: the general key peels the outer
    /// layer, then the password opens the inner password token. A failure
    /// in the first stage is a [`KeychainError::Decrypt`]; a failure in
    /// the second is [`KeychainError::InvalidPassword`] — distinguishable
    /// because the token itself already authenticated under the general
    /// key. Unlocking an unlocked keychain is a no-op.
    pub fn unlock(&self, password: &str, token: &str) -> Result<(), KeychainError> {
        if self.is_unlocked() {
            return Ok(());
        }

        let inner = self
            .general
            .decrypt(token, &self.credentials.general_key)
            .map_err(|_| {
                warn!(uuid = %self.uuid, "unlock rejected: token failed to open");
                KeychainError::Decrypt
            })?;
        let Value::String(password_token) = inner else {
            warn!(uuid = %self.uuid, "unlock rejected: token failed to open");
            return Err(KeychainError::Decrypt);
        };

        let opened = self
            .password
            .decrypt(&password_token, password)
            .map_err(|_| {
                warn!(uuid = %self.uuid, "unlock rejected: invalid password");
                KeychainError::InvalidPassword
            })?;
        let Value::String(encoded_secret) = opened else {
            warn!(uuid = %self.uuid, "unlock rejected: recovered secret is malformed");
            return Err(KeychainError::InvalidCredential);
        };

        let secret = Self::decode_master_key(&encoded_secret).map_err(|err| {
            warn!(uuid = %self.uuid, "unlock rejected: recovered secret is malformed");
            err
        })?;
        self.verify_pair_secret(&secret)?;
        let _ = self.pair_secret.set(secret);
        debug!(uuid = %self.uuid, "keychain unlocked with password token");
        Ok(())
    }

    /// Unlock with the base64-encoded pair secret directly.
    pub fn unlock_using_master_key(&self, master_key: &str) -> Result<(), KeychainError> {
        if self.is_unlocked() {
            return Ok(());
        }

        let secret = Self::decode_master_key(master_key).map_err(|err| {
            warn!(uuid = %self.uuid, "unlock rejected: malformed master key");
            err
        })?;
        self.verify_pair_secret(&secret)?;
        let _ = self.pair_secret.set(secret);
        debug!(uuid = %self.uuid, "keychain unlocked with master key");
        Ok(())
    }

    fn decode_master_key(master_key: &str) -> Result<PairSecretKey, KeychainError> {
        let bytes = Zeroizing::new(
            codec::trimmed_b64_decode(master_key)
                .map_err(|_| KeychainError::InvalidCredential)?,
        );
        PairSecretKey::from_bytes(&bytes).map_err(|_| KeychainError::InvalidCredential)
    }

    /// Round-trip a random verifier through the pair layer to prove the
    /// candidate secret matches this keychain's pair public key. The
    /// asymmetric primitive cannot be trusted to reject a mismatched
    /// secret on real tokens, so the check happens before installation.
    fn verify_pair_secret(&self, candidate: &PairSecretKey) -> Result<(), KeychainError> {
        let mut raw = [0u8; VERIFIER_BYTES];
        self.entropy.fill_bytes(&mut raw);
        let verifier = codec::trimmed_b64_encode(&raw);

        let sealed = self
            .pair
            .encrypt(&Value::String(verifier.clone()), &self.credentials.pair_public)
            .map_err(|_| KeychainError::Internal("verifier seal failed".into()))?;
        let opened = self
            .pair
            .decrypt(&sealed, candidate)
            .map_err(|_| KeychainError::InvalidCredential)?;

        match opened {
            Value::String(echo) if bool::from(echo.as_bytes().ct_eq(verifier.as_bytes())) => Ok(()),
            _ => {
                warn!(uuid = %self.uuid, "pair secret verification failed");
                Err(KeychainError::InvalidCredential)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Credential pipeline
    // -----------------------------------------------------------------------

    /// Seal a credential value. Write path: works on locked and unlocked
    /// keychains alike, since it needs only the public credentials.
    ///
    /// The value is pair-sealed under the pair public key, then the
    /// resulting token is general-sealed under the general key, so
    /// opening a stored credential requires both the pair secret and the
    /// general key.
    pub fn encrypt_credential(&self, value: &Value) -> Result<String, KeychainError> {
        let inner = self.pair.encrypt(value, &self.credentials.pair_public)?;
        let token = self
            .general
            .encrypt(&Value::String(inner), &self.credentials.general_key)?;
        Ok(token)
    }

    /// Open a credential token. Requires the unlocked state.
    pub fn decrypt_credential(&self, token: &str) -> Result<Value, KeychainError> {
        let secret = self.pair_secret.get().ok_or(KeychainError::Locked)?;

        let inner = self
            .general
            .decrypt(token, &self.credentials.general_key)?;
        let Value::String(pair_token) = inner else {
            return Err(KeychainError::Decrypt);
        };
        Ok(self.pair.decrypt(&pair_token, secret)?)
    }

    // -----------------------------------------------------------------------
    // Token issuance
    // -----------------------------------------------------------------------

    /// Issue a fresh `(password, token)` pair that can later unlock an
    /// adopted instance of this keychain. Requires the unlocked state.
    ///
    /// The pair secret is password-sealed, then the password token is
    /// general-sealed, so a token stolen from storage cannot be attacked
    /// offline without the general key.
    pub fn generate_keychain_password_and_token(&self) -> Result<PasswordGrant, KeychainError> {
        let secret = self.pair_secret.get().ok_or(KeychainError::Locked)?;

        let password = Zeroizing::new(self.entropy.generate_password());
        let encoded_secret = Zeroizing::new(codec::trimmed_b64_encode(secret.to_bytes().as_slice()));

        let inner = self
            .password
            .encrypt(&Value::String(encoded_secret.to_string()), &password)?;
        let token = self
            .general
            .encrypt(&Value::String(inner), &self.credentials.general_key)?;

        info!(uuid = %self.uuid, "issued keychain password and token");
        Ok(PasswordGrant {
            password: password.to_string(),
            token,
        })
    }

    // -----------------------------------------------------------------------
    // Gated exports
    // -----------------------------------------------------------------------

    /// Serialized three-part keychain key (write-capable identity).
    /// Only a keychain constructed with its secret may export it.
    pub fn get_keychain_key(&self) -> Result<String, KeychainError> {
        if !self.can_retrieve_keys {
            return Err(KeychainError::KeyAccessForbidden);
        }
        Ok(self.credentials.to_payload())
    }

    /// Base64-encoded pair secret (full read capability). Requires the
    /// unlocked state and key-retrieval permission.
    pub fn get_master_key(&self) -> Result<Zeroizing<String>, KeychainError> {
        let secret = self.pair_secret.get().ok_or(KeychainError::Locked)?;
        if !self.can_retrieve_keys {
            return Err(KeychainError::KeyAccessForbidden);
        }
        Ok(Zeroizing::new(codec::trimmed_b64_encode(
            secret.to_bytes().as_slice(),
        )))
    }
}

impl std::fmt::Debug for Keychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keychain")
            .field("uuid", &self.uuid)
            .field("unlocked", &self.is_unlocked())
            .field("can_retrieve_keys", &self.can_retrieve_keys)
            .finish()
    }
}
