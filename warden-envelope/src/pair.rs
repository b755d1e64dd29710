//! Pair layer: asymmetric sealed envelopes (X25519 + XSalsa20-Poly1305).
//!
//! A fresh ephemeral sender keypair is drawn for every message and the
//! ephemeral public key travels inside the token, so any holder of the
//! recipient public key can seal and only the recipient secret can open.
//!
//! Token shape: `payload([nonce(24), ephemeral_public(32), ciphertext||tag])`.

use std::sync::Arc;

use crypto_box::aead::Aead;
use crypto_box::{Nonce, SalsaBox};
use serde_json::Value;
use zeroize::Zeroizing;

use crate::codec;
use crate::entropy::Entropy;
use crate::error::{DecryptError, EncodingError};
use crate::Encryptor;

/// XSalsa20 nonce width.
pub const PAIR_NONCE_BYTES: usize = 24;

/// X25519 key width (public and secret).
pub const PAIR_KEY_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Recipient half of a pair keypair. Safe to publish: it grants seal
/// capability only.
#[derive(Clone, Debug)]
pub struct PairPublicKey(crypto_box::PublicKey);

impl PairPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: [u8; PAIR_KEY_BYTES] = bytes.try_into().map_err(|_| EncodingError)?;
        Ok(Self(crypto_box::PublicKey::from(raw)))
    }

    pub fn as_bytes(&self) -> &[u8; PAIR_KEY_BYTES] {
        self.0.as_bytes()
    }
}

/// Reading half of a pair keypair. The inner key zeroizes on drop.
#[derive(Clone)]
pub struct PairSecretKey(crypto_box::SecretKey);

impl PairSecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: [u8; PAIR_KEY_BYTES] = bytes.try_into().map_err(|_| EncodingError)?;
        Ok(Self(crypto_box::SecretKey::from(raw)))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; PAIR_KEY_BYTES]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// The public key this secret corresponds to.
    pub fn public_key(&self) -> PairPublicKey {
        PairPublicKey(self.0.public_key())
    }
}

impl core::fmt::Debug for PairSecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PairSecretKey(..)")
    }
}

/// A freshly generated pair keypair.
pub struct PairKeypair {
    pub public: PairPublicKey,
    pub secret: PairSecretKey,
}

// ---------------------------------------------------------------------------
// Encryptor
// ---------------------------------------------------------------------------

/// Asymmetric authenticated encryptor (`crypto_box` construction).
#[derive(Clone)]
pub struct PairEncryptor {
    entropy: Arc<dyn Entropy>,
}

impl PairEncryptor {
    pub fn new(entropy: Arc<dyn Entropy>) -> Self {
        Self { entropy }
    }

    /// Fresh X25519 keypair from the entropy capability.
    pub fn generate_keys(&self) -> PairKeypair {
        let secret = self.generate_secret();
        PairKeypair {
            public: secret.public_key(),
            secret,
        }
    }

    fn generate_secret(&self) -> PairSecretKey {
        let mut seed = Zeroizing::new([0u8; PAIR_KEY_BYTES]);
        self.entropy.fill_bytes(seed.as_mut_slice());
        PairSecretKey(crypto_box::SecretKey::from(*seed))
    }
}

impl Encryptor for PairEncryptor {
    type SealKey = PairPublicKey;
    type OpenKey = PairSecretKey;

    fn encrypt(&self, value: &Value, key: &PairPublicKey) -> Result<String, EncodingError> {
        let plaintext = Zeroizing::new(codec::safe_json_encode(value)?);

        let mut nonce = [0u8; PAIR_NONCE_BYTES];
        self.entropy.fill_bytes(&mut nonce);

        // The ephemeral secret lives only for this seal.
        let ephemeral = self.generate_secret();
        let ephemeral_public = ephemeral.public_key();

        let sealer = SalsaBox::new(&key.0, &ephemeral.0);
        let ciphertext = sealer
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| EncodingError)?;

        Ok(codec::stringify_payload(&[
            &nonce,
            ephemeral_public.as_bytes(),
            &ciphertext,
        ]))
    }

    fn decrypt(&self, token: &str, key: &PairSecretKey) -> Result<Value, DecryptError> {
        let parts = codec::parse_payload(token, 3)?;
        let (nonce, ephemeral_public, ciphertext) = (&parts[0], &parts[1], &parts[2]);
        if nonce.len() != PAIR_NONCE_BYTES {
            return Err(DecryptError);
        }
        let sender = PairPublicKey::from_bytes(ephemeral_public).map_err(|_| DecryptError)?;

        let opener = SalsaBox::new(&sender.0, &key.0);
        let plaintext = Zeroizing::new(
            opener
                .decrypt(Nonce::from_slice(nonce), ciphertext.as_slice())
                .map_err(|_| DecryptError)?,
        );

        let text = core::str::from_utf8(&plaintext).map_err(|_| DecryptError)?;
        codec::safe_json_decode(text).map_err(|_| DecryptError)
    }
}
