//! # Warden Keychain
//!
//! A small credential vault built on [`warden_envelope`]'s layered
//! encryptors.
//!
//! A keychain has a stable UUID identity and splits its key material so
//! that writing and reading are separate capabilities: the serialized
//! *keychain key* (UUID + general key + pair public key) lets a process
//! seal new credentials, while opening them additionally requires the
//! *pair secret* — held from birth by the generating process, or
//! installed later through a password token or the master key.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use warden_keychain::Keychain;
//!
//! let keychain = Keychain::generate().unwrap();
//!
//! let token = keychain
//!     .encrypt_credential(&json!({"user": "a", "pw": "b"}))
//!     .unwrap();
//! let value = keychain.decrypt_credential(&token).unwrap();
//!
//! assert_eq!(value, json!({"user": "a", "pw": "b"}));
//! ```
//!
//! ## Recovery
//!
//! [`Keychain::generate_keychain_password_and_token`] re-seals the pair
//! secret under a generated password; an adopted (locked) instance
//! presents the pair to [`Keychain::unlock`] to regain read access.

#![deny(unsafe_code)]

mod context;
mod error;
mod keychain;

pub use context::{KeychainConfig, KeychainContext};
pub use error::KeychainError;
pub use keychain::{Keychain, PasswordGrant};

// Re-export the envelope surface consumers commonly need alongside the
// aggregate.
pub use warden_envelope::{DecryptError, EncodingError, Entropy, OsEntropy};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    /// Deterministic entropy double: a counter byte stream, so two
    /// keychains built from the same seed draw identical material.
    struct CounterEntropy {
        next: AtomicU8,
    }

    impl CounterEntropy {
        fn new(seed: u8) -> Self {
            Self {
                next: AtomicU8::new(seed),
            }
        }
    }

    impl Entropy for CounterEntropy {
        fn fill_bytes(&self, buf: &mut [u8]) {
            for byte in buf.iter_mut() {
                *byte = self.next.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn generated() -> Keychain {
        Keychain::generate().unwrap()
    }

    fn adopted_from(keychain: &Keychain) -> Keychain {
        Keychain::adopt(&keychain.get_keychain_key().unwrap()).unwrap()
    }

    // === Generation ===

    #[test]
    fn test_generate_starts_unlocked_and_retrievable() {
        let k = generated();
        assert!(k.is_unlocked());
        assert!(k.get_keychain_key().is_ok());
        assert!(k.get_master_key().is_ok());
    }

    #[test]
    fn test_generate_uuid_is_canonical() {
        let k = generated();
        let uuid = k.get_uuid();
        assert_eq!(uuid.len(), 36);
        assert_eq!(
            warden_envelope::codec::decompress_uuid(
                &warden_envelope::codec::compress_uuid(uuid).unwrap()
            )
            .unwrap(),
            uuid
        );
    }

    #[test]
    fn test_generated_keychains_are_distinct() {
        let a = generated();
        let b = generated();
        assert_ne!(a.get_uuid(), b.get_uuid());
        assert_ne!(
            a.get_keychain_key().unwrap(),
            b.get_keychain_key().unwrap()
        );
    }

    #[test]
    fn test_generate_is_deterministic_under_scripted_entropy() {
        let a = Keychain::generate_with_entropy(Arc::new(CounterEntropy::new(1))).unwrap();
        let b = Keychain::generate_with_entropy(Arc::new(CounterEntropy::new(1))).unwrap();

        assert_eq!(a.get_uuid(), b.get_uuid());
        assert_eq!(a.get_keychain_key().unwrap(), b.get_keychain_key().unwrap());
        assert_eq!(
            a.get_master_key().unwrap().as_str(),
            b.get_master_key().unwrap().as_str()
        );
    }

    #[test]
    fn test_keychain_key_shape() {
        let k = generated();
        let parts =
            warden_envelope::codec::parse_payload(&k.get_keychain_key().unwrap(), 3).unwrap();
        assert_eq!(parts[0].len(), 16);
        assert_eq!(parts[1].len(), 32);
        assert_eq!(parts[2].len(), 32);
    }

    // === Adoption ===

    #[test]
    fn test_adopt_starts_locked() {
        let k = generated();
        let k2 = adopted_from(&k);
        assert!(!k2.is_unlocked());
        assert_eq!(k2.get_uuid(), k.get_uuid());
    }

    #[test]
    fn test_adopt_rejects_malformed_keys() {
        for bad in [
            "",
            "only-one-part",
            "a.b",
            "a.b.c.d",
            "YQ.YQ.YQ", // parts present but wrong widths
        ] {
            assert_eq!(
                Keychain::adopt(bad).unwrap_err(),
                KeychainError::InvalidCredential,
                "expected rejection for {bad:?}",
            );
        }
    }

    #[test]
    fn test_adopt_with_master_key_grants_retrieval() {
        let k = generated();
        let k2 = Keychain::adopt_with_master_key(
            &k.get_keychain_key().unwrap(),
            &k.get_master_key().unwrap(),
        )
        .unwrap();
        assert!(k2.is_unlocked());
        assert!(k2.get_keychain_key().is_ok());
        assert_eq!(
            k2.get_master_key().unwrap().as_str(),
            k.get_master_key().unwrap().as_str()
        );
    }

    #[test]
    fn test_adopt_with_wrong_master_key_rejected() {
        let k = generated();
        let other = generated();
        assert_eq!(
            Keychain::adopt_with_master_key(
                &k.get_keychain_key().unwrap(),
                &other.get_master_key().unwrap(),
            )
            .unwrap_err(),
            KeychainError::InvalidCredential
        );
    }

    // === S1: generate and read back ===

    #[test]
    fn test_credential_roundtrip() {
        let k = generated();
        let value = json!({"user": "a", "pw": "b"});
        let cipher = k.encrypt_credential(&value).unwrap();
        assert_eq!(k.decrypt_credential(&cipher).unwrap(), value);
    }

    #[test]
    fn test_credential_tokens_are_fresh() {
        let k = generated();
        let a = k.encrypt_credential(&json!("same")).unwrap();
        let b = k.encrypt_credential(&json!("same")).unwrap();
        assert_ne!(a, b);
        assert_eq!(k.decrypt_credential(&a).unwrap(), json!("same"));
        assert_eq!(k.decrypt_credential(&b).unwrap(), json!("same"));
    }

    #[test]
    fn test_locked_instance_can_write_but_not_read() {
        let k = generated();
        let k2 = adopted_from(&k);

        // Write path works while locked; only the generator can read it.
        let cipher = k2.encrypt_credential(&json!("written blind")).unwrap();
        assert_eq!(k.decrypt_credential(&cipher).unwrap(), json!("written blind"));

        assert_eq!(
            k2.decrypt_credential(&cipher).unwrap_err(),
            KeychainError::Locked
        );
    }

    // === S2/S3: password unlock ===

    #[test]
    fn test_password_unlock_roundtrip() {
        let k = generated();
        let grant = k.generate_keychain_password_and_token().unwrap();

        let k2 = adopted_from(&k);
        assert!(!k2.is_unlocked());
        k2.unlock(&grant.password, &grant.token).unwrap();
        assert!(k2.is_unlocked());

        let cipher = k.encrypt_credential(&json!("secret")).unwrap();
        assert_eq!(k2.decrypt_credential(&cipher).unwrap(), json!("secret"));

        // S3: a third instance with the wrong password stays locked.
        let k3 = adopted_from(&k);
        assert_eq!(
            k3.unlock("not-the-password", &grant.token).unwrap_err(),
            KeychainError::InvalidPassword
        );
        assert!(!k3.is_unlocked());
    }

    #[test]
    fn test_unlock_with_garbage_token_is_decrypt_error() {
        let k = generated();
        let k2 = adopted_from(&k);
        assert_eq!(
            k2.unlock("password", "no.token").unwrap_err(),
            KeychainError::Decrypt
        );
    }

    #[test]
    fn test_unlock_when_already_unlocked_is_noop() {
        let k = generated();
        // Already unlocked from birth: both unlock forms return silently.
        k.unlock("anything", "at.all").unwrap();
        k.unlock_using_master_key("whatever").unwrap();
        assert!(k.is_unlocked());
    }

    // === S4: master-key unlock ===

    #[test]
    fn test_master_key_unlock() {
        let k = generated();
        let master = k.get_master_key().unwrap();

        let k2 = adopted_from(&k);
        k2.unlock_using_master_key(&master).unwrap();
        assert!(k2.is_unlocked());

        let cipher = k.encrypt_credential(&json!(["a", "b"])).unwrap();
        assert_eq!(k2.decrypt_credential(&cipher).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_master_key_unlock_rejects_wrong_material() {
        let k = generated();
        let k2 = adopted_from(&k);

        // Wrong length, undecodable, and a valid-but-foreign secret.
        for bad in [
            "wrong-length-or-wrong-key",
            "not base64!",
            generated().get_master_key().unwrap().as_str(),
        ] {
            assert_eq!(
                k2.unlock_using_master_key(bad).unwrap_err(),
                KeychainError::InvalidCredential,
                "expected rejection for {bad:?}",
            );
            assert!(!k2.is_unlocked());
        }
    }

    // === S5: key-access gating ===

    #[test]
    fn test_adopted_instance_never_retrieves_keys() {
        let k = generated();
        let k2 = adopted_from(&k);

        // Locked: the lock gate fires first for the master key.
        assert_eq!(
            k2.get_master_key().unwrap_err(),
            KeychainError::Locked
        );
        assert_eq!(
            k2.get_keychain_key().unwrap_err(),
            KeychainError::KeyAccessForbidden
        );

        // Unlocked later: still no key retrieval.
        k2.unlock_using_master_key(&k.get_master_key().unwrap())
            .unwrap();
        assert_eq!(
            k2.get_keychain_key().unwrap_err(),
            KeychainError::KeyAccessForbidden
        );
        assert_eq!(
            k2.get_master_key().unwrap_err(),
            KeychainError::KeyAccessForbidden
        );
    }

    #[test]
    fn test_locked_gating() {
        let k = generated();
        let k2 = adopted_from(&k);

        assert_eq!(
            k2.decrypt_credential("x.y").unwrap_err(),
            KeychainError::Locked
        );
        assert_eq!(
            k2.generate_keychain_password_and_token().unwrap_err(),
            KeychainError::Locked
        );
        assert_eq!(k2.get_master_key().unwrap_err(), KeychainError::Locked);
    }

    // === S6: tamper ===

    #[test]
    fn test_tampered_credential_never_decrypts_wrong() {
        let k = generated();
        let value = json!("x");
        let cipher = k.encrypt_credential(&value).unwrap();

        for index in (0..cipher.len()).step_by(7) {
            let mut chars: Vec<char> = cipher.chars().collect();
            chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
            let tampered: String = chars.into_iter().collect();

            match k.decrypt_credential(&tampered) {
                Err(KeychainError::Decrypt) | Err(KeychainError::Encoding) => {}
                Ok(v) => panic!("tampered token at {index} decrypted to {v:?}"),
                Err(e) => panic!("unexpected error kind at {index}: {e:?}"),
            }
        }
    }

    // === Password grants ===

    #[test]
    fn test_grants_are_fresh() {
        let k = generated();
        let a = k.generate_keychain_password_and_token().unwrap();
        let b = k.generate_keychain_password_and_token().unwrap();
        assert_ne!(a.password, b.password);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_grant_debug_hides_password() {
        let k = generated();
        let grant = k.generate_keychain_password_and_token().unwrap();
        let rendered = format!("{grant:?}");
        assert!(!rendered.contains(&grant.password));
    }

    // === Context ===

    #[test]
    fn test_context_returns_single_instance() {
        let k = generated();
        let context = KeychainContext::new(KeychainConfig {
            keychain_key: Some(k.get_keychain_key().unwrap()),
        });

        let first = context.current().unwrap();
        let second = context.current().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.get_uuid(), k.get_uuid());
        assert!(!first.is_unlocked());
    }

    #[test]
    fn test_context_without_key_fails() {
        let context = KeychainContext::new(KeychainConfig { keychain_key: None });
        assert_eq!(
            context.current().unwrap_err(),
            KeychainError::InvalidCredential
        );
    }

    #[test]
    fn test_context_with_malformed_key_fails() {
        let context = KeychainContext::new(KeychainConfig {
            keychain_key: Some("a.b".into()),
        });
        assert_eq!(
            context.current().unwrap_err(),
            KeychainError::InvalidCredential
        );
    }

    #[test]
    fn test_context_unlock_is_shared() {
        let k = generated();
        let grant = k.generate_keychain_password_and_token().unwrap();
        let context = KeychainContext::new(KeychainConfig {
            keychain_key: Some(k.get_keychain_key().unwrap()),
        });

        context
            .current()
            .unwrap()
            .unlock(&grant.password, &grant.token)
            .unwrap();
        // The same instance comes back, already unlocked.
        assert!(context.current().unwrap().is_unlocked());
    }
}
