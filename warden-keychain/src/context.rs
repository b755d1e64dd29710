//! Process-wide keychain context.
//!
//! The host's configuration layer constructs one [`KeychainContext`] with
//! the serialized keychain key and asks it for [`KeychainContext::current`]
//! wherever the shared instance is needed. The slot is single-flight:
//! the first successful call adopts the keychain, later calls get the
//! same `Arc`. A failed initialization is not cached, so a later call
//! may retry.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use warden_envelope::{Entropy, OsEntropy};

use crate::error::KeychainError;
use crate::keychain::Keychain;

/// Configuration consumed by the context. The key is optional here so a
/// missing value surfaces as [`KeychainError::InvalidCredential`] at
/// first use rather than at config parse time.
#[derive(Clone, Deserialize)]
pub struct KeychainConfig {
    pub keychain_key: Option<String>,
}

impl std::fmt::Debug for KeychainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainConfig")
            .field("keychain_key", &self.keychain_key.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Lazily adopted, process-wide keychain instance.
pub struct KeychainContext {
    config: KeychainConfig,
    entropy: Arc<dyn Entropy>,
    slot: OnceCell<Arc<Keychain>>,
}

impl KeychainContext {
    pub fn new(config: KeychainConfig) -> Self {
        Self::with_entropy(config, Arc::new(OsEntropy))
    }

    pub fn with_entropy(config: KeychainConfig, entropy: Arc<dyn Entropy>) -> Self {
        Self {
            config,
            entropy,
            slot: OnceCell::new(),
        }
    }

    /// The shared keychain, adopting it from configuration on first call.
    pub fn current(&self) -> Result<Arc<Keychain>, KeychainError> {
        self.slot
            .get_or_try_init(|| {
                let key = self
                    .config
                    .keychain_key
                    .as_deref()
                    .ok_or(KeychainError::InvalidCredential)?;
                let keychain = Keychain::adopt_with_entropy(key, self.entropy.clone())?;
                Ok(Arc::new(keychain))
            })
            .cloned()
    }
}
