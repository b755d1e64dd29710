//! Injected randomness capability.
//!
//! Everything that needs random material — nonces, salts, keypair seeds,
//! generated passwords — draws it through [`Entropy`], so callers control
//! the source and tests can substitute their own.

use rand_core::{OsRng, RngCore};

/// Password alphabet: 64 printable symbols, so a random byte masked to
/// 6 bits maps uniformly onto it.
const PASSWORD_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generated password length in characters (6 bits each, 192 bits total).
const PASSWORD_CHARS: usize = 32;

/// Source of random bytes and generated passwords.
pub trait Entropy: Send + Sync {
    /// Fill `buf` with uniform random bytes.
    fn fill_bytes(&self, buf: &mut [u8]);

    /// Draw a fresh high-entropy printable password.
    fn generate_password(&self) -> String {
        let mut raw = [0u8; PASSWORD_CHARS];
        self.fill_bytes(&mut raw);
        raw.iter()
            .map(|b| PASSWORD_ALPHABET[(b & 0x3f) as usize] as char)
            .collect()
    }
}

/// Operating-system CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill_bytes(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}
