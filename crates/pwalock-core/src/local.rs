//! Local-mode verifier derivation
//!
//! In local mode the server never sees the PIN. The client keeps a random
//! salt and a derived verifier in its own storage and compares candidates
//! against it.
//!
//! - `pbkdf2`: PBKDF2-HMAC-SHA256, 120 000 iterations, 32-byte output, salt
//!   is the hex-decoded salt string
//! - `sha256`: SHA-256 over `pin ":" salt_hex`

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::KeyMethod;
use crate::error::{LockError, Result};
use crate::pin::normalize_pin;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 120_000;
/// Random salt size in bytes
pub const SALT_BYTES: usize = 16;
/// Derived verifier size in bytes
pub const VERIFIER_BYTES: usize = 32;

/// Generate a fresh hex-encoded salt
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Derive the hex verifier for `pin` under `salt_hex`
pub fn derive_verifier(pin: &str, salt_hex: &str, method: KeyMethod) -> Result<String> {
    match method {
        KeyMethod::Pbkdf2 => {
            let salt = hex::decode(salt_hex)
                .map_err(|e| LockError::InvalidInput(format!("Invalid salt: {}", e)))?;
            let mut out = Zeroizing::new([0u8; VERIFIER_BYTES]);
            pbkdf2::pbkdf2_hmac::<Sha256>(pin.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut *out);
            Ok(hex::encode(*out))
        }
        KeyMethod::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(pin.as_bytes());
            hasher.update(b":");
            hasher.update(salt_hex.as_bytes());
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

/// Salt and verifier pair kept in client storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCredential {
    pub salt: String,
    pub verifier: String,
}

impl LocalCredential {
    /// Create a credential for a new PIN with a fresh salt
    pub fn create(pin: &str, method: KeyMethod) -> Result<Self> {
        let pin = normalize_pin(pin)?;
        let salt = generate_salt();
        let verifier = derive_verifier(&pin, &salt, method)?;
        Ok(Self { salt, verifier })
    }

    /// Rebuild from stored values; both must be present and non-empty
    pub fn from_parts(salt: Option<String>, verifier: Option<String>) -> Option<Self> {
        match (salt, verifier) {
            (Some(salt), Some(verifier)) if !salt.is_empty() && !verifier.is_empty() => {
                Some(Self { salt, verifier })
            }
            _ => None,
        }
    }

    /// Whether `pin` derives to the stored verifier
    ///
    /// A malformed salt is a mismatch, not an error.
    pub fn matches(&self, pin: &str, method: KeyMethod) -> bool {
        match derive_verifier(pin, &self.salt, method) {
            Ok(candidate) => candidate.as_bytes().ct_eq(self.verifier.as_bytes()).into(),
            Err(_) => false,
        }
    }
}
