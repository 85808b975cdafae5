//! Server-mode PIN management
//!
//! PINs are hashed with Argon2id and stored as PHC strings. The PHC string
//! carries its own cost parameters, so hashes created under older defaults
//! keep verifying after the library raises them.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::ConfigResolver;
use crate::credentials::CredentialStore;
use crate::error::{LockError, Result};
use crate::gate::SessionGate;
use crate::lockout::LockoutPolicy;

/// Minimum PIN length (bytes, after trimming)
pub const MIN_PIN_LENGTH: usize = 4;
/// Maximum PIN length (bytes, after trimming)
pub const MAX_PIN_LENGTH: usize = 64;
/// Largest failure count accepted from a client report
pub const MAX_REPORTED_FAILURES: i64 = 500;

/// Trim and length-check a PIN for storage
pub fn normalize_pin(pin: &str) -> Result<Zeroizing<String>> {
    let pin = pin.trim();
    if pin.len() < MIN_PIN_LENGTH {
        return Err(LockError::InvalidInput("PIN too short".to_string()));
    }
    if pin.len() > MAX_PIN_LENGTH {
        return Err(LockError::InvalidInput("PIN too long".to_string()));
    }
    Ok(Zeroizing::new(pin.to_string()))
}

/// Hash a PIN with Argon2id at the current default cost
pub fn hash_pin(pin: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());

    Argon2::default()
        .hash_password(&pin_bytes, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LockError::Hashing(e.to_string()))
}

/// Check a PIN against a stored PHC string
///
/// A hash that cannot be parsed never matches.
pub fn verify_pin_hash(pin: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Stored PIN hash is unreadable");
            return false;
        }
    };

    let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());
    Argon2::default()
        .verify_password(&pin_bytes, &parsed)
        .is_ok()
}

/// [`hash_pin`] on the blocking pool
async fn hash_pin_blocking(pin: Zeroizing<String>) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_pin(&pin))
        .await
        .map_err(|e| LockError::Hashing(e.to_string()))?
}

/// [`verify_pin_hash`] on the blocking pool
async fn verify_pin_hash_blocking(pin: Zeroizing<String>, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_pin_hash(&pin, &stored_hash))
        .await
        .map_err(|e| LockError::Hashing(e.to_string()))
}

/// Result of a server-side verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// PIN matched; counter reset
    Unlocked,
    /// PIN did not match
    Fail { remaining: u32 },
    /// Threshold reached; session terminated
    LockedOut,
    /// No PIN set for this user
    NotConfigured,
}

/// Result of a local-mode failure report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Count recorded, below threshold
    Recorded,
    /// Count at or above threshold; session terminated
    LockedOut,
}

/// Server-mode credential and failure-count handling
#[derive(Clone)]
pub struct PinService {
    credentials: CredentialStore,
    resolver: ConfigResolver,
    gate: SessionGate,
}

impl PinService {
    pub fn new(credentials: CredentialStore, resolver: ConfigResolver, gate: SessionGate) -> Self {
        Self {
            credentials,
            resolver,
            gate,
        }
    }

    /// Set or change the user's PIN; resets the failure counter
    pub async fn set_credential(&self, user_id: &str, pin: &str) -> Result<()> {
        let pin = normalize_pin(pin)?;
        let hash = hash_pin_blocking(pin).await?;

        self.credentials.replace_pin_hash(user_id, &hash).await?;
        info!(user_id, "PIN updated");

        Ok(())
    }

    /// Verify a submitted PIN
    pub async fn verify(&self, user_id: &str, pin: &str) -> Result<VerifyOutcome> {
        let pin = Zeroizing::new(pin.trim().to_string());
        if pin.is_empty() {
            return Err(LockError::InvalidInput("Missing PIN".to_string()));
        }

        let Some(hash) = self.credentials.pin_hash(user_id).await? else {
            debug!(user_id, "Verification requested without a PIN set");
            return Ok(VerifyOutcome::NotConfigured);
        };

        let policy = LockoutPolicy::new(self.resolver.max_failures().await);

        if verify_pin_hash_blocking(pin, hash).await? {
            self.credentials.set_failed_attempts(user_id, 0).await?;
            debug!(user_id, "PIN verified");
            return Ok(VerifyOutcome::Unlocked);
        }

        // Plain read-modify-write; concurrent duplicates may miscount by the
        // number of racing requests.
        let attempts = self
            .credentials
            .failed_attempts(user_id)
            .await?
            .saturating_add(1);
        self.credentials
            .set_failed_attempts(user_id, attempts)
            .await?;

        if policy.is_locked_out(attempts) {
            warn!(user_id, attempts, "Failure threshold reached, locking out");
            self.gate.lock_out(user_id, attempts).await;
            return Ok(VerifyOutcome::LockedOut);
        }

        let remaining = policy.remaining(attempts);
        debug!(user_id, attempts, remaining, "Incorrect PIN");
        Ok(VerifyOutcome::Fail { remaining })
    }

    /// Record a failure count reported by a local-mode client
    ///
    /// The count is trusted after clamping to `[0, MAX_REPORTED_FAILURES]`.
    pub async fn report_failure(&self, user_id: &str, count: i64) -> Result<ReportOutcome> {
        let count = count.clamp(0, MAX_REPORTED_FAILURES) as u32;
        let policy = LockoutPolicy::new(self.resolver.max_failures().await);

        self.credentials.set_failed_attempts(user_id, count).await?;

        if policy.is_locked_out(count) {
            warn!(user_id, count, "Local failure threshold reported, locking out");
            self.gate.lock_out(user_id, count).await;
            return Ok(ReportOutcome::LockedOut);
        }

        Ok(ReportOutcome::Recorded)
    }

    /// Force logout on request
    pub async fn lockdown(&self, user_id: &str) {
        info!(user_id, "Lockdown requested");
        self.gate.force_logout(user_id).await;
    }

    /// Current failure counter for the user
    pub async fn failed_attempts(&self, user_id: &str) -> Result<u32> {
        self.credentials.failed_attempts(user_id).await
    }
}
