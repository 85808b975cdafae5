//! Failure threshold policy
//!
//! Unlike a progressive back-off, the lock has a single hard threshold: once
//! the failure counter reaches `max_failures` the session is terminated.
//!
//! - below threshold: `remaining = max_failures - attempts`
//! - at or above threshold: locked out, `remaining = 0`

use crate::config::{clamp_max_failures, DEFAULT_MAX_FAILURES};

/// Hard lockout threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_failures: u32,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

impl LockoutPolicy {
    /// Create a policy, clamping the threshold into its allowed range
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures: clamp_max_failures(i64::from(max_failures)),
        }
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Attempts left after `attempts` failures; never negative
    pub fn remaining(&self, attempts: u32) -> u32 {
        self.max_failures.saturating_sub(attempts)
    }

    /// Whether `attempts` failures end the session
    pub fn is_locked_out(&self, attempts: u32) -> bool {
        attempts >= self.max_failures
    }
}
