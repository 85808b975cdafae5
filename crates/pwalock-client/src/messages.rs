//! User-facing text

pub const IDLE_HINT: &str = "Locked due to inactivity.";
pub const BACKGROUND_HINT: &str = "Locked while in background.";
pub const TOO_SHORT: &str = "Code is too short.";
pub const INCORRECT: &str = "Incorrect code.";
pub const LOCKED_OUT: &str = "Too many failed attempts. You have been logged out.";
pub const VERIFY_ERROR: &str = "Error verifying code.";
pub const SETUP_PROMPT: &str = "To enable PWA Lock, set your code in Personal settings.";
pub const NOT_CONFIGURED: &str =
    "PWA Lock is not configured. Set your code in Personal settings to enable locking.";

/// Inline error after a wrong PIN
pub fn incorrect_with_remaining(remaining: u32) -> String {
    format!("{} Remaining attempts: {}", INCORRECT, remaining)
}
