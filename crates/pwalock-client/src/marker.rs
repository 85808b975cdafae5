//! Unlocked marker
//!
//! A same-origin flag that survives a page reload inside one browser
//! instance, so a reload right after unlocking does not lock again.
//! The default marker is a host-only cookie with no expiry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Cookie name of the marker
pub const MARKER_COOKIE: &str = "__Host-ncPwaUnlocked";

/// Marker presence, set on unlock and cleared on lock
pub trait UnlockMarker: Send + Sync {
    fn is_set(&self) -> bool;
    fn set(&self);
    fn clear(&self);
}

/// `document.cookie`-like access
pub trait CookieJar: Send + Sync {
    /// All visible cookies as `name=value; name2=value2`
    fn cookie_header(&self) -> String;

    /// Apply a `Set-Cookie`-style assignment
    fn set_cookie(&self, assignment: &str);
}

/// Marker stored as a cookie
#[derive(Clone)]
pub struct CookieMarker {
    jar: Arc<dyn CookieJar>,
    secure: bool,
}

impl CookieMarker {
    /// `secure` adds the `Secure` attribute, as required over TLS
    pub fn new(jar: Arc<dyn CookieJar>, secure: bool) -> Self {
        Self { jar, secure }
    }

    fn secure_attr(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }
}

impl UnlockMarker for CookieMarker {
    fn is_set(&self) -> bool {
        self.jar
            .cookie_header()
            .split(';')
            .any(|pair| pair.trim() == format!("{}=1", MARKER_COOKIE))
    }

    fn set(&self) {
        self.jar.set_cookie(&format!(
            "{}=1; Path=/; SameSite=Lax{}",
            MARKER_COOKIE,
            self.secure_attr()
        ));
    }

    fn clear(&self) {
        self.jar.set_cookie(&format!(
            "{}=; Path=/; Max-Age=0; SameSite=Lax{}",
            MARKER_COOKIE,
            self.secure_attr()
        ));
    }
}

/// In-memory cookie jar
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<String, String>>,
    writes: AtomicU32,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_cookie` calls so far
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_header(&self) -> String {
        let cookies = match self.cookies.lock() {
            Ok(cookies) => cookies,
            Err(poisoned) => poisoned.into_inner(),
        };
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, assignment: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut parts = assignment.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            return;
        };
        let expired = parts.any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));

        let mut cookies = match self.cookies.lock() {
            Ok(cookies) => cookies,
            Err(poisoned) => poisoned.into_inner(),
        };
        if expired {
            cookies.remove(name.trim());
        } else {
            cookies.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
}

/// Plain flag marker
#[derive(Debug, Default)]
pub struct MemoryMarker {
    set: AtomicBool,
    writes: AtomicU32,
}

impl MemoryMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl UnlockMarker for MemoryMarker {
    fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.set.store(true, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.set.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_marker_lifecycle() {
        let jar = Arc::new(MemoryCookieJar::new());
        jar.set_cookie("theme=dark; Path=/");
        let marker = CookieMarker::new(jar.clone(), true);

        assert!(!marker.is_set());
        marker.set();
        assert!(marker.is_set());
        assert_eq!(jar.cookie_header(), "__Host-ncPwaUnlocked=1; theme=dark");

        marker.clear();
        assert!(!marker.is_set());
        assert_eq!(jar.cookie_header(), "theme=dark");
    }

    #[test]
    fn test_other_values_do_not_count() {
        let jar = Arc::new(MemoryCookieJar::new());
        jar.set_cookie("__Host-ncPwaUnlocked=0; Path=/");
        assert!(!CookieMarker::new(jar, false).is_set());
    }

    #[test]
    fn test_memory_marker_counts_writes() {
        let marker = MemoryMarker::new();
        marker.set();
        marker.clear();
        assert!(!marker.is_set());
        assert_eq!(marker.writes(), 2);
    }
}
