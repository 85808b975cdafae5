//! Client-local storage
//!
//! Two instances are used: a persistent store for the local-mode credential
//! and a per-session store for the one-time setup prompt.

use std::collections::HashMap;
use std::sync::Mutex;

use pwalock_core::store::keys;
use pwalock_core::LocalCredential;

/// Synchronous string storage
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values().remove(key);
    }
}

/// Stored local-mode credential, if complete
pub fn load_local_credential(store: &dyn LocalStore) -> Option<LocalCredential> {
    LocalCredential::from_parts(store.get(keys::LOCAL_SALT), store.get(keys::LOCAL_VERIFIER))
}

pub fn store_local_credential(store: &dyn LocalStore, credential: &LocalCredential) {
    store.set(keys::LOCAL_SALT, &credential.salt);
    store.set(keys::LOCAL_VERIFIER, &credential.verifier);
}

pub fn clear_local_credential(store: &dyn LocalStore) {
    store.remove(keys::LOCAL_SALT);
    store.remove(keys::LOCAL_VERIFIER);
}
