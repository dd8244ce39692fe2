//! API key storage.

use std::sync::RwLock;

/// Environment variable the key is seeded from.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Holder of the generative API key.
pub trait KeyStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, key: String);
    fn clear(&self);
}

/// In-process key store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: RwLock<Option<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(key.into());
        store
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, key: String) {
        let key = key.trim().to_string();
        let mut slot = self.key.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = (!key.is_empty()).then_some(key);
    }

    fn clear(&self) {
        *self.key.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Key store seeded from [`API_KEY_ENV`]; `set`/`clear` override it in-process.
#[derive(Debug, Default)]
pub struct EnvKeyStore {
    inner: MemoryKeyStore,
}

impl EnvKeyStore {
    pub fn from_env() -> Self {
        let inner = MemoryKeyStore::new();
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            inner.set(key);
        }
        Self { inner }
    }
}

impl KeyStore for EnvKeyStore {
    fn get(&self) -> Option<String> {
        self.inner.get()
    }

    fn set(&self, key: String) {
        self.inner.set(key)
    }

    fn clear(&self) {
        self.inner.clear()
    }
}
