use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::{KEYS, SettingsSource, default_value};

/// In-memory settings store, safe to update while the loop is running.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with the default of every known key.
    pub fn with_defaults() -> Self {
        let store = Self::new();
        for key in KEYS {
            if let Some(value) = default_value(key) {
                store.set_default(key, value);
            }
        }
        store
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.into(), value.into());
    }

    /// Sets `key` only if it has no value yet. Returns the effective value.
    pub fn set_default(&self, key: impl Into<String>, value: impl Into<String>) -> String {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.entry(key.into()).or_insert_with(|| value.into()).clone()
    }
}

impl SettingsSource for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_PART_SIZE, DELAY, PART_SIZE};

    #[test]
    fn set_and_get() {
        let store = MemorySettings::new();
        assert_eq!(store.get(DELAY), None);
        store.set(DELAY, "3");
        assert_eq!(store.get(DELAY).as_deref(), Some("3"));
    }

    #[test]
    fn set_default_keeps_existing() {
        let store = MemorySettings::new();
        store.set(DELAY, "3");
        assert_eq!(store.set_default(DELAY, "60"), "3");
        assert_eq!(store.set_default("other", "x"), "x");
    }

    #[test]
    fn with_defaults_fills_known_keys() {
        let store = MemorySettings::with_defaults();
        assert_eq!(store.get(PART_SIZE), Some(DEFAULT_PART_SIZE.to_string()));
        assert_eq!(store.get(DELAY).as_deref(), Some("60"));
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemorySettings::new());
        let mut handles = vec![];
        for i in 0..8 {
            let s = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    s.set(format!("key_{i}"), j.to_string());
                    let _ = s.get(DELAY);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..8 {
            assert_eq!(store.get(&format!("key_{i}")).as_deref(), Some("49"));
        }
    }
}
