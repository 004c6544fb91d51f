//! JSON file settings store.
//!
//! The file is a flat JSON object, e.g. `{"part_size": 1048576, "delay": 30}`.
//! Numbers and strings are both accepted. The file is read once per lookup
//! (once per [`DownloadSettings::load`]), so edits take effect on the next
//! delivery cycle.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{DownloadSettings, SettingsError, SettingsSource};

/// Settings backed by a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `value` under `key`, creating the file if needed.
    ///
    /// The value is validated first; it is written as a JSON number.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let parsed = DownloadSettings::validate(key, value)?;

        let mut values = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => return Err(SettingsError::NotAnObject(self.path.clone())),
            }
        } else {
            Map::new()
        };
        values.insert(key.to_string(), Value::from(parsed));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(values))?;
        std::fs::write(&self.path, json)?;

        debug!(path = %self.path.display(), key, value = parsed, "setting saved");
        Ok(())
    }

    fn read(&self) -> Option<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read settings");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                warn!(path = %self.path.display(), "settings file is not an object, using defaults");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to parse settings, using defaults");
                None
            }
        }
    }
}

impl SettingsSource for JsonFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.read()?.remove(key).and_then(raw_value)
    }

    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let mut values = self.read().unwrap_or_default();
        keys.iter()
            .map(|key| values.remove(*key).and_then(raw_value))
            .collect()
    }
}

fn raw_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
