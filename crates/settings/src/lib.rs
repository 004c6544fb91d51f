//! Settings for the download queue.
//!
//! Settings are plain string key/value pairs supplied by the host through a
//! [`SettingsSource`]. [`DownloadSettings::load`] turns them into typed
//! values, falling back to defaults for missing or unparsable keys. Sources
//! are consulted on every load, so changes apply without a restart.

mod download;
mod error;
mod file;
mod memory;

pub use download::DownloadSettings;
pub use error::SettingsError;
pub use file::JsonFileSettings;
pub use memory::MemorySettings;

use std::time::Duration;

/// Bytes per delivered part.
pub const PART_SIZE: &str = "part_size";

/// Largest download accepted, in bytes.
pub const MAX_SIZE: &str = "max_size";

/// Seconds between the starts of two delivery cycles.
pub const DELAY: &str = "delay";

/// Every key understood by [`DownloadSettings`].
pub const KEYS: [&str; 3] = [PART_SIZE, MAX_SIZE, DELAY];

/// Default part size: 15 MiB.
pub const DEFAULT_PART_SIZE: u64 = 15 * 1024 * 1024;

/// Default size limit: 100 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Default delay between delivery cycles.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(60);

/// Read-only key lookup provided by the host.
pub trait SettingsSource: Send + Sync {
    /// Returns the raw value for `key`, or `None` if unset.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the raw values for `keys`, in order, from one lookup.
    ///
    /// Sources backed by storage override this to read it once.
    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get(key)).collect()
    }
}

/// Default raw value for a known key.
pub fn default_value(key: &str) -> Option<String> {
    match key {
        PART_SIZE => Some(DEFAULT_PART_SIZE.to_string()),
        MAX_SIZE => Some(DEFAULT_MAX_SIZE.to_string()),
        DELAY => Some(DEFAULT_DELAY.as_secs().to_string()),
        _ => None,
    }
}
