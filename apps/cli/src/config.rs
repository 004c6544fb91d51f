//! Default file locations.
//!
//! - Linux: `~/.config/chunkcast/settings.json`
//! - Windows: `%APPDATA%/chunkcast/settings.json`

use std::path::PathBuf;

const APP_DIR: &str = "chunkcast";
const SETTINGS_FILE: &str = "settings.json";

/// Returns the platform-specific settings file path.
pub fn settings_path() -> PathBuf {
    config_base_dir().join(APP_DIR).join(SETTINGS_FILE)
}

/// Outbox used when `--outbox` is not given.
pub fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg);
            }
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::temp_dir()
    }
}
