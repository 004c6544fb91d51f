//! Settings error types.

use std::path::PathBuf;

/// Errors produced while writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file is not a JSON object: {}", .0.display())]
    NotAnObject(PathBuf),

    #[error("unknown setting: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
