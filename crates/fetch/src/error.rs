//! Fetch error types.

/// Errors produced while fetching a remote resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("File is too big, max size is {} ({limit} bytes)", format_size(*limit))]
    SizeExceeded { limit: u64 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yt-dlp error: {0}")]
    Tool(String),

    #[error("fetch produced no file")]
    NoOutput,
}

impl FetchError {
    /// The size limit that was exceeded, if this is a size error.
    pub fn size_limit(&self) -> Option<u64> {
        match self {
            Self::SizeExceeded { limit } => Some(*limit),
            _ => None,
        }
    }
}

/// Formats a byte count with a binary unit, e.g. `15.0 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
