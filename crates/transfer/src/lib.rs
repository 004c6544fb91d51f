//! Splits fetched files into fixed-size parts, one part per advance.
//!
//! A [`SplitDownload`] is a lazy, finite, non-restartable sequence of
//! [`Chunk`]s. The fetched source lives in a scratch directory that is
//! removed once the sequence is exhausted, fails, or is dropped.

mod chunked;
mod types;
mod validation;

pub use chunked::{SplitDownload, chunk_count};
pub use types::Chunk;
pub use validation::{part_file_name, validate_fetched_path};

use chunkcast_fetch::FetchError;

/// Default part size: 15 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 15 * 1024 * 1024;

/// Errors produced while splitting a download.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("source truncated: expected {expected} bytes, read {actual}")]
    Truncated { expected: u64, actual: u64 },
}

impl TransferError {
    /// The size limit that was exceeded, if the fetch was refused for size.
    pub fn size_limit(&self) -> Option<u64> {
        match self {
            Self::Fetch(e) => e.size_limit(),
            _ => None,
        }
    }
}
