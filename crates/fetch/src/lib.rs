//! Size-bounded fetchers.
//!
//! A [`Fetcher`] materializes one remote resource as a local file inside a
//! caller-owned directory and refuses anything larger than `max_size` bytes.
//! The directory belongs to the caller: fetchers never clean it up, so a
//! failed fetch may leave partial files behind for the caller to discard.

pub mod error;
pub mod http;
pub mod ytdlp;

pub use error::{FetchError, format_size};
pub use http::HttpFetcher;
pub use ytdlp::{YtDlpFetcher, YtDlpMode};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

/// Socket-level timeout applied by the bundled fetchers.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(15);

/// Future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<PathBuf, FetchError>> + Send + 'a>>;

/// Retrieves a remote resource into a local directory under a size limit.
///
/// Implementations must fail with [`FetchError::SizeExceeded`] when the
/// content is larger than `max_size`, and must return the path of a single
/// regular file located directly inside `dest_dir`.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str, dest_dir: &'a Path, max_size: u64) -> FetchFuture<'a>;
}
