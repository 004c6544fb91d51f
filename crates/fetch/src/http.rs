//! Plain HTTP(S) fetcher.
//!
//! Streams the response body to disk and stops as soon as the received byte
//! count passes the limit. A `Content-Length` larger than the limit is
//! rejected before any byte is written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{FetchError, FetchFuture, Fetcher, SOCKET_TIMEOUT};

/// File name used when neither the response nor the URL provide one.
const FALLBACK_FILE_NAME: &str = "download";

/// Fetches files over HTTP(S) with a size limit.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    idle_timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher with a client using the default socket timeout.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(SOCKET_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Creates a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            idle_timeout: SOCKET_TIMEOUT,
        }
    }

    /// Sets the maximum wait for the next piece of the response body.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        max_size: u64,
    ) -> Result<PathBuf, FetchError> {
        let parsed =
            Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let mut response = tokio::time::timeout(
            self.idle_timeout,
            self.client.get(parsed.clone()).send(),
        )
        .await
        .map_err(|_| FetchError::Http(format!("request to {parsed} timed out")))?
        .map_err(|e| FetchError::Http(format!("failed to download {parsed}: {e}")))?;

        if !response.status().is_success() {
            return Err(FetchError::Http(format!(
                "download {parsed} returned status {}",
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > max_size {
                debug!(url = %parsed, len, max_size, "content length over limit");
                return Err(FetchError::SizeExceeded { limit: max_size });
            }
        }

        // Name the file after where redirects ended up, not the link itself.
        let name = file_name_for(response.url(), response.headers());
        let path = dest_dir.join(name);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written: u64 = 0;

        loop {
            let piece = tokio::time::timeout(self.idle_timeout, response.chunk())
                .await
                .map_err(|_| FetchError::Http(format!("reading {parsed} timed out")))?
                .map_err(|e| FetchError::Http(format!("failed to read {parsed}: {e}")))?;
            let Some(bytes) = piece else {
                break;
            };

            written += bytes.len() as u64;
            if written > max_size {
                debug!(url = %parsed, written, max_size, "body over limit, aborting");
                return Err(FetchError::SizeExceeded { limit: max_size });
            }
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        debug!(url = %parsed, path = %path.display(), bytes = written, "HTTP fetch complete");
        Ok(path)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str, dest_dir: &'a Path, max_size: u64) -> FetchFuture<'a> {
        Box::pin(self.download(url, dest_dir, max_size))
    }
}

/// Picks a local file name from `Content-Disposition` or the URL path.
fn file_name_for(url: &Url, headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_file_name)
        .or_else(|| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .and_then(|name| sanitize_file_name(&name))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = val.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Keeps only the final path component; rejects `.`/`..` and empty names.
fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}
