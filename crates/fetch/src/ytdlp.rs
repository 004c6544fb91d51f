//! YouTube fetcher backed by the `yt-dlp` command-line tool.
//!
//! yt-dlp picks the best format whose reported size is under the limit and
//! writes it as `<id>.<ext>` into the destination directory. Reported sizes
//! are estimates, so the produced file is checked against the limit again.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::{FetchError, FetchFuture, Fetcher, SOCKET_TIMEOUT};

/// Default program name, resolved through `PATH`.
const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Exit code yt-dlp uses when `--max-downloads` stopped the run.
const MAX_DOWNLOADS_REACHED: i32 = 101;

/// Output template relative to the destination directory.
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// What to extract from the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpMode {
    /// Best combined audio+video format.
    Video,
    /// Best audio-only format.
    Audio,
}

impl YtDlpMode {
    /// yt-dlp format selector limited to `max_size` bytes.
    pub fn format_selector(self, max_size: u64) -> String {
        match self {
            Self::Video => format!("best[filesize<{max_size}]"),
            Self::Audio => format!("bestaudio[filesize<{max_size}]"),
        }
    }
}

/// Downloads a single video or audio track through yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    mode: YtDlpMode,
    socket_timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(mode: YtDlpMode) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            mode,
            socket_timeout: SOCKET_TIMEOUT,
        }
    }

    /// Uses a specific yt-dlp executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, url: &str, dest_dir: &Path, max_size: u64) -> Vec<OsString> {
        vec![
            "--format".into(),
            self.mode.format_selector(max_size).into(),
            "--max-downloads".into(),
            "1".into(),
            "--socket-timeout".into(),
            self.socket_timeout.as_secs().to_string().into(),
            "--no-playlist".into(),
            "--no-progress".into(),
            "--output".into(),
            dest_dir.join(OUTPUT_TEMPLATE).into_os_string(),
            "--".into(),
            url.trim().into(),
        ]
    }

    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        max_size: u64,
    ) -> Result<PathBuf, FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::InvalidUrl("empty URL".into()));
        }

        debug!(url, mode = ?self.mode, max_size, "running yt-dlp");
        let output = Command::new(&self.program)
            .args(self.args(url, dest_dir, max_size))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                FetchError::Tool(format!("failed to run {}: {e}", self.program.display()))
            })?;

        let stopped_at_limit = output.status.code() == Some(MAX_DOWNLOADS_REACHED);
        if !output.status.success() && !stopped_at_limit {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .to_string();
            warn!(url, status = %output.status, %reason, "yt-dlp failed");
            return Err(FetchError::Tool(reason));
        }

        let path = downloaded_file(dest_dir).await?;
        let size = tokio::fs::metadata(&path).await?.len();
        if size > max_size {
            debug!(url, size, max_size, "yt-dlp output over limit");
            return Err(FetchError::SizeExceeded { limit: max_size });
        }

        Ok(path)
    }
}

impl Fetcher for YtDlpFetcher {
    fn fetch<'a>(&'a self, url: &'a str, dest_dir: &'a Path, max_size: u64) -> FetchFuture<'a> {
        Box::pin(self.download(url, dest_dir, max_size))
    }
}

/// Returns the finished download in `dir`, ignoring yt-dlp's temporary files.
async fn downloaded_file(dir: &Path) -> Result<PathBuf, FetchError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let temporary = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext, "part" | "ytdl" | "temp"));
        if !temporary {
            found.push(path);
        }
    }
    found.sort();
    found.into_iter().next().ok_or(FetchError::NoOutput)
}
