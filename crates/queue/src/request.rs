//! Turning bot commands into queued downloads.

use std::path::PathBuf;
use std::sync::Arc;

use chunkcast_fetch::{FetchError, Fetcher};
use chunkcast_settings::{DownloadSettings, SettingsSource};
use chunkcast_transfer::SplitDownload;
use tracing::info;

use crate::error::AdmitError;
use crate::queue::DownloadQueue;

/// Reply sent when a request is accepted.
pub const QUEUED_REPLY: &str = "✔️ Request added to queue";

/// Reply sent when a queued download fails for any reason other than size.
pub const FAILED_REPLY: &str = "❌ Failed to download file, is the link correct?";

/// Reply sent when a download is refused for exceeding `limit` bytes.
pub fn too_big_reply(limit: u64) -> String {
    format!("❌ {}", FetchError::SizeExceeded { limit })
}

/// Reply for the outcome of an admission.
pub fn admission_reply(result: &Result<(), AdmitError>) -> String {
    match result {
        Ok(()) => QUEUED_REPLY.to_string(),
        Err(e) => format!("❌ {e}"),
    }
}

/// Builds downloads from the current settings and admits them.
///
/// Shared by every command handler; the queue and settings are the same
/// instances the delivery loop uses.
#[derive(Clone)]
pub struct RequestHandler {
    queue: Arc<DownloadQueue>,
    settings: Arc<dyn SettingsSource>,
    work_root: PathBuf,
}

impl RequestHandler {
    pub fn new(queue: Arc<DownloadQueue>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            queue,
            settings,
            work_root: std::env::temp_dir(),
        }
    }

    /// Places the scratch files of new downloads under `work_root`.
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// Queues `url` for `requester`, fetched through `fetcher`.
    ///
    /// Part size and size limit are read from the settings now, so each
    /// request uses the values current at the time it arrives.
    pub fn queue_download(
        &self,
        requester: &str,
        url: &str,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(), AdmitError> {
        let settings = DownloadSettings::load(self.settings.as_ref());
        let download = SplitDownload::new(url.trim(), settings.part_size, settings.max_size, fetcher)
            .in_dir(&self.work_root);

        self.queue.admit(requester, download)?;
        info!(
            requester,
            url = url.trim(),
            part_size = settings.part_size,
            max_size = settings.max_size,
            "download queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcast_fetch::FetchFuture;
    use chunkcast_settings::{MAX_SIZE, MemorySettings, PART_SIZE};
    use std::path::Path;

    struct NeverFetcher;

    impl Fetcher for NeverFetcher {
        fn fetch<'a>(&'a self, _url: &'a str, _dest: &'a Path, _max: u64) -> FetchFuture<'a> {
            Box::pin(async { Err(FetchError::NoOutput) })
        }
    }

    #[test]
    fn replies_match_outcomes() {
        assert_eq!(admission_reply(&Ok(())), QUEUED_REPLY);
        assert_eq!(
            admission_reply(&Err(AdmitError::AlreadyQueued)),
            "❌ You already have a download in queue"
        );
        assert_eq!(
            admission_reply(&Err(AdmitError::QueueFull { capacity: 50 })),
            "❌ I'm too busy with too many downloads, try again later"
        );
    }

    #[test]
    fn too_big_reply_echoes_limit() {
        let reply = too_big_reply(2048);
        assert!(reply.starts_with("❌ "));
        assert!(reply.contains("2048"), "{reply}");
    }

    #[tokio::test]
    async fn queue_download_uses_current_settings() {
        let settings = Arc::new(MemorySettings::new());
        settings.set(PART_SIZE, "10");
        settings.set(MAX_SIZE, "500");
        let queue = Arc::new(DownloadQueue::new());
        let handler = RequestHandler::new(Arc::clone(&queue), settings.clone());

        handler
            .queue_download("alice", " https://e.com/a.bin ", Arc::new(NeverFetcher))
            .unwrap();

        settings.set(PART_SIZE, "99");
        handler
            .queue_download("bob", "https://e.com/b.bin", Arc::new(NeverFetcher))
            .unwrap();

        let mut seen: Vec<(String, String, u64, u64)> = Vec::new();
        for (requester, entry) in queue.snapshot() {
            let d = entry.lock().await;
            seen.push((requester, d.url().to_string(), d.chunk_size(), d.max_size()));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("alice".into(), "https://e.com/a.bin".into(), 10, 500),
                ("bob".into(), "https://e.com/b.bin".into(), 99, 500),
            ]
        );
    }

    #[test]
    fn queue_download_reports_duplicates() {
        let queue = Arc::new(DownloadQueue::new());
        let handler = RequestHandler::new(queue, Arc::new(MemorySettings::with_defaults()));

        let first = handler.queue_download("alice", "u1", Arc::new(NeverFetcher));
        let second = handler.queue_download("alice", "u2", Arc::new(NeverFetcher));
        assert!(first.is_ok());
        assert_eq!(second, Err(AdmitError::AlreadyQueued));
    }
}
