//! End-to-end flow: requests admitted through `RequestHandler`, drained by
//! `DeliveryLoop::service_cycle`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chunkcast_fetch::{FetchError, FetchFuture, Fetcher};
use chunkcast_queue::{
    AdmitError, CycleReport, DeliverFuture, Deliverer, DeliveryLoop, DownloadQueue,
    RequestHandler, too_big_reply,
};
use chunkcast_settings::{MAX_SIZE, MemorySettings, PART_SIZE};
use chunkcast_transfer::Chunk;
use tokio_util::sync::CancellationToken;

/// Serves fixed content, honouring the size limit like the real fetchers.
struct StaticFetcher {
    name: &'static str,
    data: Vec<u8>,
}

impl Fetcher for StaticFetcher {
    fn fetch<'a>(&'a self, _url: &'a str, dest: &'a Path, max_size: u64) -> FetchFuture<'a> {
        Box::pin(async move {
            if self.data.len() as u64 > max_size {
                return Err(FetchError::SizeExceeded { limit: max_size });
            }
            let path = dest.join(self.name);
            tokio::fs::write(&path, &self.data).await?;
            Ok(path)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Delivered {
    to: String,
    file_name: String,
    caption: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct Inbox {
    parts: Mutex<Vec<Delivered>>,
    notices: Mutex<Vec<(String, String)>>,
}

impl Deliverer for Inbox {
    fn deliver<'a>(&'a self, destination: &'a str, chunk: Chunk, caption: &'a str) -> DeliverFuture<'a> {
        Box::pin(async move {
            let data = tokio::fs::read(chunk.path()).await?;
            self.parts.lock().unwrap().push(Delivered {
                to: destination.to_string(),
                file_name: chunk.file_name().to_string(),
                caption: caption.to_string(),
                data,
            });
            Ok(())
        })
    }

    fn notify<'a>(&'a self, destination: &'a str, text: &'a str) -> DeliverFuture<'a> {
        Box::pin(async move {
            self.notices
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            Ok(())
        })
    }
}

struct Host {
    _work: tempfile::TempDir,
    settings: Arc<MemorySettings>,
    queue: Arc<DownloadQueue>,
    inbox: Arc<Inbox>,
    handler: RequestHandler,
    delivery: DeliveryLoop,
}

fn host(capacity: usize) -> Host {
    let work = tempfile::tempdir().unwrap();
    let settings = Arc::new(MemorySettings::with_defaults());
    let queue = Arc::new(DownloadQueue::with_capacity(capacity));
    let inbox = Arc::new(Inbox::default());
    let handler =
        RequestHandler::new(queue.clone(), settings.clone()).with_work_root(work.path());
    let delivery = DeliveryLoop::new(queue.clone(), inbox.clone(), settings.clone());
    Host {
        _work: work,
        settings,
        queue,
        inbox,
        handler,
        delivery,
    }
}

fn file(name: &'static str, len: usize) -> Arc<dyn Fetcher> {
    Arc::new(StaticFetcher {
        name,
        data: (0..len).map(|i| (i % 251) as u8).collect(),
    })
}

impl Host {
    async fn cycle(&self) -> CycleReport {
        self.delivery.service_cycle(&CancellationToken::new()).await
    }
}

#[tokio::test]
async fn twenty_five_bytes_in_ten_byte_parts() {
    let h = host(50);
    h.settings.set(PART_SIZE, "10");
    h.handler
        .queue_download("alice", "https://e.com/clip.mp4", file("clip.mp4", 25))
        .unwrap();

    for _ in 0..3 {
        h.cycle().await;
    }
    assert!(h.queue.is_empty());

    let parts = h.inbox.parts.lock().unwrap().clone();
    let summary: Vec<(&str, &str, usize)> = parts
        .iter()
        .map(|p| (p.file_name.as_str(), p.caption.as_str(), p.data.len()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("clip.mp4.part001", "Part 1/3", 10),
            ("clip.mp4.part002", "Part 2/3", 10),
            ("clip.mp4.part003", "Part 3/3", 5),
        ]
    );
    assert!(parts.iter().all(|p| p.to == "alice"));
    assert!(h.inbox.notices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn capacity_two_with_three_requesters() {
    let h = host(2);
    assert!(h.handler.queue_download("a", "u", file("a.bin", 1)).is_ok());
    assert!(h.handler.queue_download("b", "u", file("b.bin", 1)).is_ok());
    assert_eq!(
        h.handler.queue_download("c", "u", file("c.bin", 1)),
        Err(AdmitError::QueueFull { capacity: 2 })
    );

    // Single-part downloads finish in one cycle and free their slots.
    let report = h.cycle().await;
    assert_eq!(report.completed, 2);
    assert!(h.handler.queue_download("c", "u", file("c.bin", 1)).is_ok());
}

#[tokio::test]
async fn interleaves_requesters_one_part_each_per_cycle() {
    let h = host(50);
    h.settings.set(PART_SIZE, "4");
    h.handler.queue_download("a", "u", file("a.bin", 12)).unwrap();
    h.handler.queue_download("b", "u", file("b.bin", 4)).unwrap();

    let first = h.cycle().await;
    assert_eq!(first.delivered, 2);
    assert_eq!(first.completed, 1);
    assert!(h.queue.contains("a"));
    assert!(!h.queue.contains("b"));

    h.cycle().await;
    h.cycle().await;
    assert!(h.queue.is_empty());

    let parts = h.inbox.parts.lock().unwrap();
    let to_a: Vec<&str> = parts
        .iter()
        .filter(|p| p.to == "a")
        .map(|p| p.caption.as_str())
        .collect();
    assert_eq!(to_a, vec!["Part 1/3", "Part 2/3", "Part 3/3"]);
}

#[tokio::test]
async fn oversized_download_is_refused_with_limit() {
    let h = host(50);
    h.settings.set(MAX_SIZE, "100");
    h.handler.queue_download("dave", "u", file("big.iso", 101)).unwrap();

    // Raising the limit after admission does not affect the queued entry.
    h.settings.set(MAX_SIZE, "1000");

    let report = h.cycle().await;
    assert_eq!(report.failed, 1);
    assert!(h.queue.is_empty());
    assert!(h.inbox.parts.lock().unwrap().is_empty());
    assert_eq!(
        *h.inbox.notices.lock().unwrap(),
        vec![("dave".to_string(), too_big_reply(100))]
    );
}
