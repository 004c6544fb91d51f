//! Directory-backed delivery.
//!
//! Every requester gets a directory under the outbox root. The parts of each
//! download are moved into their own `download-NNN` subdirectory, and every
//! message (part captions included) is appended to the requester's
//! `messages.log`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chunkcast_queue::{DeliverFuture, Deliverer, DeliveryError};
use chunkcast_transfer::Chunk;
use tokio::io::AsyncWriteExt;
use tracing::info;

const MESSAGES_LOG: &str = "messages.log";

/// Writes deliveries to `<root>/<addr>/`.
#[derive(Debug, Clone)]
pub struct OutboxDeliverer {
    root: PathBuf,
    /// Directory of the download currently being delivered, per requester.
    current: Arc<Mutex<HashMap<String, PathBuf>>>,
}

impl OutboxDeliverer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: Arc::default(),
        }
    }

    /// Directory holding everything sent to `addr`.
    pub fn mailbox(&self, addr: &str) -> PathBuf {
        self.root.join(mailbox_name(addr))
    }

    async fn append(&self, dir: &Path, line: &str) -> Result<(), DeliveryError> {
        tokio::fs::create_dir_all(dir).await?;
        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(MESSAGES_LOG))
            .await?;
        log.write_all(line.as_bytes()).await?;
        log.write_all(b"\n").await?;
        log.flush().await?;
        Ok(())
    }

    /// Directory for part `index` of the requester's current download.
    ///
    /// The first part opens a fresh directory; later parts reuse it.
    async fn download_dir(
        &self,
        mailbox: &Path,
        destination: &str,
        index: usize,
    ) -> Result<PathBuf, DeliveryError> {
        if index > 1 {
            let existing = self.current().get(destination).cloned();
            if let Some(dir) = existing {
                return Ok(dir);
            }
        }

        let dir = create_download_dir(mailbox).await?;
        self.current().insert(destination.to_string(), dir.clone());
        Ok(dir)
    }

    fn current(&self) -> MutexGuard<'_, HashMap<String, PathBuf>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates the first free `download-NNN` directory in `mailbox`.
async fn create_download_dir(mailbox: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(mailbox).await?;
    let mut n: u32 = 1;
    loop {
        let dir = mailbox.join(format!("download-{n:03}"));
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

impl Deliverer for OutboxDeliverer {
    fn deliver<'a>(
        &'a self,
        destination: &'a str,
        chunk: Chunk,
        caption: &'a str,
    ) -> DeliverFuture<'a> {
        Box::pin(async move {
            let mailbox = self.mailbox(destination);
            let (index, size) = (chunk.index(), chunk.size());
            let last = chunk.is_last();

            let dir = self.download_dir(&mailbox, destination, index).await?;
            let path = chunk.persist(&dir).await?;
            if last {
                self.current().remove(destination);
            }

            let relative = path.strip_prefix(&mailbox).unwrap_or(&path);
            self.append(&mailbox, &format!("{caption}\t{}", relative.display()))
                .await?;
            info!(to = destination, file = %path.display(), size, "{caption}");
            Ok(())
        })
    }

    fn notify<'a>(&'a self, destination: &'a str, text: &'a str) -> DeliverFuture<'a> {
        Box::pin(async move {
            self.append(&self.mailbox(destination), text).await?;
            info!(to = destination, "{text}");
            Ok(())
        })
    }
}

/// Maps an address to a single safe path component.
fn mailbox_name(addr: &str) -> String {
    let name: String = addr
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        format!("_{name}")
    } else {
        name
    }
}
