//! Per-requester download queue.
//!
//! The queue is a mapping, not a FIFO: the delivery loop services every
//! entry each cycle. Admission is check-then-insert under one lock, so two
//! concurrent requests from the same requester cannot both get in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chunkcast_transfer::SplitDownload;
use tracing::debug;

use crate::error::AdmitError;

/// Default number of downloads that may be active at once.
pub const MAX_QUEUE_SIZE: usize = 50;

/// Shared handle to one queued download.
///
/// Only the delivery loop locks it, so the lock is never contended; it exists
/// so the loop can advance a download without holding the queue lock.
pub(crate) type Entry = Arc<tokio::sync::Mutex<SplitDownload>>;

/// Active downloads keyed by requester identity.
#[derive(Debug)]
pub struct DownloadQueue {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    /// Creates a queue bounded by [`MAX_QUEUE_SIZE`].
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE_SIZE)
    }

    /// Creates a queue holding at most `capacity` active downloads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Admits `download` for `requester`.
    ///
    /// Fails with [`AdmitError::AlreadyQueued`] if the requester already has
    /// an active download (which is left untouched), or with
    /// [`AdmitError::QueueFull`] if the queue is at capacity. A rejected
    /// download is dropped without ever being fetched.
    pub fn admit(&self, requester: &str, download: SplitDownload) -> Result<(), AdmitError> {
        let mut entries = self.lock();
        if entries.contains_key(requester) {
            debug!(requester, "rejected: already queued");
            return Err(AdmitError::AlreadyQueued);
        }
        if entries.len() >= self.capacity {
            debug!(requester, capacity = self.capacity, "rejected: queue full");
            return Err(AdmitError::QueueFull {
                capacity: self.capacity,
            });
        }

        entries.insert(
            requester.to_string(),
            Arc::new(tokio::sync::Mutex::new(download)),
        );
        debug!(requester, queued = entries.len(), "download admitted");
        Ok(())
    }

    /// Number of active downloads.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `requester` has an active download.
    pub fn contains(&self, requester: &str) -> bool {
        self.lock().contains_key(requester)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies the current entries so a cycle can iterate them without
    /// holding the lock. Admissions made afterwards are not included.
    pub(crate) fn snapshot(&self) -> Vec<(String, Entry)> {
        self.lock()
            .iter()
            .map(|(requester, entry)| (requester.clone(), Arc::clone(entry)))
            .collect()
    }

    /// Removes the requester's download. Returns `true` if it was present.
    pub(crate) fn evict(&self, requester: &str) -> bool {
        let removed = self.lock().remove(requester).is_some();
        if removed {
            debug!(requester, "download evicted");
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
