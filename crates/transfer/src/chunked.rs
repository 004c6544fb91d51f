use std::path::PathBuf;
use std::sync::Arc;

use chunkcast_fetch::Fetcher;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::types::Chunk;
use crate::validation::{part_file_name, validate_fetched_path};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Prefix for scratch directories created by the splitter.
const SCRATCH_PREFIX: &str = "chunkcast-";

/// Number of parts needed for `size` bytes at `chunk_size` bytes per part.
///
/// An empty source still produces a single (empty) part.
pub fn chunk_count(size: u64, chunk_size: u64) -> usize {
    if size == 0 {
        1
    } else {
        size.div_ceil(chunk_size.max(1)) as usize
    }
}

// ---------------------------------------------------------------------------
// SplitDownload
// ---------------------------------------------------------------------------

/// A download that is fetched on first use and then handed out part by part.
///
/// Each [`advance`](Self::advance) writes exactly one part file. After the
/// last part, the next advance returns `Ok(None)` and removes the fetched
/// source. Errors finish the sequence; dropping it early cleans up too.
pub struct SplitDownload {
    url: String,
    chunk_size: u64,
    max_size: u64,
    fetcher: Arc<dyn Fetcher>,
    work_root: PathBuf,
    state: State,
}

enum State {
    Pending,
    Splitting(Source),
    Finished,
}

/// The fetched file being split.
struct Source {
    /// Holds the fetched file; removed on drop.
    work_dir: TempDir,
    file: tokio::fs::File,
    name: String,
    size: u64,
    total: usize,
    next_index: usize,
}

impl SplitDownload {
    /// Creates a lazy split of `url`. Nothing is fetched until the first advance.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (15 MiB) is used.
    pub fn new(
        url: impl Into<String>,
        chunk_size: u64,
        max_size: u64,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            url: url.into(),
            chunk_size,
            max_size,
            fetcher,
            work_root: std::env::temp_dir(),
            state: State::Pending,
        }
    }

    /// Places scratch directories (fetched source and parts) under `work_root`.
    pub fn in_dir(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Total number of parts, once the source has been fetched.
    pub fn total(&self) -> Option<usize> {
        match &self.state {
            State::Splitting(source) => Some(source.total),
            _ => None,
        }
    }

    /// Whether the source has not been fetched yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending)
    }

    /// Whether the sequence is exhausted or failed.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Produces the next part, fetching the source first if needed.
    ///
    /// Returns `Ok(None)` once every part has been produced; that call also
    /// removes the fetched source.
    pub async fn advance(&mut self) -> Result<Option<Chunk>, TransferError> {
        let mut source = match std::mem::replace(&mut self.state, State::Finished) {
            State::Finished => return Ok(None),
            State::Pending => self.open_source().await?,
            State::Splitting(source) => source,
        };

        if source.next_index > source.total {
            debug!(
                url = %self.url,
                parts = source.total,
                "all parts produced, removing source"
            );
            return Ok(None);
        }

        let chunk = self.write_next(&mut source).await?;
        self.state = State::Splitting(source);
        Ok(Some(chunk))
    }

    async fn open_source(&self) -> Result<Source, TransferError> {
        let work_dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.work_root)?;

        debug!(url = %self.url, max_size = self.max_size, "fetching source");
        let path = self
            .fetcher
            .fetch(&self.url, work_dir.path(), self.max_size)
            .await?;
        let name = validate_fetched_path(work_dir.path(), &path)?;

        let file = tokio::fs::File::open(&path).await?;
        let size = file.metadata().await?.len();
        let total = chunk_count(size, self.chunk_size);

        debug!(
            url = %self.url,
            file = %name,
            size,
            parts = total,
            "source fetched"
        );

        Ok(Source {
            work_dir,
            file,
            name,
            size,
            total,
            next_index: 1,
        })
    }

    /// Copies the next byte range of the source into its own part file.
    ///
    /// On error the part's scratch directory is dropped with it, so no
    /// partial part file survives.
    async fn write_next(&self, source: &mut Source) -> Result<Chunk, TransferError> {
        let index = source.next_index;
        let offset = (index as u64 - 1) * self.chunk_size;
        let expected = self.chunk_size.min(source.size - offset);

        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.work_root)?;
        let path = dir
            .path()
            .join(part_file_name(&source.name, index, source.total));

        let mut out = tokio::fs::File::create(&path).await?;
        let copied = tokio::io::copy(&mut (&mut source.file).take(expected), &mut out).await?;
        out.flush().await?;
        drop(out);

        if copied != expected {
            return Err(TransferError::Truncated {
                expected,
                actual: copied,
            });
        }

        source.next_index += 1;
        debug!(
            url = %self.url,
            index,
            total = source.total,
            bytes = copied,
            "part written"
        );
        Ok(Chunk::new(dir, path, index, source.total, copied))
    }
}

impl std::fmt::Debug for SplitDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending => "pending".to_string(),
            State::Splitting(s) => format!(
                "splitting {} ({}/{}) in {}",
                s.name,
                s.next_index - 1,
                s.total,
                s.work_dir.path().display()
            ),
            State::Finished => "finished".to_string(),
        };
        f.debug_struct("SplitDownload")
            .field("url", &self.url)
            .field("chunk_size", &self.chunk_size)
            .field("max_size", &self.max_size)
            .field("state", &state)
            .finish()
    }
}
