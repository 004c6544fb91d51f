use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::TransferError;

/// One part of a split download.
///
/// The part file lives in its own scratch directory, which is removed when
/// the chunk is dropped. Whoever holds the chunk owns the file; call
/// [`persist`](Self::persist) to keep it.
#[derive(Debug)]
pub struct Chunk {
    dir: TempDir,
    path: PathBuf,
    /// 1-based position of this part.
    index: usize,
    /// Number of parts in the download.
    total: usize,
    /// Size of this part in bytes.
    size: u64,
}

impl Chunk {
    pub(crate) fn new(dir: TempDir, path: PathBuf, index: usize, total: usize, size: u64) -> Self {
        Self {
            dir,
            path,
            index,
            total,
            size,
        }
    }

    /// Path of the part file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the part, e.g. `clip.mp4.part002`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether this is the final part of its download.
    pub fn is_last(&self) -> bool {
        self.index == self.total
    }

    /// Caption sent along with the part.
    pub fn caption(&self) -> String {
        format!("Part {}/{}", self.index, self.total)
    }

    /// Moves the part file into `dest_dir`, keeping its file name.
    ///
    /// Falls back to copying when a rename is not possible (e.g. across
    /// filesystems). The scratch directory is removed either way.
    pub async fn persist(self, dest_dir: &Path) -> Result<PathBuf, TransferError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(self.file_name());
        if tokio::fs::rename(&self.path, &dest).await.is_err() {
            tokio::fs::copy(&self.path, &dest).await?;
        }
        drop(self.dir);
        Ok(dest)
    }
}
