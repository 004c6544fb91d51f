use std::path::{Component, Path};

use crate::TransferError;

/// Checks that a fetcher returned a file directly inside its working
/// directory and returns that file's name.
///
/// Rejects:
/// - Paths outside `work_dir`
/// - Nested paths (`work_dir/sub/file`)
/// - Parent directory traversal (`..`)
/// - Names that are not valid UTF-8
pub fn validate_fetched_path(work_dir: &Path, path: &Path) -> Result<String, TransferError> {
    let relative = path.strip_prefix(work_dir).map_err(|_| {
        TransferError::InvalidPath(format!(
            "fetched file outside working directory: {}",
            path.display()
        ))
    })?;

    let mut components = relative.components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name,
        (Some(Component::ParentDir), _) => {
            return Err(TransferError::InvalidPath(format!(
                "parent directory traversal not allowed: {}",
                path.display()
            )));
        }
        (None, _) => {
            return Err(TransferError::InvalidPath("empty path".into()));
        }
        _ => {
            return Err(TransferError::InvalidPath(format!(
                "fetched file must be directly inside the working directory: {}",
                path.display()
            )));
        }
    };

    name.to_str().map(str::to_string).ok_or_else(|| {
        TransferError::InvalidPath(format!("file name is not UTF-8: {}", path.display()))
    })
}

/// Name of the part file for part `index` of `total`.
///
/// A download that fits in one part keeps its original name.
pub fn part_file_name(source_name: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        source_name.to_string()
    } else {
        format!("{source_name}.part{index:03}")
    }
}
