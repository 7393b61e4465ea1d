use crate::storage::traits::{StorageError, StorageResult};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` so readers see either the old or the new file
///
/// The temporary file is created next to the target so the final rename
/// stays on one filesystem.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}
