//! Rename policy for the local backend.
//!
//! `std::fs::rename` replaces an existing destination atomically on every
//! supported platform (`rename(2)`, `MoveFileExW` with
//! `MOVEFILE_REPLACE_EXISTING`). When the native call still refuses an existing
//! destination, [`RenameFallback::DeleteThenRename`] removes it and retries;
//! the default policy reports the refusal.
//!
//! Moves between volumes are always refused so callers can copy with progress
//! instead.

use std::io;
use std::path::Path;

use crate::config::RenameFallback;
use crate::vfs::error::{VfsError, VfsResult};

/// Rename `from` to `to` with `native` as the primitive.
pub(super) fn rename_with(
    from: &Path,
    to: &Path,
    policy: RenameFallback,
    native: impl Fn(&Path, &Path) -> io::Result<()>,
) -> VfsResult<()> {
    let from_path = from.display().to_string();
    match native(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && policy == RenameFallback::DeleteThenRename => {
            tracing::warn!(
                from = %from_path,
                to = %to.display(),
                "native rename refused existing destination, deleting it first (not atomic)"
            );
            remove_existing(to)?;
            native(from, to).map_err(|e| VfsError::from_io(e, &from_path))
        }
        Err(e) => Err(VfsError::from_io(e, &from_path)),
    }
}

fn remove_existing(path: &Path) -> VfsResult<()> {
    let path_str = path.display().to_string();
    let meta = std::fs::symlink_metadata(path).map_err(|e| VfsError::from_io(e, &path_str))?;
    let result = if meta.is_dir() {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| VfsError::from_io(e, &path_str))
}
