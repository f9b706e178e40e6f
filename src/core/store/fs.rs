//! Filesystem helpers for the store and its key cache.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::trace;

use crate::core::constants::SECRET_FILE_MODE;
use crate::error::{Result, StoreError};

/// Read a file, or `None` if it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::ReadFailed(e).into()),
    }
}

/// Replace `path` with `contents` in one rename.
///
/// The temp file lives in the destination directory so the rename never
/// crosses filesystems. Parent directories are created as needed.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(StoreError::WriteFailed)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(StoreError::WriteFailed)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(SECRET_FILE_MODE))
            .map_err(StoreError::WriteFailed)?;
    }

    tmp.write_all(contents).map_err(StoreError::WriteFailed)?;
    tmp.as_file().sync_all().map_err(StoreError::WriteFailed)?;
    tmp.persist(path)
        .map_err(|e| StoreError::WriteFailed(e.error))?;

    trace!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

/// Remove a file if it exists.
pub(crate) fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::WriteFailed(e).into()),
    }
}

/// Check that a file has the owner-only mode (Unix only).
#[cfg(unix)]
pub(crate) fn validate_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(StoreError::ReadFailed)?;
    let actual_mode = metadata.permissions().mode() & 0o777;

    if actual_mode != SECRET_FILE_MODE {
        return Err(StoreError::InsecurePermissions {
            path: path.display().to_string(),
            expected: format!("{:o}", SECRET_FILE_MODE),
            actual: format!("{:o}", actual_mode),
        }
        .into());
    }

    Ok(())
}
