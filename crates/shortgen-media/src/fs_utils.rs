//! Filesystem helpers for artifacts and scratch directories.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file, falling back to copy-and-delete across filesystems.
///
/// A plain rename is tried first. On `EXDEV` the file is copied next to
/// `dst` under a temporary name and renamed into place, so `dst` never
/// holds a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename, copying instead"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("partial");

    let copied = match fs::copy(src, &tmp_dst).await {
        Ok(_) => fs::rename(&tmp_dst, dst).await,
        Err(e) => Err(e),
    };
    if let Err(e) = copied {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(src = %src.display(), "Failed to remove source after copy: {}", e);
    }

    Ok(())
}

/// Remove a directory tree, logging instead of failing.
///
/// Returns `true` when the directory is gone afterwards.
pub async fn remove_dir_logged(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "Failed to remove directory: {}", e);
            false
        }
    }
}

/// Size of a file, or `None` when it does not exist.
pub async fn file_size(path: impl AsRef<Path>) -> Option<u64> {
    fs::metadata(path).await.ok().filter(|m| m.is_file()).map(|m| m.len())
}
