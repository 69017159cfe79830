//! Per-request scratch directories.
//!
//! Every request gets a fresh `<work_dir>/<uuid>` directory. It is removed by
//! [`Workspace::cleanup`] once the request finishes, and by `Drop` if the
//! request future is abandoned before reaching cleanup.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use shortgen_media::fs_utils::remove_dir_logged;

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    cleaned: bool,
}

impl Workspace {
    /// Create a uniquely named directory under `base`.
    pub async fn create(base: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = base.as_ref().join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&root).await?;
        debug!(workspace = %root.display(), "Created workspace");
        Ok(Self {
            root,
            cleaned: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file inside the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Remove the directory and everything in it.
    ///
    /// Failures are logged, never returned. Returns whether the directory
    /// is gone.
    pub async fn cleanup(mut self) -> bool {
        self.cleaned = true;
        let removed = remove_dir_logged(&self.root).await;
        if removed {
            debug!(workspace = %self.root.display(), "Removed workspace");
        }
        removed
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    workspace = %self.root.display(),
                    "Failed to remove abandoned workspace: {}", e
                );
            }
        }
    }
}
