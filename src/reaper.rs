//! Best-effort removal of temporary job artifacts

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// What a [`Reaper::dispose`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    Removed,
    Absent,
    Failed,
}

/// Deletes files and directory trees without ever failing the caller
///
/// Disposing of a path that is already gone is a no-op, so the pipeline can
/// call this from several exit paths for the same reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reaper;

impl Reaper {
    pub fn new() -> Self {
        Self
    }

    pub async fn dispose(&self, path: &Path) -> Disposal {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Disposal::Absent,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat path for cleanup");
                return Disposal::Failed;
            }
        };

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Removed");
                Disposal::Removed
            }
            // Lost a race with another disposal of the same path
            Err(e) if e.kind() == ErrorKind::NotFound => Disposal::Absent,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cleanup failed");
                Disposal::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dispose_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.tar");
        fs::write(&file, b"data").unwrap();

        assert_eq!(Reaper::new().dispose(&file).await, Disposal::Removed);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_dispose_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pkg");
        fs::create_dir_all(dir.join("nested/deeper")).unwrap();
        fs::write(dir.join("nested/deeper/file.whl"), b"wheel").unwrap();

        assert_eq!(Reaper::new().dispose(&dir).await, Disposal::Removed);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.tar");
        fs::write(&file, b"data").unwrap();
        let reaper = Reaper::new();

        assert_eq!(reaper.dispose(&file).await, Disposal::Removed);
        assert_eq!(reaper.dispose(&file).await, Disposal::Absent);
        assert_eq!(reaper.dispose(&file).await, Disposal::Absent);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dispose_symlink_leaves_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target.bin");
        let link = temp.path().join("link.bin");
        fs::write(&target, b"keep me").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(Reaper::new().dispose(&link).await, Disposal::Removed);
        assert!(target.exists());
    }
}
