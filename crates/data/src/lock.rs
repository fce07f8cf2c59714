//! Handle-scoped advisory lock.
//!
//! Exclusivity is tied to the open file handle, not to the lock file's
//! existence: the OS releases the lock when the handle closes (process
//! exit included), and the lock file itself is never deleted. Deleting a
//! marker file while another process still holds a handle-based lock lets
//! two processes believe they are exclusive at once.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Acquire the lock without blocking. Fails when another process holds it.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_lock_file(&path)?;
        file.try_lock_exclusive()
            .with_context(|| format!("lock {} is held by another process", path.display()))?;
        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { path, file })
    }

    /// Acquire the lock, blocking until the current holder releases it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_lock_file(&path)?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Unlock explicitly; the file stays on disk by design.
        let _ = fs2::FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "run lock released");
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        let held = RunLock::try_acquire(&path).unwrap();
        assert!(RunLock::try_acquire(&path).is_err());
        drop(held);
        assert!(RunLock::try_acquire(&path).is_ok());
    }

    #[test]
    fn lock_file_survives_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        drop(RunLock::try_acquire(&path).unwrap());
        assert!(path.exists());
    }
}
