//! Scoped temporary files.
//!
//! A job acquires temp files for the downloaded source and the encoded
//! artifact. Every acquired handle must be released on every exit path;
//! [`TempGuard`] does that on drop, and release is idempotent so explicit
//! and drop-time release never conflict.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::{Builder, TempDir, TempPath};
use thiserror::Error;

/// Failure to create a temp file.
#[derive(Debug, Error)]
#[error("failed to create temp file in {dir}: {source}")]
pub struct TempFileError {
    pub dir: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Failure to remove a temp file. Logged, never escalated.
#[derive(Debug, Error)]
#[error("failed to remove temp file {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// An acquired temp file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempHandle {
    id: u64,
    path: PathBuf,
}

impl TempHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Allocates and releases temp files.
pub trait TempFileManager: Send + Sync {
    /// Create a new empty temp file.
    fn acquire(&self) -> Result<TempHandle, TempFileError>;

    /// Delete the file behind `handle`. Releasing twice is a no-op.
    fn release(&self, handle: &TempHandle) -> Result<(), CleanupError>;

    /// Number of handles acquired and not yet released.
    fn outstanding(&self) -> usize;
}

/// Temp files inside a private directory.
///
/// The directory, and anything still in it, is removed when the manager is
/// dropped.
#[derive(Debug)]
pub struct LocalTempFiles {
    root: TempDir,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, TempPath>>,
}

impl LocalTempFiles {
    /// Create the private directory under `parent`, creating `parent` too.
    pub fn new(parent: impl AsRef<Path>) -> Result<Self, TempFileError> {
        let parent = parent.as_ref();
        let err = |source: io::Error| TempFileError {
            dir: parent.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(err)?;
        let root = Builder::new().prefix("gifmill-").tempdir_in(parent).map_err(err)?;
        Ok(Self::with_root(root))
    }

    /// Private directory under the system temp directory.
    pub fn in_system_temp() -> Result<Self, TempFileError> {
        let root = Builder::new()
            .prefix("gifmill-")
            .tempdir()
            .map_err(|source| TempFileError {
                dir: std::env::temp_dir(),
                source,
            })?;
        Ok(Self::with_root(root))
    }

    fn with_root(root: TempDir) -> Self {
        log::debug!("Temp files under {}", root.path().display());
        Self {
            root,
            next_id: AtomicU64::new(0),
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.root.path()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u64, TempPath>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TempFileManager for LocalTempFiles {
    fn acquire(&self) -> Result<TempHandle, TempFileError> {
        let file = Builder::new()
            .prefix("job-")
            .suffix(".tmp")
            .tempfile_in(self.root.path())
            .map_err(|source| TempFileError {
                dir: self.root.path().to_path_buf(),
                source,
            })?;

        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live().insert(id, temp);

        log::trace!("Acquired temp file {}", path.display());
        Ok(TempHandle { id, path })
    }

    fn release(&self, handle: &TempHandle) -> Result<(), CleanupError> {
        let Some(temp) = self.live().remove(&handle.id) else {
            return Ok(());
        };

        let path = temp.to_path_buf();
        match temp.close() {
            Ok(()) => {
                log::trace!("Released temp file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CleanupError { path, source }),
        }
    }

    fn outstanding(&self) -> usize {
        self.live().len()
    }
}

/// Releases its handle when dropped.
pub struct TempGuard<'a, T: TempFileManager + ?Sized> {
    manager: &'a T,
    handle: Option<TempHandle>,
}

impl<'a, T: TempFileManager + ?Sized> TempGuard<'a, T> {
    /// Acquire a handle from `manager`.
    pub fn acquire(manager: &'a T) -> Result<Self, TempFileError> {
        let handle = manager.acquire()?;
        Ok(Self {
            manager,
            handle: Some(handle),
        })
    }

    /// Path of the guarded file.
    pub fn path(&self) -> &Path {
        self.handle.as_ref().map(TempHandle::path).unwrap_or(Path::new(""))
    }

    /// Release now, reporting any failure.
    pub fn release(mut self) -> Result<(), CleanupError> {
        match self.handle.take() {
            Some(handle) => self.manager.release(&handle),
            None => Ok(()),
        }
    }
}

impl<T: TempFileManager + ?Sized> Drop for TempGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.manager.release(&handle) {
                log::warn!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temps() -> LocalTempFiles {
        LocalTempFiles::in_system_temp().unwrap()
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_acquire_creates_file() {
        let temps = temps();
        let handle = temps.acquire().unwrap();

        assert!(handle.path().exists());
        assert!(handle.path().starts_with(temps.dir()));
        assert_eq!(temps.outstanding(), 1);

        temps.release(&handle).unwrap();
        assert!(!handle.path().exists());
        assert_eq!(temps.outstanding(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let temps = temps();
        let handle = temps.acquire().unwrap();

        temps.release(&handle).unwrap();
        temps.release(&handle).unwrap();
        assert_eq!(temps.outstanding(), 0);
    }

    #[test]
    fn test_release_tolerates_missing_file() {
        let temps = temps();
        let handle = temps.acquire().unwrap();
        std::fs::remove_file(handle.path()).unwrap();

        assert!(temps.release(&handle).is_ok());
        assert_eq!(temps.outstanding(), 0);
    }

    #[test]
    fn test_handles_are_distinct() {
        let temps = temps();
        let a = temps.acquire().unwrap();
        let b = temps.acquire().unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
        temps.release(&a).unwrap();
        temps.release(&b).unwrap();
        assert_eq!(entries(temps.dir()), 0);
    }

    #[test]
    fn test_managers_under_one_parent_do_not_collide() {
        let parent = tempfile::tempdir().unwrap();
        let first = LocalTempFiles::new(parent.path().join("nested")).unwrap();
        let second = LocalTempFiles::new(parent.path().join("nested")).unwrap();

        assert_ne!(first.dir(), second.dir());
        let a = first.acquire().unwrap();
        let b = second.acquire().unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_drop_removes_directory() {
        let temps = temps();
        let dir = temps.dir().to_path_buf();
        let _leaked = temps.acquire().unwrap();

        drop(temps);
        assert!(!dir.exists());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let temps = temps();
        let path = {
            let guard = TempGuard::acquire(&temps).unwrap();
            assert_eq!(temps.outstanding(), 1);
            guard.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(temps.outstanding(), 0);
    }

    #[test]
    fn test_guard_explicit_release() {
        let temps = temps();
        let guard = TempGuard::acquire(&temps).unwrap();
        guard.release().unwrap();
        assert_eq!(temps.outstanding(), 0);
        assert_eq!(entries(temps.dir()), 0);
    }
}
