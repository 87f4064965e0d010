//! Exclusive advisory lock marking the one supervising process.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::fcntl::{Flock, FlockArg};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[cfg(unix)]
const LOCK_FILE_MODE: u32 = 0o600; // Owner read/write only

#[cfg(unix)]
type Guard = Flock<File>;
#[cfg(not(unix))]
type Guard = File;

/// Non-blocking exclusive lock on a well-known file.
///
/// The lock belongs to the open file description, so the OS drops it
/// when the process dies. The file itself is left in place; its content
/// (the holder's pid) is informational only.
pub struct InstanceLock {
    path: PathBuf,
    guard: Option<Guard>,
}

impl InstanceLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another holder owns it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        options.mode(LOCK_FILE_MODE);
        let file = options.open(path)?;

        let Some(mut guard) = Self::lock(file)? else {
            return Ok(None);
        };

        // Truncate only once the lock is ours; the holder's pid stays intact otherwise
        guard.set_len(0)?;
        write!(guard, "{}", std::process::id())?;
        guard.sync_all()?;

        Ok(Some(Self {
            path: path.to_path_buf(),
            guard: Some(guard),
        }))
    }

    #[cfg(unix)]
    fn lock(file: File) -> io::Result<Option<Guard>> {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => Ok(Some(guard)),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(not(unix))]
    fn lock(file: File) -> io::Result<Option<Guard>> {
        match file.try_lock() {
            Ok(()) => Ok(Some(file)),
            Err(std::fs::TryLockError::WouldBlock) => Ok(None),
            Err(std::fs::TryLockError::Error(e)) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }

    /// Release the lock. Safe to call more than once.
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            tracing::info!("Released instance lock {}", self.path.display());
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}
