//! Advisory file locking for read-modify-write sequences.

use std::path::PathBuf;
use std::time::Duration;

use super::StorageError;

/// Acquisition attempts before reporting contention.
const LOCK_ATTEMPTS: u32 = 5;

/// Base delay between attempts; doubles each retry.
const LOCK_BASE_DELAY_MS: u64 = 25;

/// Held advisory lock. Dropping it releases the lock file.
///
/// The lock is cooperative: writers in this crate take it around every
/// read-modify-write sequence, readers never need it because writes are
/// atomic renames. On contention the caller is expected to skip the
/// mutation and log it rather than block indefinitely.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock, backing off between attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::LockContention` when every attempt found the
    /// lock held, or `StorageError::Io` for any other filesystem failure.
    pub async fn acquire(path: PathBuf) -> Result<Self, StorageError> {
        for attempt in 0..LOCK_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let delay = Duration::from_millis(LOCK_BASE_DELAY_MS * (1 << attempt));
                    tracing::debug!(
                        path = %path.display(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Lock held, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(StorageError::Io { path, source: e }),
            }
        }
        Err(StorageError::LockContention { path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock file");
            }
        }
    }
}
