//! Generic JSON record persistence with atomic replace.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::StorageError;

/// Attempts for a transient read failure before giving up.
const READ_ATTEMPTS: u32 = 3;

/// Delay between read attempts.
const READ_RETRY_DELAY: Duration = Duration::from_millis(25);

/// One persisted JSON record.
///
/// Writes go through a temp file in the same directory followed by a
/// rename, so readers only ever observe a complete document. A missing
/// or unparseable file loads as the default value with a warning; session
/// history is never worth aborting over.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file guarding read-modify-write sequences on this record.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Load the record, falling back to the default value.
    pub async fn load(&self) -> T {
        for attempt in 0..READ_ATTEMPTS {
            match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(value) => return value,
                    Err(e) => {
                        tracing::warn!(
                            path = %self.path.display(),
                            error = %e,
                            "Failed to parse state file, starting fresh"
                        );
                        return T::default();
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
                Err(e) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %e,
                        attempt,
                        "Transient read failure, retrying"
                    );
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                }
            }
        }
        tracing::warn!(
            path = %self.path.display(),
            "State file unreadable after retries, starting fresh"
        );
        T::default()
    }

    /// Persist the record atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be serialized or the
    /// temp-write-rename sequence fails.
    pub async fn save(&self, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Serialize {
            path: self.path.clone(),
            source: e,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StorageError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StorageError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        file.sync_data().await.map_err(|e| StorageError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(())
    }
}
