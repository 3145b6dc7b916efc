//! State directory layout.
//!
//! All persisted state lives under a `.sentinel` directory at the project
//! root. Each record is an independent JSON file so a corrupt or missing
//! one never takes the others down with it.

use std::path::{Path, PathBuf};

use super::StorageError;

/// Name of the per-project state directory.
pub const STATE_DIR_NAME: &str = ".sentinel";

/// Handle to a project's state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// State directory directly under `project_dir`.
    #[must_use]
    pub fn at(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(STATE_DIR_NAME),
        }
    }

    /// Walk up from `start` looking for an existing state directory.
    #[must_use]
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(STATE_DIR_NAME))
            .find(|candidate| candidate.is_dir())
            .map(|root| Self { root })
    }

    /// Create the directory tree if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if a directory cannot be created.
    pub async fn ensure(&self) -> Result<(), StorageError> {
        for dir in [
            self.root.clone(),
            self.knowledge_dir(),
            self.templates_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the state directory lives in.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        self.root.parent().unwrap_or(&self.root)
    }

    #[must_use]
    pub fn knowledge_dir(&self) -> PathBuf {
        self.root.join("knowledge")
    }

    /// Path of one knowledge category collection.
    #[must_use]
    pub fn knowledge_file(&self, category: &str) -> PathBuf {
        self.knowledge_dir().join(format!("{category}.json"))
    }

    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.json")
    }

    #[must_use]
    pub fn rejections_file(&self) -> PathBuf {
        self.root.join("rejections.json")
    }

    #[must_use]
    pub fn acceptance_file(&self) -> PathBuf {
        self.root.join("acceptance.json")
    }

    /// Thresholds adapted by the learning engine.
    #[must_use]
    pub fn tuning_file(&self) -> PathBuf {
        self.root.join("tuning.json")
    }

    #[must_use]
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    #[must_use]
    pub fn handoff_file(&self) -> PathBuf {
        self.root.join("handoff.md")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_at_appends_name() {
        let dir = StateDir::at(Path::new("/tmp/project"));
        assert_eq!(dir.root(), Path::new("/tmp/project/.sentinel"));
    }

    #[test]
    fn test_discover_finds_parent_state_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let state = tmp.path().join(STATE_DIR_NAME);
        std::fs::create_dir_all(&state).unwrap();
        let nested = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let found = StateDir::discover(&nested).unwrap();
        assert_eq!(found.root(), state.as_path());
    }

    #[test]
    fn test_discover_returns_none_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(StateDir::discover(tmp.path()).is_none());
    }

    #[tokio::test]
    async fn test_ensure_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = StateDir::at(tmp.path());
        dir.ensure().await.unwrap();
        assert!(dir.knowledge_dir().is_dir());
        assert!(dir.templates_dir().is_dir());
    }

    #[test]
    fn test_knowledge_file_path() {
        let dir = StateDir::at(Path::new("/p"));
        assert_eq!(
            dir.knowledge_file("gotchas"),
            PathBuf::from("/p/.sentinel/knowledge/gotchas.json")
        );
    }
}
