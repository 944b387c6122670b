use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::HazardError;
use super::ObjectStore;

/// Objects stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    #[inline] pub fn root(&self) -> &Path { &self.root }

    /// Full filesystem path of `key`.
    #[inline] pub fn path(&self, key: &str) -> PathBuf { self.root.join(key) }
}

impl ObjectStore for LocalStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path(key);
        if !path.is_file() {
            return Err(HazardError::MissingInput(path.display().to_string()).into())
        }
        std::fs::read(&path)
            .with_context(|| format!("[storage::local] failed to read {}", path.display()))
    }

    fn has(&self, key: &str) -> bool { self.path(key).is_file() }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("[storage::local] failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, bytes)
            .with_context(|| format!("[storage::local] failed to write {}", path.display()))
    }

    fn locate(&self, key: &str) -> String { self.path(key).display().to_string() }
}
