//! Per-microservice memo of file contents with write-through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::ports::FileSystem;

/// Caches reads through the [`FileSystem`] port. Entries live until
/// [`FileCache::clear`] or the cache is dropped; nothing is evicted.
pub struct FileCache<'a> {
    fs: &'a dyn FileSystem,
    entries: Mutex<HashMap<PathBuf, String>>,
}

impl<'a> FileCache<'a> {
    /// Creates an empty cache over `fs`.
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs, entries: Mutex::new(HashMap::new()) }
    }

    /// Contents of `path`, read from disk on first access only.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::FileNotFound`] when the file is missing and
    /// [`MigrationError::Io`] when it exists but cannot be read.
    pub fn get(&self, path: &Path) -> Result<String> {
        if let Some(hit) = self.lock().get(path) {
            return Ok(hit.clone());
        }
        if !self.fs.exists(path) {
            return Err(MigrationError::FileNotFound(path.to_path_buf()));
        }
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| MigrationError::Io(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "cached file");
        self.lock().insert(path.to_path_buf(), content.clone());
        Ok(content)
    }

    /// Writes `content` to `path` (creating parent directories) and caches it.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Io`] when the write fails; the cache is left
    /// unchanged in that case.
    pub fn put(&self, path: &Path, content: &str) -> Result<()> {
        self.fs
            .write(path, content)
            .map_err(|e| MigrationError::Io(format!("{}: {e}", path.display())))?;
        self.lock().insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
