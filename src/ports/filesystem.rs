//! Filesystem port used for source reads and generated-file writes.

use std::path::Path;

use super::PortError;

/// Reads and writes files on behalf of the pipeline.
///
/// Directory traversal of whole trees (archiving, asset copying, source
/// scanning) walks the real disk; single-file I/O goes through this port so
/// tests can count and fake it.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String, PortError>;

    /// Writes `contents` to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError>;

    /// Returns `true` if the path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists the entry names of a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a readable directory.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError>;

    /// Creates a directory and all of its missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<(), PortError>;

    /// Copies a file to `to`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the target written.
    fn copy(&self, from: &Path, to: &Path) -> Result<(), PortError>;
}
