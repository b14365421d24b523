//! Packaging of the generated repository into a single zip archive.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::walker::slash_path;
use crate::error::{MigrationError, Result};

fn io_err(context: &str, err: impl std::fmt::Display) -> MigrationError {
    MigrationError::Io(format!("{context}: {err}"))
}

/// Zips everything under `repo_dir` into `<output_dir>/<repo_name>.zip`.
///
/// Entry names are relative to `repo_dir`, so the archive's top-level
/// entries are the microservice directories.
///
/// # Errors
///
/// Returns [`MigrationError::Io`] on any read, walk or write failure.
pub fn write_archive(repo_dir: &Path, output_dir: &Path, repo_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| io_err("create output directory", e))?;
    let archive_path = output_dir.join(format!("{repo_name}.zip"));
    let file = File::create(&archive_path).map_err(|e| io_err("create archive", e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    for entry in WalkDir::new(repo_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| io_err("walk repository", e))?;
        let rel = entry.path().strip_prefix(repo_dir).map_err(|e| io_err("archive path", e))?;
        let name = slash_path(rel);
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options).map_err(|e| io_err(&name, e))?;
        } else if entry.file_type().is_file() {
            let bytes = std::fs::read(entry.path()).map_err(|e| io_err(&name, e))?;
            zip.start_file(name.clone(), options).map_err(|e| io_err(&name, e))?;
            zip.write_all(&bytes).map_err(|e| io_err(&name, e))?;
            entries += 1;
        }
    }
    zip.finish().map_err(|e| io_err("finish archive", e))?;
    info!(archive = %archive_path.display(), files = entries, "repository archived");
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn top_level_entries_are_microservices() {
        let repo = tempfile::tempdir().unwrap();
        for rel in ["Orders/Orders.Api/Program.cs", "Users/Users.Api/Program.cs", "Gateway/ocelot.json"] {
            let path = repo.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, rel).unwrap();
        }
        let out = tempfile::tempdir().unwrap();

        let path = write_archive(repo.path(), out.path(), "shop").unwrap();
        assert_eq!(path, out.path().join("shop.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let top: BTreeSet<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().split('/').next().unwrap().to_string())
            .collect();
        assert_eq!(top, BTreeSet::from(["Gateway".into(), "Orders".into(), "Users".into()]));

        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("Gateway/ocelot.json").unwrap(), &mut content).unwrap();
        assert_eq!(content, "Gateway/ocelot.json");
    }
}
