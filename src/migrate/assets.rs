//! Static asset copy from the legacy tree into a project's `wwwroot`.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MigrationError, Result};
use crate::ports::FileSystem;

/// Destination subfolder of `wwwroot` for a file, by extension.
fn asset_folder(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "css" => Some("content"),
        "js" => Some("scripts"),
        _ => None,
    }
}

fn is_wwwroot(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().eq_ignore_ascii_case("wwwroot")
}

/// Copies every `.css` and `.js` file under `source_root` (outside any
/// existing `wwwroot`) into `project_dir/wwwroot/{content,scripts}`.
///
/// Folder structure is flattened; when two files share a name the first one
/// in walk order wins. Returns the number of files copied.
///
/// # Errors
///
/// Returns [`MigrationError::Io`] when the source tree cannot be walked or
/// a copy fails.
pub fn copy_static_assets(fs: &dyn FileSystem, source_root: &Path, project_dir: &Path) -> Result<usize> {
    let target = project_dir.join("wwwroot");
    let mut taken: HashSet<(&'static str, String)> = HashSet::new();
    let mut copied = 0;

    let walker = WalkDir::new(source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_wwwroot(e));
    for entry in walker {
        let entry = entry.map_err(|e| MigrationError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(folder) = asset_folder(entry.path()) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !taken.insert((folder, name.clone())) {
            warn!(asset = %entry.path().display(), "duplicate asset name, keeping the first");
            continue;
        }
        let dest = target.join(folder).join(&name);
        fs.copy(entry.path(), &dest)
            .map_err(|e| MigrationError::Io(format!("copy {}: {e}", entry.path().display())))?;
        debug!(from = %entry.path().display(), to = %dest.display(), "asset copied");
        copied += 1;
    }
    Ok(copied)
}
