//! Recursive scan of the models directory.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::domain::DiscoveredModelFile;

/// Deepest directory level visited below the root.
pub const MAX_SCAN_DEPTH: usize = 8;

/// Enumerate regular files under `root` accepted by `keep`.
///
/// Symlinks are followed; walkdir reports loops as errors, which are skipped
/// along with unreadable entries. A missing root yields an empty list.
pub fn scan_files<F>(root: &Path, keep: F) -> Vec<DiscoveredModelFile>
where
    F: Fn(&str) -> bool,
{
    if !root.is_dir() {
        debug!(root = %root.display(), "Models directory does not exist");
        return Vec::new();
    }
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .follow_links(true)
        .max_depth(MAX_SCAN_DEPTH)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !keep(&name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        files.push(DiscoveredModelFile {
            path: entry.path().to_path_buf(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(std::time::UNIX_EPOCH),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
