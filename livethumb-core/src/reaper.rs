use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Delete every regular file left under `root` by a previous run, keeping
/// the directory tree. Creates `root` when it does not exist.
///
/// Runs before the watcher is armed. Per-entry failures are logged and
/// skipped; only failing to create the root is an error. Returns the number
/// of files removed.
pub fn reap_leftovers(root: &Path) -> Result<usize> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!(root = %root.display(), "created frames directory");
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(path = %entry.path().display(), "removed leftover frame");
                removed += 1;
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "failed to remove leftover frame");
            }
        }
    }

    info!(root = %root.display(), removed, "cleared leftover frames");
    Ok(removed)
}
