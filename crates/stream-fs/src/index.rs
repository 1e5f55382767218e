//! Mapping from stream ids to the log files backing them.
//!
//! The in-memory map is the fast path; it is seeded by an initial walk and
//! kept current by the watcher. Because the live map is never guaranteed
//! complete (files can predate the process or race watcher startup), misses
//! fall back to searching the project tree, trading read latency for
//! correctness. All filesystem enumeration happens outside the shared lock.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::{Shared, LOG_EXT};

/// Resolves a stream id to its backing file, short-circuiting on first hit:
/// exact map lookup, then a glob over immediate subdirectories, then a full
/// recursive walk. Hits from either search tier are cached in the map.
///
/// When multiple files in the tree share the same base name, whichever the
/// filesystem enumerates first wins; the order is not defined.
pub(crate) fn resolve(
    shared: &RwLock<Shared>,
    projects_dir: &Path,
    stream_id: &str,
) -> Result<PathBuf, Error> {
    if let Some(path) = shared.read().index.get(stream_id) {
        return Ok(path.clone());
    }

    let file_name = format!("{stream_id}.{LOG_EXT}");

    for pattern_dir in ["*", "**"] {
        if let Some(path) = first_match(&projects_dir.join(pattern_dir).join(&file_name)) {
            debug!(stream_id, path = %path.display(), "resolved stream via search");
            shared
                .write()
                .index
                .insert(stream_id.to_string(), path.clone());
            return Ok(path);
        }
    }

    Err(Error::NotFound)
}

/// Seeds the index with every log file currently under the project tree.
/// Best-effort: unreadable entries are skipped rather than aborting startup.
pub(crate) fn scan(shared: &RwLock<Shared>, projects_dir: &Path) {
    let Some(pattern) = projects_dir
        .join("**")
        .join(format!("*.{LOG_EXT}"))
        .to_str()
        .map(str::to_string)
    else {
        return;
    };
    let Ok(paths) = glob::glob(&pattern) else {
        return;
    };

    let mut count = 0usize;
    for path in paths.flatten() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            shared.write().index.insert(stem.to_string(), path.clone());
            count += 1;
        }
    }

    debug!(count, dir = %projects_dir.display(), "indexed stream files");
}

/// First filesystem-enumerated match for a glob pattern, skipping entries
/// that cannot be read.
fn first_match(pattern: &Path) -> Option<PathBuf> {
    let pattern = pattern.to_str()?;
    glob::glob(pattern).ok()?.flatten().next()
}
