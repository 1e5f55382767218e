//! Filesystem watch loop feeding the index and subscriber notifications.
//!
//! One background task consumes raw OS file-change events serially: it
//! performs every index upsert and every notification fan-out itself, so no
//! finer-grained locking is needed inside the watch path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::offset;
use crate::{Shared, HISTORY_STREAM_ID, LOG_EXT};

/// A registered OS watch plus the channel its events arrive on. Held until
/// [`run`] takes ownership.
pub(crate) struct WatchState {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

/// Registers the OS watches: the root directory (non-recursively) for the
/// well-known history file, and the project tree recursively so that
/// directories created later are covered without further registration.
pub(crate) fn start(dir: &Path, projects_dir: &Path) -> Result<WatchState, Error> {
    let (tx, events) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        let _ = tx.send(event);
    })?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    if projects_dir.is_dir() {
        watcher.watch(projects_dir, RecursiveMode::Recursive)?;
    } else {
        warn!(
            dir = %projects_dir.display(),
            "project directory does not exist, live updates disabled for it"
        );
    }

    Ok(WatchState { watcher, events })
}

/// The watch loop. Runs until cancelled or until the event source closes.
/// Owns the OS watch resource, so it is released exactly once on exit.
pub(crate) async fn run(
    state: WatchState,
    shared: Arc<RwLock<Shared>>,
    history_path: PathBuf,
    shutdown_token: CancellationToken,
) {
    let WatchState {
        watcher: _watcher,
        mut events,
    } = state;

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            event = events.recv() => {
                match event {
                    Some(Ok(event)) => handle_event(&shared, &history_path, &event),
                    Some(Err(e)) => warn!("filesystem watch error: {e}"),
                    None => break,
                }
            }
        }
    }

    debug!("watch loop stopped");
}

/// Processes one file-change event: upserts the index for project streams
/// (covering files appearing or moving) and pushes the new tail offset to
/// every subscriber of the affected stream. Never blocks and never fails;
/// malformed paths and vanished files are skipped.
fn handle_event(shared: &RwLock<Shared>, history_path: &Path, event: &Event) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXT) {
            continue;
        }

        let stream_id = if path.as_path() == history_path {
            HISTORY_STREAM_ID.to_string()
        } else {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            shared.write().index.insert(stem.to_string(), path.clone());
            stem.to_string()
        };

        // Stat outside the lock; a file gone by now produces no notification.
        let Ok(meta) = std::fs::metadata(path) else {
            trace!(stream_id, "stream file vanished before stat");
            continue;
        };
        let tail = offset::encode(meta.len());

        let guard = shared.read();
        if let Some(senders) = guard.subscribers.get(&stream_id) {
            for (_, tx) in senders {
                // Depth-1 buffer, drop on full: a hint only ever means
                // "re-check", and a dropped one is covered by the
                // subscriber's next read.
                let _ = tx.try_send(tail.clone());
            }
        }
    }
}
