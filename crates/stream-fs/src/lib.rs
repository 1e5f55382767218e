//! Read-only stream storage over a directory of append-only JSONL log
//! files.
//!
//! Streams are resolved from a root directory holding one well-known
//! history file plus a project tree of per-stream log files, addressed by
//! opaque byte-offset tokens, and tailed live via filesystem change
//! notifications. All mutating operations are rejected: the files are owned
//! by the process writing them, never by this adapter.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod index;
mod offset;
mod reader;
mod watcher;

pub use error::Error;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use duralog_stream::{Offset, ReadResult, Storage, StreamConfig, StreamInfo};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Extension of the log files backing streams.
pub(crate) const LOG_EXT: &str = "jsonl";

/// Reserved id of the stream backed by the well-known history file.
pub(crate) const HISTORY_STREAM_ID: &str = "_history";

const HISTORY_FILENAME: &str = "history.jsonl";
const PROJECTS_DIR: &str = "projects";
const CONTENT_TYPE: &str = "application/json";

type Subscriber = (u64, mpsc::Sender<Offset>);

/// State shared between callers and the watch loop. Guarded by one
/// reader/writer lock, held only for map access; filesystem I/O always
/// happens outside it.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) index: HashMap<String, PathBuf>,
    pub(crate) subscribers: HashMap<String, Vec<Subscriber>>,
    next_subscription_id: u64,
}

/// Read-only stream storage backed by log files under a root directory.
///
/// The well-known history file resolves under a reserved id; every other
/// stream id names a `<id>.jsonl` file somewhere under the project tree.
/// A background watch loop, started with [`FsStorage::start`], keeps the
/// index current and fans out tail-offset hints to subscribers.
#[derive(Clone)]
pub struct FsStorage {
    dir: PathBuf,
    projects_dir: PathBuf,
    history_path: PathBuf,
    shared: Arc<RwLock<Shared>>,
    watch_state: Arc<Mutex<Option<watcher::WatchState>>>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl std::fmt::Debug for FsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsStorage").field("dir", &self.dir).finish()
    }
}

impl FsStorage {
    /// Creates storage rooted at `dir`, seeds the index with an initial scan
    /// of the project tree, and registers the filesystem watches.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be set up.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
        let projects_dir = dir.join(PROJECTS_DIR);
        let history_path = dir.join(HISTORY_FILENAME);

        let shared = Arc::new(RwLock::new(Shared::default()));
        shared
            .write()
            .index
            .insert(HISTORY_STREAM_ID.to_string(), history_path.clone());
        index::scan(&shared, &projects_dir);

        let watch_state = watcher::start(&dir, &projects_dir)?;

        Ok(Self {
            dir,
            projects_dir,
            history_path,
            shared,
            watch_state: Arc::new(Mutex::new(Some(watch_state))),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        })
    }

    /// Starts the watch loop. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage was already started.
    pub fn start(&self) -> Result<JoinHandle<()>, Error> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let Some(state) = self.watch_state.lock().take() else {
            return Err(Error::AlreadyStarted);
        };

        let handle = self.task_tracker.spawn(watcher::run(
            state,
            Arc::clone(&self.shared),
            self.history_path.clone(),
            self.shutdown_token.clone(),
        ));
        self.task_tracker.close();

        info!(dir = %self.dir.display(), "stream storage watching for changes");

        Ok(handle)
    }

    /// Stops the watch loop and waits for it to exit.
    pub async fn shutdown(&self) {
        info!("stream storage shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("stream storage shut down");
    }

    fn resolve(&self, stream_id: &str) -> Result<PathBuf, Error> {
        index::resolve(&self.shared, &self.projects_dir, stream_id)
    }
}

#[async_trait]
impl Storage for FsStorage {
    type Error = Error;

    async fn create(&self, _stream_id: &str, _config: StreamConfig) -> Result<bool, Self::Error> {
        Err(Error::ReadOnly)
    }

    async fn append(&self, _stream_id: &str, _data: Bytes) -> Result<Offset, Self::Error> {
        Err(Error::ReadOnly)
    }

    async fn delete(&self, _stream_id: &str) -> Result<(), Self::Error> {
        Err(Error::ReadOnly)
    }

    async fn head(&self, stream_id: &str) -> Result<StreamInfo, Self::Error> {
        let path = self.resolve(stream_id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::Io("failed to stat stream file", e))?;

        Ok(StreamInfo {
            content_type: CONTENT_TYPE.to_string(),
            next_offset: offset::encode(meta.len()),
        })
    }

    async fn read(
        &self,
        stream_id: &str,
        offset: &Offset,
        limit: usize,
    ) -> Result<ReadResult, Self::Error> {
        let path = self.resolve(stream_id)?;
        let start = offset::decode(offset);
        let (messages, pos, tail) = reader::read_lines(&path, start, limit).await?;

        // No records means no progress: hand the caller their offset back.
        let next_offset = if messages.is_empty() {
            offset.clone()
        } else {
            offset::encode(pos)
        };

        Ok(ReadResult {
            messages,
            next_offset,
            tail_offset: offset::encode(tail),
        })
    }

    async fn subscribe(
        &self,
        stream_id: &str,
        _offset: &Offset,
        cancellation: CancellationToken,
    ) -> Result<mpsc::Receiver<Offset>, Self::Error> {
        self.resolve(stream_id)?;

        let (tx, rx) = mpsc::channel(1);
        let subscription_id = {
            let mut shared = self.shared.write();
            shared.next_subscription_id += 1;
            let id = shared.next_subscription_id;
            shared
                .subscribers
                .entry(stream_id.to_string())
                .or_default()
                .push((id, tx));
            id
        };

        let shared = Arc::clone(&self.shared);
        let stream_id = stream_id.to_string();
        tokio::spawn(async move {
            cancellation.cancelled().await;

            // Dropping the sender closes the channel; an in-flight try_send
            // racing this loses gracefully.
            let mut shared = shared.write();
            if let Some(senders) = shared.subscribers.get_mut(&stream_id) {
                senders.retain(|(id, _)| *id != subscription_id);
                if senders.is_empty() {
                    shared.subscribers.remove(&stream_id);
                }
            }
        });

        Ok(rx)
    }
}
