//! Interface for durable, offset-addressed streams of newline-delimited
//! records, along with the data types shared between storage adapters and
//! the surrounding protocol layer.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Marker trait for storage adapter errors.
pub trait StorageError: Debug + Error + Send + Sync + 'static {}

/// An opaque continuation token denoting a byte position in a stream.
///
/// Tokens produced by a storage adapter sort lexicographically in the same
/// order as the byte positions they encode. The empty token (also the
/// `Default`) means "from the beginning"; the literal `"-1"` is accepted as
/// an alias for the same. Callers treat offsets as opaque: they are only
/// ever passed back to the adapter that produced them.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offset(String);

impl Offset {
    /// Accepted alias for the "from the beginning" sentinel.
    pub const BEGINNING_ALIAS: &str = "-1";

    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this token requests a read from the beginning of the stream.
    #[must_use]
    pub fn is_beginning(&self) -> bool {
        self.0.is_empty() || self.0 == Self::BEGINNING_ALIAS
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Offset {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Offset {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// One record read from a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    /// Raw record bytes, without the trailing newline.
    pub data: Bytes,

    /// Position just past this record's trailing newline.
    pub offset: Offset,
}

/// The result of a ranged read.
#[derive(Clone, Debug)]
pub struct ReadResult {
    /// Records read, in stream order.
    pub messages: Vec<StoredMessage>,

    /// Continuation token for the next read. Equals the input offset when no
    /// records were returned.
    pub next_offset: Offset,

    /// Position of the end of the stream at the time of the call. Advisory:
    /// it may already be stale by the time the caller observes it.
    pub tail_offset: Offset,
}

/// Stream metadata returned by [`Storage::head`].
#[derive(Clone, Debug)]
pub struct StreamInfo {
    /// MIME type of the stream's records.
    pub content_type: String,

    /// Position of the end of the stream at the time of the call.
    pub next_offset: Offset,
}

/// Parameters for stream creation.
#[derive(Clone, Debug, Default)]
pub struct StreamConfig {
    /// MIME type of the stream's records, if not the adapter default.
    pub content_type: Option<String>,
}

/// A trait representing durable stream storage with asynchronous operations.
///
/// # Required Methods
/// - `async fn create(&self, stream_id: &str, config: StreamConfig) -> Result<bool, Self::Error>`: Creates a stream, returning whether it was newly created.
/// - `async fn append(&self, stream_id: &str, data: Bytes) -> Result<Offset, Self::Error>`: Appends a record and returns the new tail offset.
/// - `async fn delete(&self, stream_id: &str) -> Result<(), Self::Error>`: Deletes a stream.
/// - `async fn head(&self, stream_id: &str) -> Result<StreamInfo, Self::Error>`: Returns stream metadata.
/// - `async fn read(&self, stream_id: &str, offset: &Offset, limit: usize) -> Result<ReadResult, Self::Error>`: Reads records starting at an offset, bounded by a byte budget.
/// - `async fn subscribe(&self, stream_id: &str, offset: &Offset, cancellation: CancellationToken) -> Result<mpsc::Receiver<Offset>, Self::Error>`: Subscribes to tail-offset change hints.
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// The error type for this adapter.
    type Error: StorageError;

    /// Creates a stream, returning whether it was newly created.
    async fn create(&self, stream_id: &str, config: StreamConfig) -> Result<bool, Self::Error>;

    /// Appends a record and returns the new tail offset.
    async fn append(&self, stream_id: &str, data: Bytes) -> Result<Offset, Self::Error>;

    /// Deletes a stream.
    async fn delete(&self, stream_id: &str) -> Result<(), Self::Error>;

    /// Returns stream metadata.
    async fn head(&self, stream_id: &str) -> Result<StreamInfo, Self::Error>;

    /// Reads records starting at `offset`, accumulating whole records until
    /// the stream is exhausted or the payload would exceed `limit` bytes.
    /// The first record is always returned even if it alone exceeds the
    /// budget.
    async fn read(
        &self,
        stream_id: &str,
        offset: &Offset,
        limit: usize,
    ) -> Result<ReadResult, Self::Error>;

    /// Subscribes to change hints for a stream. The receiver yields the
    /// stream's tail offset whenever new data is observed; delivery is
    /// best-effort and a hint only ever means "re-read". The subscription is
    /// removed and the channel closed when `cancellation` fires.
    ///
    /// `offset` is accepted for interface compatibility; replaying existing
    /// records from an offset is done with [`Storage::read`].
    async fn subscribe(
        &self,
        stream_id: &str,
        offset: &Offset,
        cancellation: CancellationToken,
    ) -> Result<mpsc::Receiver<Offset>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beginning_sentinels() {
        assert!(Offset::default().is_beginning());
        assert!(Offset::new("-1").is_beginning());
        assert!(!Offset::new("00000000000000000042").is_beginning());
    }

    #[test]
    fn test_offset_string_order() {
        let a = Offset::new("00000000000000000009");
        let b = Offset::new("00000000000000000010");
        assert!(a < b);
    }
}
