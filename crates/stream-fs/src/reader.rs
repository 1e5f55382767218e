//! Line-bounded range reads over a single log file.

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use duralog_stream::StoredMessage;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};

use crate::error::Error;
use crate::offset;

/// Hard cap on a single record; exceeding it is a scan error, not a silent
/// truncation. Some history records run well past 1 MiB.
pub(crate) const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Scans `path` forward from byte position `start`, accumulating whole
/// newline-terminated records until the file is exhausted or the payload
/// would exceed `limit`. The first record is always included even when it
/// alone exceeds the budget, so reads under a tight byte ceiling still make
/// forward progress. A trailing chunk without a newline is an incomplete
/// record and is left for a later read.
///
/// Returns the records, the byte position just past the last one (equal to
/// `start` when none were read), and the file length at open time.
pub(crate) async fn read_lines(
    path: &Path,
    start: u64,
    limit: usize,
) -> Result<(Vec<StoredMessage>, u64, u64), Error> {
    let file = File::open(path)
        .await
        .map_err(|e| Error::Io("failed to open stream file", e))?;
    let tail = file
        .metadata()
        .await
        .map_err(|e| Error::Io("failed to stat stream file", e))?
        .len();

    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
    reader
        .seek(SeekFrom::Start(start))
        .await
        .map_err(|e| Error::Io("failed to seek in stream file", e))?;

    // Re-arm the limit per record so one oversize line cannot balloon memory.
    let mut reader = reader.take(0);

    let mut messages = Vec::new();
    let mut pos = start;
    let mut payload = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        reader.set_limit(MAX_LINE_BYTES as u64 + 1);
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| Error::Io("failed to read stream file", e))?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            if n > MAX_LINE_BYTES {
                return Err(Error::LineTooLong(MAX_LINE_BYTES));
            }
            // Unterminated trailing chunk: a write still in flight.
            break;
        }

        let data_len = buf.len() - 1;
        if payload + data_len > limit && !messages.is_empty() {
            break;
        }

        pos += buf.len() as u64;
        payload += data_len;
        messages.push(StoredMessage {
            data: Bytes::copy_from_slice(&buf[..data_len]),
            offset: offset::encode(pos),
        });
    }

    Ok((messages, pos, tail))
}
