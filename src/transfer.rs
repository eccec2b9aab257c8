//! Chunked file streaming between local storage and a channel
// (c) 2025 Ross Younger

use std::io::{Read, Write};

use tracing::trace;

use crate::channel::{Channel, ChannelError};

/// Fixed streaming chunk size.
///
/// Both directions move file bytes in units of this size, with a short
/// final chunk. Wire traffic patterns and test fixtures depend on it.
pub const CHUNK_SIZE: usize = 1024;

/// Failure classes for a streaming operation, split so that callers can
/// apply the right recovery without inspecting the cause:
/// `Channel` means the channel is no longer usable for this transfer;
/// `Storage` means the channel survived (and has been drained).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The data channel failed; the transfer is unrecoverable.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Local file I/O failed.
    #[error("file I/O failed: {0}")]
    Storage(#[from] std::io::Error),
}

/// Streams `source` to `channel` in [`CHUNK_SIZE`] units until end of data.
///
/// Each chunk is written to the channel in full before the next read; a
/// zero-length read signals end of data and ends the loop successfully.
/// Returns the number of bytes sent.
pub fn send_file<R: Read, C: Channel>(source: &mut R, channel: &mut C) -> Result<u64, TransferError> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        channel.send(&buf[..n])?;
        sent += n as u64;
    }
    trace!("sent {sent} bytes");
    Ok(sent)
}

/// Receives exactly `expected_size` bytes from `channel` into `destination`.
///
/// A local write failure does not stop the read loop: the remaining
/// declared bytes are drained from the channel first, then the failure is
/// returned. The channel is shared infrastructure for subsequent requests
/// and must not be left holding unread bytes belonging to this transfer.
/// A channel error, by contrast, aborts immediately: the channel itself is
/// no longer usable.
pub fn receive_file<W: Write, C: Channel>(
    destination: &mut W,
    expected_size: u32,
    channel: &mut C,
) -> Result<(), TransferError> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = expected_size as usize;
    let mut write_failure: Option<std::io::Error> = None;

    while remaining > 0 {
        let take = remaining.min(CHUNK_SIZE);
        channel.receive(&mut buf[..take])?;
        remaining -= take;
        if write_failure.is_none() {
            if let Err(e) = destination.write_all(&buf[..take]) {
                write_failure = Some(e);
            }
        }
    }

    match write_failure {
        Some(e) => Err(TransferError::Storage(e)),
        None => {
            destination.flush()?;
            trace!("received {expected_size} bytes");
            Ok(())
        }
    }
}
