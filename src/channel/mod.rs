//! Channel abstraction: exact-size byte transport with a small error taxonomy
// (c) 2025 Ross Younger

pub mod tcp;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

use std::io::ErrorKind;

/// Errors arising from a [`Channel`].
///
/// The session loop applies a different policy to each variant when the
/// fault is on the control channel: [`EndOfStream`](ChannelError::EndOfStream)
/// and [`Reset`](ChannelError::Reset) are an orderly peer disconnect;
/// [`Other`](ChannelError::Other) is fatal and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The peer closed the stream.
    #[error("end of stream")]
    EndOfStream,
    /// The peer reset or aborted the connection.
    #[error("connection reset by peer")]
    Reset,
    /// Any other transport fault.
    #[error("transport error: {0}")]
    Other(std::io::Error),
}

impl ChannelError {
    /// True if the peer has gone away in an orderly fashion.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChannelError::EndOfStream | ChannelError::Reset)
    }
}

/// Translation from transport faults into the taxonomy.
impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof => ChannelError::EndOfStream,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                ChannelError::Reset
            }
            _ => ChannelError::Other(e),
        }
    }
}

/// A duplex byte stream with exact-size, blocking send and receive.
///
/// Exactly one production implementation exists ([`tcp::TcpChannel`]);
/// the in-memory implementation is for deterministic testing.
/// Higher layers depend only on this trait, never on the transport.
pub trait Channel: std::fmt::Debug {
    /// Sends the whole of `buf`, blocking until it has been written.
    fn send(&mut self, buf: &[u8]) -> Result<(), ChannelError>;

    /// Fills the whole of `buf`, blocking until it has been read.
    fn receive(&mut self, buf: &mut [u8]) -> Result<(), ChannelError>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::ChannelError;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_error_translation() {
        let e = ChannelError::from(Error::from(ErrorKind::UnexpectedEof));
        assert!(matches!(e, ChannelError::EndOfStream));
        let e = ChannelError::from(Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(e, ChannelError::Reset));
        let e = ChannelError::from(Error::from(ErrorKind::BrokenPipe));
        assert!(matches!(e, ChannelError::Reset));
        let e = ChannelError::from(Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(e, ChannelError::Other(_)));
    }

    #[test]
    fn disconnect_classification() {
        assert!(ChannelError::EndOfStream.is_disconnect());
        assert!(ChannelError::Reset.is_disconnect());
        assert!(!ChannelError::Other(Error::from(ErrorKind::Other)).is_disconnect());
    }
}
