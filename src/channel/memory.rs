//! In-memory channel for deterministic tests
// (c) 2025 Ross Younger

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Channel, ChannelError};

type Buffer = Rc<RefCell<VecDeque<u8>>>;

/// An in-memory [`Channel`], created in connected pairs by [`pair`].
///
/// Bytes sent on one end are received on the other. Reading past the
/// available data reports `EndOfStream` rather than blocking, which makes
/// truncated-input cases directly testable. Single-threaded only.
#[derive(Debug)]
pub struct MemoryChannel {
    inbox: Buffer,
    outbox: Buffer,
}

/// Creates a connected pair of in-memory channels.
#[must_use]
pub fn pair() -> (MemoryChannel, MemoryChannel) {
    let a = Buffer::default();
    let b = Buffer::default();
    (
        MemoryChannel {
            inbox: a.clone(),
            outbox: b.clone(),
        },
        MemoryChannel {
            inbox: b,
            outbox: a,
        },
    )
}

impl MemoryChannel {
    /// Number of bytes queued for this end to receive.
    ///
    /// Tests use this to assert that a transfer left the channel drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }
}

impl Channel for MemoryChannel {
    fn send(&mut self, buf: &[u8]) -> Result<(), ChannelError> {
        self.outbox.borrow_mut().extend(buf.iter().copied());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let mut inbox = self.inbox.borrow_mut();
        if inbox.len() < buf.len() {
            return Err(ChannelError::EndOfStream);
        }
        for slot in buf.iter_mut() {
            *slot = inbox.pop_front().unwrap_or_default();
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::pair;
    use crate::channel::{Channel as _, ChannelError};
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip() {
        let (mut alice, mut bob) = pair();
        alice.send(b"abc").unwrap();
        let mut buf = [0u8; 3];
        bob.receive(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        assert_eq!(bob.pending(), 0);
    }

    #[test]
    fn short_input_is_end_of_stream() {
        let (mut alice, mut bob) = pair();
        alice.send(b"ab").unwrap();
        let mut buf = [0u8; 3];
        let err = bob.receive(&mut buf).unwrap_err();
        assert!(matches!(err, ChannelError::EndOfStream));
    }
}
