//! Control-channel wire protocol
// (c) 2025 Ross Younger
//!
//! The control channel carries tagged, length-prefixed [`Packet`]s; file
//! bytes never travel on it. Each GET or SEND opens a fresh data channel
//! for that one transfer (see [`crate::channel::tcp`]).
//!
//! # On-wire format
//!
//! Every packet starts with a 4-byte tag, followed by tag-specific fields.
//! All fixed-width fields are 32 bits, host byte order (peers are assumed
//! to share an architecture; this is a documented limitation of the
//! protocol, not an oversight of the implementation).
//!
//! | Packet  | Layout                                    |
//! |---------|-------------------------------------------|
//! | `Get`   | `[tag][name_len][name_bytes]`             |
//! | `Send`  | `[tag][name_len][name_bytes][file_size]`  |
//! | `Error` | `[tag][msg_len][msg_bytes]`               |
//!
//! Length fields always describe the exact byte count of the variable
//! field that follows. The decoder trusts a declared length only up to
//! [`MAX_FIELD_BYTES`]; anything larger is rejected before allocation.
//!
//! # Exchanges
//!
//! * `GET`: client sends `Get`, then awaits exactly one reply. `Send`
//!   announces the file and its size, after which the bytes arrive on a
//!   fresh data channel; `Error` carries a free-text explanation.
//! * `SEND`: client sends `Send` announcing name and size, then streams
//!   the bytes on a fresh data channel. On failure to accept the file the
//!   server replies with `Error`; there is no acknowledgement on success.

mod packet;
pub use packet::{Packet, PacketTag, MAX_FIELD_BYTES};

use crate::channel::ChannelError;

/// A malformed or unreadable packet.
///
/// Aborts the current request only; the session continues with the next
/// dispatch. Contrast [`ChannelError`], which has session-level policy.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A declared field length exceeded [`MAX_FIELD_BYTES`].
    #[error("declared {field} length {length} exceeds limit {limit}")]
    FieldTooLong {
        /// Which field was oversized.
        field: &'static str,
        /// The declared length.
        length: u32,
        /// The configured maximum.
        limit: u32,
    },
    /// A variable-length field was not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Which field was malformed.
        field: &'static str,
    },
    /// The peer sent a tag this implementation does not know.
    #[error("unknown packet tag {raw}")]
    UnknownTag {
        /// The tag value as read off the wire.
        raw: u32,
    },
    /// The channel failed mid-packet.
    #[error("channel failed mid-packet: {0}")]
    Truncated(#[from] ChannelError),
}
