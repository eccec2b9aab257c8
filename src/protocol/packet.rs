//! Packet types and codec
// (c) 2025 Ross Younger

use bytes::{BufMut as _, Bytes, BytesMut};

use super::ProtocolError;
use crate::channel::Channel;

/// Upper bound on any declared variable-length field.
///
/// This limit is important to prevent excessive memory consumption if a
/// corrupt or hostile length field arrives: decode rejects anything larger
/// before allocating.
pub const MAX_FIELD_BYTES: u32 = 65_536;

/// The fixed-width tag leading every packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[repr(u32)]
pub enum PacketTag {
    /// Request a file from the peer.
    Get = 0,
    /// Announce a file about to be streamed to the peer.
    Send = 1,
    /// Report why an operation could not proceed.
    Error = 2,
}

impl PacketTag {
    /// Decodes a raw tag value. `None` is reported back to the dispatcher,
    /// which skips unknown tags.
    #[must_use]
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PacketTag::Get),
            1 => Some(PacketTag::Send),
            2 => Some(PacketTag::Error),
            _ => None,
        }
    }
}

/// A control-channel packet.
///
/// Packets are constructed, serialized and discarded per request; a
/// decoded packet is owned by the handler processing that one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Packet {
    /// Client asks the server to stream the named file back.
    Get {
        /// File name only, no directory components.
        name: String,
    },
    /// Either side announces a file it is about to stream.
    Send {
        /// File name only, no directory components.
        name: String,
        /// Exact byte count that will follow on the data channel.
        file_size: u32,
    },
    /// Free-text explanation of why an operation could not proceed.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl Packet {
    /// The tag this packet encodes with.
    #[must_use]
    pub fn tag(&self) -> PacketTag {
        match self {
            Packet::Get { .. } => PacketTag::Get,
            Packet::Send { .. } => PacketTag::Send,
            Packet::Error { .. } => PacketTag::Error,
        }
    }

    /// Serializes to wire form.
    ///
    /// Pure function of the packet's fields; length fields are always the
    /// exact byte count of the variable field that follows.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        buf.put_u32_ne(self.tag() as u32);
        match self {
            Packet::Get { name } => put_field(&mut buf, name),
            Packet::Send { name, file_size } => {
                put_field(&mut buf, name);
                buf.put_u32_ne(*file_size);
            }
            Packet::Error { message } => put_field(&mut buf, message),
        }
        buf.freeze()
    }

    fn wire_size(&self) -> usize {
        // tag + length prefix, plus the variable field (+ file_size for Send)
        match self {
            Packet::Get { name } => 8 + name.len(),
            Packet::Send { name, .. } => 12 + name.len(),
            Packet::Error { message } => 8 + message.len(),
        }
    }

    /// Reads one packet, tag first, from `channel`.
    ///
    /// The client uses this to await a reply; an unrecognised tag is a
    /// [`ProtocolError::UnknownTag`].
    pub fn read_from<C: Channel>(channel: &mut C) -> Result<Self, ProtocolError> {
        let raw = read_u32(channel)?;
        let tag = PacketTag::from_wire(raw).ok_or(ProtocolError::UnknownTag { raw })?;
        Self::read_body(tag, channel)
    }

    /// Reads the body of a packet whose tag has already been consumed.
    ///
    /// The server dispatch loop reads tags itself so that it can skip
    /// unknown values; it hands recognised ones here.
    pub fn read_body<C: Channel>(tag: PacketTag, channel: &mut C) -> Result<Self, ProtocolError> {
        match tag {
            PacketTag::Get => Ok(Packet::Get {
                name: read_field(channel, "name")?,
            }),
            PacketTag::Send => {
                let name = read_field(channel, "name")?;
                let file_size = read_u32(channel)?;
                Ok(Packet::Send { name, file_size })
            }
            PacketTag::Error => Ok(Packet::Error {
                message: read_field(channel, "message")?,
            }),
        }
    }
}

/// Appends `[len:4][bytes]` for a variable-length field.
fn put_field(buf: &mut BytesMut, value: &str) {
    #[allow(clippy::cast_possible_truncation)] // names and messages are nowhere near 4 GiB
    buf.put_u32_ne(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn read_u32<C: Channel>(channel: &mut C) -> Result<u32, ProtocolError> {
    let mut raw = [0u8; 4];
    channel.receive(&mut raw)?;
    Ok(u32::from_ne_bytes(raw))
}

/// Reads `[len:4][bytes]`, validating the declared length before allocating.
fn read_field<C: Channel>(channel: &mut C, field: &'static str) -> Result<String, ProtocolError> {
    let length = read_u32(channel)?;
    if length > MAX_FIELD_BYTES {
        return Err(ProtocolError::FieldTooLong {
            field,
            length,
            limit: MAX_FIELD_BYTES,
        });
    }
    let mut buf = BytesMut::zeroed(length as usize);
    channel.receive(&mut buf)?;
    String::from_utf8(buf.to_vec()).map_err(|_| ProtocolError::InvalidUtf8 { field })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{Packet, PacketTag, MAX_FIELD_BYTES};
    use crate::channel::memory::pair;
    use crate::channel::{Channel as _, ChannelError};
    use crate::protocol::ProtocolError;
    use bytes::{BufMut as _, BytesMut};
    use pretty_assertions::assert_eq;

    fn round_trip(packet: &Packet) -> Packet {
        let (mut tx, mut rx) = pair();
        tx.send(&packet.to_bytes()).unwrap();
        let decoded = Packet::read_from(&mut rx).unwrap();
        assert_eq!(rx.pending(), 0, "decode must consume the whole packet");
        decoded
    }

    #[test]
    fn get_round_trip() {
        let p = Packet::Get {
            name: "report.txt".to_string(),
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn send_round_trip() {
        let p = Packet::Send {
            name: "report.txt".to_string(),
            file_size: 2500,
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn error_round_trip() {
        let p = Packet::Error {
            message: "No such file: report.txt".to_string(),
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn empty_fields_round_trip() {
        let p = Packet::Get {
            name: String::new(),
        };
        assert_eq!(round_trip(&p), p);
        let p = Packet::Send {
            name: String::new(),
            file_size: 0,
        };
        assert_eq!(round_trip(&p), p);
    }

    #[test]
    fn wire_layout_is_as_documented() {
        let p = Packet::Send {
            name: "ab".to_string(),
            file_size: 7,
        };
        let wire = p.to_bytes();
        assert_eq!(wire.len(), 14);
        assert_eq!(&wire[0..4], &1u32.to_ne_bytes()[..]);
        assert_eq!(&wire[4..8], &2u32.to_ne_bytes()[..]);
        assert_eq!(&wire[8..10], &b"ab"[..]);
        assert_eq!(&wire[10..14], &7u32.to_ne_bytes()[..]);
    }

    #[test]
    fn tag_values_are_stable() {
        // These are wire constants; changing them is a protocol break.
        assert_eq!(PacketTag::Get as u32, 0);
        assert_eq!(PacketTag::Send as u32, 1);
        assert_eq!(PacketTag::Error as u32, 2);
        assert_eq!(PacketTag::from_wire(1), Some(PacketTag::Send));
        assert_eq!(PacketTag::from_wire(3), None);
    }

    #[test]
    fn oversized_length_is_rejected_before_allocation() {
        let (mut tx, mut rx) = pair();
        let mut wire = BytesMut::new();
        wire.put_u32_ne(PacketTag::Get as u32);
        wire.put_u32_ne(MAX_FIELD_BYTES + 1);
        tx.send(&wire).unwrap();
        let err = Packet::read_from(&mut rx).unwrap_err();
        assert!(
            matches!(err, ProtocolError::FieldTooLong { length, .. } if length == MAX_FIELD_BYTES + 1),
            "got {err:?}"
        );
    }

    #[test]
    fn truncated_packet_is_a_protocol_error() {
        let (mut tx, mut rx) = pair();
        let mut wire = BytesMut::new();
        wire.put_u32_ne(PacketTag::Get as u32);
        wire.put_u32_ne(5);
        wire.put_slice(b"abc"); // three of the declared five bytes
        tx.send(&wire).unwrap();
        let err = Packet::read_from(&mut rx).unwrap_err();
        assert!(
            matches!(err, ProtocolError::Truncated(ChannelError::EndOfStream)),
            "got {err:?}"
        );
    }

    #[test]
    fn unknown_tag_is_reported() {
        let (mut tx, mut rx) = pair();
        tx.send(&99u32.to_ne_bytes()).unwrap();
        let err = Packet::read_from(&mut rx).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { raw: 99 }), "got {err:?}");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let (mut tx, mut rx) = pair();
        let mut wire = BytesMut::new();
        wire.put_u32_ne(PacketTag::Error as u32);
        wire.put_u32_ne(2);
        wire.put_slice(&[0xff, 0xfe]);
        tx.send(&wire).unwrap();
        let err = Packet::read_from(&mut rx).unwrap_err();
        assert!(
            matches!(err, ProtocolError::InvalidUtf8 { field: "message" }),
            "got {err:?}"
        );
    }
}
