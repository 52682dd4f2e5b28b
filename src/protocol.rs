use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Packet too short: {0} bytes")]
    PacketTooShort(usize),
}

/// Payload size of a single radio frame, in bytes.
pub const FRAME_SIZE: usize = 32;

/// Message types the monitor cares about. Anything else is carried through as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ping,
    Other(u8),
}

impl MessageType {
    pub const PING: u8 = 130;
}

impl From<u8> for MessageType {
    fn from(v: u8) -> Self {
        match v {
            Self::PING => MessageType::Ping,
            other => MessageType::Other(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Ping => MessageType::PING,
            MessageType::Other(v) => v,
        }
    }
}

/// Header carried in front of every network frame.
///
/// Layout (little-endian):
/// - from_node: u16 (2 bytes)
/// - to_node: u16 (2 bytes)
/// - id: u16 (2 bytes)
/// - msg_type: u8 (1 byte)
/// - reserved: u8 (1 byte)
/// Total: 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkHeader {
    pub from_node: u16,
    pub to_node: u16,
    pub id: u16,
    pub msg_type: MessageType,
}

impl NetworkHeader {
    pub const SIZE: usize = 8;

    pub fn ping(from_node: u16, to_node: u16, id: u16) -> Self {
        Self {
            from_node,
            to_node,
            id,
            msg_type: MessageType::Ping,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.from_node);
        buf.put_u16_le(self.to_node);
        buf.put_u16_le(self.id);
        buf.put_u8(self.msg_type.into());
        buf.put_u8(0);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        if buf.remaining() < Self::SIZE {
            return Err(ProtocolError::PacketTooShort(buf.remaining()));
        }
        let from_node = buf.get_u16_le();
        let to_node = buf.get_u16_le();
        let id = buf.get_u16_le();
        let msg_type = MessageType::from(buf.get_u8());
        let _reserved = buf.get_u8();

        Ok(Self {
            from_node,
            to_node,
            id,
            msg_type,
        })
    }
}

/// One received frame: decoded header plus whatever payload followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: NetworkHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(NetworkHeader::SIZE + self.payload.len());
        self.header.encode(&mut buf);
        buf.put(self.payload.clone());
        buf.freeze()
    }

    /// Parses a raw frame. The payload is everything after the header.
    pub fn decode(mut packet: Bytes) -> Result<Self, ProtocolError> {
        let header = NetworkHeader::decode(&mut packet)?;
        Ok(Self {
            header,
            payload: packet,
        })
    }
}

/// Formats a mesh address the way the network numbers them: octal with a leading zero.
pub fn octal(address: u16) -> String {
    format!("0{:o}", address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = NetworkHeader {
            from_node: 0o11,
            to_node: 0,
            id: 0x0102,
            msg_type: MessageType::Other(65),
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        assert_eq!(buf.len(), NetworkHeader::SIZE);
        assert_eq!(&buf[..], &[9, 0, 0, 0, 0x02, 0x01, 65, 0]);
    }

    #[test]
    fn test_frame_decode_splits_payload() {
        let frame = Frame {
            header: NetworkHeader {
                from_node: 0o5,
                to_node: 0,
                id: 7,
                msg_type: MessageType::Other(1),
            },
            payload: Bytes::from(vec![0xAA; FRAME_SIZE - NetworkHeader::SIZE]),
        };

        let decoded = Frame::decode(frame.encode()).expect("Failed to decode");
        assert_eq!(decoded, frame);
        assert_eq!(decoded.payload.len(), 24);
    }

    #[test]
    fn test_decode_short_packet() {
        let err = Frame::decode(Bytes::from_static(&[1, 2, 3])).unwrap_err();
        assert_eq!(err, ProtocolError::PacketTooShort(3));
    }

    #[test]
    fn test_ping_type_mapping() {
        let header = NetworkHeader::ping(0, 0o21, 3);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf[6], 130);
        assert_eq!(MessageType::from(130), MessageType::Ping);
        assert_eq!(u8::from(MessageType::Other(12)), 12);
    }

    #[test]
    fn test_octal_formatting() {
        assert_eq!(octal(0), "00");
        assert_eq!(octal(1), "01");
        assert_eq!(octal(0o21), "021");
        assert_eq!(octal(0o555), "0555");
    }
}
