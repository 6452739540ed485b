//! Fixed 20-byte message header

use bytes::{Buf, BufMut};
use std::fmt;

use crate::errors::CodecError;
use crate::sequence::MessageSequence;
use crate::types::CommandId;

pub const HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Total frame length, header included
    pub length: u32,
    pub command: u32,
    pub sequence: MessageSequence,
}

impl MessageHeader {
    pub fn new(command: CommandId, length: u32, sequence: MessageSequence) -> Self {
        Self {
            length,
            command: command.as_u32(),
            sequence,
        }
    }

    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::from_u32(self.command)
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.length);
        buf.put_u32(self.command);
        self.sequence.encode(buf);
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::BufferTooShort {
                needed: HEADER_LEN,
                actual: data.len(),
            });
        }
        let mut buf = &data[..HEADER_LEN];
        Ok(Self {
            length: buf.get_u32(),
            command: buf.get_u32(),
            sequence: MessageSequence::decode(&mut buf),
        })
    }
}

impl fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.sequence.0;
        write!(
            f,
            "length:{:08X}, type:{:08X}, seq:{:08X} {:08X} {:08X}",
            self.length, self.command, a, b, c
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_layout() {
        let header = MessageHeader::new(
            CommandId::BindResp,
            29,
            MessageSequence::new(0x01020304, 0x05060708, 0x090A0B0C),
        );
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[
                0, 0, 0, 29, 0x80, 0, 0, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12
            ]
        );
    }

    #[test]
    fn test_header_extremes_round_trip() {
        for header in [
            MessageHeader::default(),
            MessageHeader {
                length: u32::MAX,
                command: u32::MAX,
                sequence: MessageSequence([u32::MAX; 3]),
            },
            MessageHeader {
                length: 0x8000_0000,
                command: 0x7FFF_FFFF,
                sequence: MessageSequence([1, 0x8000_0000, u32::MAX - 1]),
            },
        ] {
            let mut buf = BytesMut::new();
            header.encode(&mut buf);
            assert_eq!(MessageHeader::decode(&buf).unwrap(), header);
        }
    }

    #[test]
    fn test_short_header_rejected() {
        assert_eq!(
            MessageHeader::decode(&[0u8; 19]),
            Err(CodecError::BufferTooShort { needed: 20, actual: 19 })
        );
    }

    #[test]
    fn test_display() {
        let header = MessageHeader::new(CommandId::Unbind, 20, MessageSequence::new(1, 2, 3));
        assert_eq!(
            header.to_string(),
            "length:00000014, type:00000002, seq:00000001 00000002 00000003"
        );
    }
}
