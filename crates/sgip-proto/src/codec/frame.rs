//! Inbound dispatch by command code

use bytes::BytesMut;
use std::fmt;

use super::header::MessageHeader;
use super::messages::{Bind, BindResp, Deliver, DeliverResp, Report, ReportResp, UnbindResp, Unbind};
use super::{Encode, InboundPdu, MAX_FRAME_LEN};
use crate::errors::{CodecError, PartialDecode};
use crate::types::CommandId;

/// Commands the peer may open with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    Bind,
    Unbind,
    Deliver,
    Report,
}

impl InboundKind {
    /// Judge the first eight bytes of a frame. Unknown commands and lengths
    /// outside the command's rule are framing faults.
    pub fn judge(command: u32, length: u32) -> Result<Self, CodecError> {
        let kind = match CommandId::from_u32(command) {
            Some(CommandId::Bind) => Self::Bind,
            Some(CommandId::Unbind) => Self::Unbind,
            Some(CommandId::Deliver) => Self::Deliver,
            Some(CommandId::Report) => Self::Report,
            _ => return Err(CodecError::UnknownCommand(command)),
        };

        let accepted = length <= MAX_FRAME_LEN
            && match kind {
                Self::Bind => Bind::judge_length(length),
                Self::Unbind => Unbind::judge_length(length),
                Self::Deliver => Deliver::judge_length(length),
                Self::Report => Report::judge_length(length),
            };

        if accepted {
            Ok(kind)
        } else {
            Err(CodecError::InvalidLength { command, length })
        }
    }

    pub fn decode(self, frame: &[u8]) -> Result<InboundMessage, PartialDecode<InboundMessage>> {
        match self {
            Self::Bind => lift(Bind::decode(frame), InboundMessage::Bind),
            Self::Unbind => lift(Unbind::decode(frame), InboundMessage::Unbind),
            Self::Deliver => lift(Deliver::decode(frame), InboundMessage::Deliver),
            Self::Report => lift(Report::decode(frame), InboundMessage::Report),
        }
    }
}

fn lift<T>(
    decoded: Result<T, PartialDecode<T>>,
    wrap: fn(T) -> InboundMessage,
) -> Result<InboundMessage, PartialDecode<InboundMessage>> {
    decoded.map(wrap).map_err(|partial| partial.map(wrap))
}

/// A decoded request from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Bind(Bind),
    Unbind(Unbind),
    Deliver(Deliver),
    Report(Report),
}

impl InboundMessage {
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Bind(m) => &m.header,
            Self::Unbind(m) => &m.header,
            Self::Deliver(m) => &m.header,
            Self::Report(m) => &m.header,
        }
    }

    pub fn kind(&self) -> InboundKind {
        match self {
            Self::Bind(_) => InboundKind::Bind,
            Self::Unbind(_) => InboundKind::Unbind,
            Self::Deliver(_) => InboundKind::Deliver,
            Self::Report(_) => InboundKind::Report,
        }
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(m) => fmt::Display::fmt(m, f),
            Self::Unbind(m) => fmt::Display::fmt(m, f),
            Self::Deliver(m) => fmt::Display::fmt(m, f),
            Self::Report(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// Our answer to an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Bind(BindResp),
    Unbind(UnbindResp),
    Deliver(DeliverResp),
    Report(ReportResp),
}

impl Response {
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Bind(r) | Self::Deliver(r) | Self::Report(r) => &r.header,
            Self::Unbind(r) => &r.header,
        }
    }

    /// Result byte, absent for Unbind_Resp
    pub fn result(&self) -> Option<u8> {
        match self {
            Self::Bind(r) | Self::Deliver(r) | Self::Report(r) => Some(r.result),
            Self::Unbind(_) => None,
        }
    }
}

impl Encode for Response {
    fn encoded_len(&self) -> usize {
        match self {
            Self::Bind(r) | Self::Deliver(r) | Self::Report(r) => r.encoded_len(),
            Self::Unbind(r) => r.encoded_len(),
        }
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        match self {
            Self::Bind(r) | Self::Deliver(r) | Self::Report(r) => r.encode_to(buf),
            Self::Unbind(r) => r.encode_to(buf),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(r) | Self::Deliver(r) | Self::Report(r) => fmt::Display::fmt(r, f),
            Self::Unbind(r) => fmt::Display::fmt(r, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::MessageSequence;

    #[test]
    fn test_judge_accepts_valid_headers() {
        assert_eq!(InboundKind::judge(1, 61), Ok(InboundKind::Bind));
        assert_eq!(InboundKind::judge(2, 20), Ok(InboundKind::Unbind));
        assert_eq!(InboundKind::judge(4, 77), Ok(InboundKind::Deliver));
        assert_eq!(InboundKind::judge(4, 237), Ok(InboundKind::Deliver));
        assert_eq!(InboundKind::judge(5, 64), Ok(InboundKind::Report));
    }

    #[test]
    fn test_judge_rejects_bad_headers() {
        assert_eq!(InboundKind::judge(3, 200), Err(CodecError::UnknownCommand(3)));
        assert_eq!(
            InboundKind::judge(0x80000001, 29),
            Err(CodecError::UnknownCommand(0x80000001))
        );
        assert_eq!(
            InboundKind::judge(1, 64),
            Err(CodecError::InvalidLength { command: 1, length: 64 })
        );
        assert_eq!(
            InboundKind::judge(4, 76),
            Err(CodecError::InvalidLength { command: 4, length: 76 })
        );
        assert!(InboundKind::judge(4, MAX_FRAME_LEN + 1).is_err());
        assert!(InboundKind::judge(2, 21).unwrap_err().is_framing());
    }

    #[test]
    fn test_decode_dispatches_by_kind() {
        let bytes = Unbind::new(MessageSequence::new(1, 2, 3)).encode();
        let message = InboundKind::Unbind.decode(&bytes).unwrap();
        assert_eq!(message.kind(), InboundKind::Unbind);
        assert_eq!(message.header().sequence, MessageSequence::new(1, 2, 3));
    }

    #[test]
    fn test_response_result_byte() {
        let seq = MessageSequence::new(1, 2, 3);
        let resp = Response::Bind(BindResp::new(CommandId::BindResp, seq, 4));
        assert_eq!(resp.result(), Some(4));
        assert_eq!(resp.encode().len(), 29);
        assert_eq!(Response::Unbind(UnbindResp::new(seq)).result(), None);
    }
}
