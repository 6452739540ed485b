//! SGIP wire codec
//!
//! Every frame is `[length u32][command u32][sequence 12B][body]`, big-endian,
//! with fixed-width NUL-padded string fields.

mod fields;
mod frame;
mod header;
mod messages;

pub use fields::{get_fixed_str, put_fixed_str, Reserved};
pub use frame::{InboundKind, InboundMessage, Response};
pub use header::{MessageHeader, HEADER_LEN};
pub use messages::{
    Bind, BindResp, Deliver, DeliverResp, Report, ReportResp, ResultResp, Submit, SubmitRequest,
    SubmitResp, Unbind, UnbindResp,
};

use bytes::BytesMut;

use crate::errors::PartialDecode;
use crate::types::CommandId;

/// Bytes read before the command can be judged: length + command
pub const PREAMBLE_LEN: usize = 8;

/// Upper bound on any frame accepted from the peer
pub const MAX_FRAME_LEN: u32 = 2048;

/// Field widths
pub mod width {
    pub const LOGIN_NAME: usize = 16;
    pub const LOGIN_PASSWORD: usize = 16;
    pub const NUMBER: usize = 21;
    pub const CORP_ID: usize = 5;
    pub const SERVICE_TYPE: usize = 10;
    pub const FEE_VALUE: usize = 6;
    pub const TIME: usize = 16;
    pub const SUBMIT_SEQUENCE: usize = 12;
    pub const RESERVED: usize = 8;
}

/// Encoding capability shared by every message and response
pub trait Encode {
    /// Exact size of the encoded frame, header included
    fn encoded_len(&self) -> usize;

    fn encode_to(&self, buf: &mut BytesMut);

    fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }
}

/// Capabilities of a message the peer may send us
pub trait InboundPdu: Sized + Default {
    const COMMAND: CommandId;

    /// Whether `length` is acceptable for this command
    fn judge_length(length: u32) -> bool;

    /// Decode a complete frame. On structural failure the fields read so far
    /// are returned with the error.
    fn decode(frame: &[u8]) -> Result<Self, PartialDecode<Self>>;
}
