//! SGIP message bodies

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

use super::fields::{get_fixed_str, put_fixed_bytes, put_fixed_str, Reserved};
use super::header::{MessageHeader, HEADER_LEN};
use super::{width, Encode, InboundPdu};
use crate::errors::{CodecError, PartialDecode, SgipError};
use crate::sequence::MessageSequence;
use crate::types::CommandId;

const BIND_LEN: usize = HEADER_LEN + 1 + width::LOGIN_NAME + width::LOGIN_PASSWORD + width::RESERVED;
const RESULT_RESP_LEN: usize = HEADER_LEN + 1 + width::RESERVED;
const UNBIND_LEN: usize = HEADER_LEN;
/// Deliver up to and including the content length field
const DELIVER_FIXED_LEN: usize = HEADER_LEN + 2 * width::NUMBER + 3 + 4;
const DELIVER_MIN_LEN: usize = DELIVER_FIXED_LEN + width::RESERVED;
const REPORT_LEN: usize =
    HEADER_LEN + width::SUBMIT_SEQUENCE + 1 + width::NUMBER + 1 + 1 + width::RESERVED;
/// Submit without recipients and content
const SUBMIT_BASE_LEN: usize = HEADER_LEN
    + 2 * width::NUMBER
    + 1
    + width::CORP_ID
    + width::SERVICE_TYPE
    + 1
    + 2 * width::FEE_VALUE
    + 3
    + 2 * width::TIME
    + 5
    + 4
    + width::RESERVED;

/// Recipients are counted in a single byte
pub const MAX_RECIPIENTS: usize = u8::MAX as usize;

fn check_frame<T: Default>(frame: &[u8], needed: usize) -> Result<MessageHeader, PartialDecode<T>> {
    if frame.len() < needed {
        return Err(PartialDecode::new(
            T::default(),
            CodecError::BufferTooShort {
                needed,
                actual: frame.len(),
            },
        ));
    }
    MessageHeader::decode(frame).map_err(|e| PartialDecode::new(T::default(), e))
}

fn put_header(buf: &mut BytesMut, header: &MessageHeader, length: usize) {
    MessageHeader {
        length: length as u32,
        ..*header
    }
    .encode(buf);
}

// ---------------------------------------------------------------------------
// Bind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bind {
    pub header: MessageHeader,
    pub login_type: u8,
    pub login_name: String,
    pub login_password: String,
    pub reserved: Reserved,
}

impl Bind {
    pub fn new(sequence: MessageSequence, login_type: u8, login_name: &str, login_password: &str) -> Self {
        Self {
            header: MessageHeader::new(CommandId::Bind, BIND_LEN as u32, sequence),
            login_type,
            login_name: login_name.to_string(),
            login_password: login_password.to_string(),
            reserved: Reserved::default(),
        }
    }
}

impl InboundPdu for Bind {
    const COMMAND: CommandId = CommandId::Bind;

    fn judge_length(length: u32) -> bool {
        length as usize == BIND_LEN
    }

    fn decode(frame: &[u8]) -> Result<Self, PartialDecode<Self>> {
        let header = check_frame(frame, BIND_LEN)?;
        let mut buf = &frame[HEADER_LEN..];
        Ok(Self {
            header,
            login_type: buf.get_u8(),
            login_name: get_fixed_str(&mut buf, width::LOGIN_NAME),
            login_password: get_fixed_str(&mut buf, width::LOGIN_PASSWORD),
            reserved: Reserved::decode(&mut buf),
        })
    }
}

impl Encode for Bind {
    fn encoded_len(&self) -> usize {
        BIND_LEN
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, BIND_LEN);
        buf.put_u8(self.login_type);
        put_fixed_str(buf, &self.login_name, width::LOGIN_NAME);
        put_fixed_str(buf, &self.login_password, width::LOGIN_PASSWORD);
        Reserved::encode_zeroed(buf);
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bind: {};Login Type:{:02X};Login Name:{};Login Password:{};{}",
            self.header,
            self.login_type,
            self.login_name,
            "*".repeat(self.login_password.len()),
            self.reserved
        )
    }
}

// ---------------------------------------------------------------------------
// Result responses (Bind_Resp, Submit_Resp, Deliver_Resp, Report_Resp)
// ---------------------------------------------------------------------------

/// Header + result byte + reserved; the layout of every acknowledging response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultResp {
    pub header: MessageHeader,
    pub result: u8,
    pub reserved: Reserved,
}

pub type BindResp = ResultResp;
pub type SubmitResp = ResultResp;
pub type DeliverResp = ResultResp;
pub type ReportResp = ResultResp;

impl ResultResp {
    pub const LEN: usize = RESULT_RESP_LEN;

    pub fn new(command: CommandId, sequence: MessageSequence, result: u8) -> Self {
        Self {
            header: MessageHeader::new(command, RESULT_RESP_LEN as u32, sequence),
            result,
            reserved: Reserved::default(),
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let header = check_frame::<Self>(frame, RESULT_RESP_LEN).map_err(|p| p.error)?;
        let mut buf = &frame[HEADER_LEN..];
        Ok(Self {
            header,
            result: buf.get_u8(),
            reserved: Reserved::decode(&mut buf),
        })
    }

    /// Validate the answer to an outbound Bind or Submit: exactly one
    /// 29-byte frame with the expected response command and a zero result.
    pub fn expect_ack(frame: &[u8], expected: CommandId) -> Result<Self, SgipError> {
        if frame.len() != RESULT_RESP_LEN {
            return Err(SgipError::UnexpectedResponse(format!(
                "expected {} bytes, got {}",
                RESULT_RESP_LEN,
                frame.len()
            )));
        }
        let resp = Self::decode(frame)?;
        if resp.header.command != expected.as_u32() {
            return Err(SgipError::UnexpectedResponse(format!(
                "expected command 0x{:08X}, got 0x{:08X}",
                expected.as_u32(),
                resp.header.command
            )));
        }
        if resp.result != 0 {
            return Err(SgipError::Rejected(resp.result));
        }
        Ok(resp)
    }
}

impl Encode for ResultResp {
    fn encoded_len(&self) -> usize {
        RESULT_RESP_LEN
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, RESULT_RESP_LEN);
        buf.put_u8(self.result);
        Reserved::encode_zeroed(buf);
    }
}

impl fmt::Display for ResultResp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.header.command_id() {
            Some(CommandId::BindResp) => "Bind_Resp",
            Some(CommandId::SubmitResp) => "Submit_Resp",
            Some(CommandId::DeliverResp) => "Deliver_Resp",
            Some(CommandId::ReportResp) => "Report_Resp",
            _ => "Resp",
        };
        write!(f, "{}: {};result:{:02X};{}", name, self.header, self.result, self.reserved)
    }
}

// ---------------------------------------------------------------------------
// Unbind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unbind {
    pub header: MessageHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnbindResp {
    pub header: MessageHeader,
}

impl Unbind {
    pub fn new(sequence: MessageSequence) -> Self {
        Self {
            header: MessageHeader::new(CommandId::Unbind, UNBIND_LEN as u32, sequence),
        }
    }
}

impl UnbindResp {
    pub fn new(sequence: MessageSequence) -> Self {
        Self {
            header: MessageHeader::new(CommandId::UnbindResp, UNBIND_LEN as u32, sequence),
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            header: MessageHeader::decode(frame)?,
        })
    }
}

impl InboundPdu for Unbind {
    const COMMAND: CommandId = CommandId::Unbind;

    fn judge_length(length: u32) -> bool {
        length as usize == UNBIND_LEN
    }

    fn decode(frame: &[u8]) -> Result<Self, PartialDecode<Self>> {
        Ok(Self {
            header: check_frame(frame, UNBIND_LEN)?,
        })
    }
}

impl Encode for Unbind {
    fn encoded_len(&self) -> usize {
        UNBIND_LEN
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, UNBIND_LEN);
    }
}

impl Encode for UnbindResp {
    fn encoded_len(&self) -> usize {
        UNBIND_LEN
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, UNBIND_LEN);
    }
}

impl fmt::Display for Unbind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unbind: {}", self.header)
    }
}

impl fmt::Display for UnbindResp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unbind_Resp: {}", self.header)
    }
}

// ---------------------------------------------------------------------------
// Deliver
// ---------------------------------------------------------------------------

/// Mobile-originated message forwarded by the SMG
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deliver {
    pub header: MessageHeader,
    pub user_number: String,
    pub sp_number: String,
    pub tppid: u8,
    pub tpudhi: u8,
    pub msg_coding: u8,
    pub msg_length: u32,
    pub msg_content: Vec<u8>,
    pub reserved: Reserved,
}

impl Deliver {
    pub fn new(
        sequence: MessageSequence,
        user_number: &str,
        sp_number: &str,
        tppid: u8,
        tpudhi: u8,
        msg_coding: u8,
        msg_content: Vec<u8>,
    ) -> Self {
        let length = DELIVER_MIN_LEN + msg_content.len();
        Self {
            header: MessageHeader::new(CommandId::Deliver, length as u32, sequence),
            user_number: user_number.to_string(),
            sp_number: sp_number.to_string(),
            tppid,
            tpudhi,
            msg_coding,
            msg_length: msg_content.len() as u32,
            msg_content,
            reserved: Reserved::default(),
        }
    }
}

impl InboundPdu for Deliver {
    const COMMAND: CommandId = CommandId::Deliver;

    fn judge_length(length: u32) -> bool {
        length as usize >= DELIVER_MIN_LEN
    }

    fn decode(frame: &[u8]) -> Result<Self, PartialDecode<Self>> {
        let header = check_frame(frame, DELIVER_MIN_LEN)?;
        let mut buf = &frame[HEADER_LEN..];
        let mut deliver = Self {
            header,
            user_number: get_fixed_str(&mut buf, width::NUMBER),
            sp_number: get_fixed_str(&mut buf, width::NUMBER),
            tppid: buf.get_u8(),
            tpudhi: buf.get_u8(),
            msg_coding: buf.get_u8(),
            msg_length: buf.get_u32(),
            ..Default::default()
        };

        let expected = DELIVER_MIN_LEN as u64 + u64::from(deliver.msg_length);
        if expected != frame.len() as u64 {
            let error = CodecError::ContentLengthMismatch {
                declared: deliver.msg_length,
                frame: frame.len(),
            };
            return Err(PartialDecode::new(deliver, error));
        }

        deliver.msg_content = buf.copy_to_bytes(deliver.msg_length as usize).to_vec();
        deliver.reserved = Reserved::decode(&mut buf);
        Ok(deliver)
    }
}

impl Encode for Deliver {
    fn encoded_len(&self) -> usize {
        DELIVER_MIN_LEN + self.msg_content.len()
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, self.encoded_len());
        put_fixed_str(buf, &self.user_number, width::NUMBER);
        put_fixed_str(buf, &self.sp_number, width::NUMBER);
        buf.put_u8(self.tppid);
        buf.put_u8(self.tpudhi);
        buf.put_u8(self.msg_coding);
        buf.put_u32(self.msg_content.len() as u32);
        buf.put_slice(&self.msg_content);
        Reserved::encode_zeroed(buf);
    }
}

impl fmt::Display for Deliver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deliver: {};UserNumber:{};spNumber:{};tppid:{:02X};tpudhi:{:02X};Message Coding:{:02X};Message Length:{};Message Content:{};{}",
            self.header,
            self.user_number,
            self.sp_number,
            self.tppid,
            self.tpudhi,
            self.msg_coding,
            self.msg_length,
            hex::encode_upper(&self.msg_content),
            self.reserved
        )
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Delivery status for an earlier Submit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    pub header: MessageHeader,
    pub submit_sequence: [u8; width::SUBMIT_SEQUENCE],
    pub report_type: u8,
    pub user_number: String,
    pub state: u8,
    pub error_code: u8,
    pub reserved: Reserved,
}

impl Report {
    pub fn new(
        sequence: MessageSequence,
        submit_sequence: MessageSequence,
        report_type: u8,
        user_number: &str,
        state: u8,
        error_code: u8,
    ) -> Self {
        Self {
            header: MessageHeader::new(CommandId::Report, REPORT_LEN as u32, sequence),
            submit_sequence: submit_sequence.to_bytes(),
            report_type,
            user_number: user_number.to_string(),
            state,
            error_code,
            reserved: Reserved::default(),
        }
    }

    /// The Submit this report refers to
    pub fn submit_sequence(&self) -> MessageSequence {
        MessageSequence::decode(&mut &self.submit_sequence[..])
    }
}

impl InboundPdu for Report {
    const COMMAND: CommandId = CommandId::Report;

    fn judge_length(length: u32) -> bool {
        length as usize == REPORT_LEN
    }

    fn decode(frame: &[u8]) -> Result<Self, PartialDecode<Self>> {
        let header = check_frame(frame, REPORT_LEN)?;
        let mut buf = &frame[HEADER_LEN..];
        let mut submit_sequence = [0u8; width::SUBMIT_SEQUENCE];
        buf.copy_to_slice(&mut submit_sequence);
        Ok(Self {
            header,
            submit_sequence,
            report_type: buf.get_u8(),
            user_number: get_fixed_str(&mut buf, width::NUMBER),
            state: buf.get_u8(),
            error_code: buf.get_u8(),
            reserved: Reserved::decode(&mut buf),
        })
    }
}

impl Encode for Report {
    fn encoded_len(&self) -> usize {
        REPORT_LEN
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        put_header(buf, &self.header, REPORT_LEN);
        buf.put_slice(&self.submit_sequence);
        buf.put_u8(self.report_type);
        put_fixed_str(buf, &self.user_number, width::NUMBER);
        buf.put_u8(self.state);
        buf.put_u8(self.error_code);
        Reserved::encode_zeroed(buf);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report: {};Submit Sequence:{};Report Type:{:02X};User Number:{};State:{:02X};Error Code:{:02X};{}",
            self.header,
            hex::encode_upper(self.submit_sequence),
            self.report_type,
            self.user_number,
            self.state,
            self.error_code,
            self.reserved
        )
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Typed submission fields, already validated by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitRequest {
    pub sp_number: String,
    pub charge_number: String,
    pub user_numbers: Vec<String>,
    pub corp_id: String,
    pub service_type: String,
    pub fee_type: u8,
    pub fee_value: String,
    pub given_value: String,
    pub agent_flag: u8,
    pub mt_flag: u8,
    pub priority: u8,
    pub expire_time: String,
    pub schedule_time: String,
    pub report_flag: u8,
    pub tppid: u8,
    pub tpudhi: u8,
    pub msg_coding: u8,
    pub msg_content: Vec<u8>,
    pub reserve: [u8; width::RESERVED],
}

impl SubmitRequest {
    /// Recipients that fit in the one-byte user count
    pub fn recipients(&self) -> &[String] {
        let n = self.user_numbers.len().min(MAX_RECIPIENTS);
        &self.user_numbers[..n]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub header: MessageHeader,
    pub request: SubmitRequest,
}

impl Submit {
    pub fn new(sequence: MessageSequence, request: SubmitRequest) -> Self {
        let length = Self::length_for(&request);
        Self {
            header: MessageHeader::new(CommandId::Submit, length as u32, sequence),
            request,
        }
    }

    fn length_for(request: &SubmitRequest) -> usize {
        SUBMIT_BASE_LEN + width::NUMBER * request.recipients().len() + request.msg_content.len()
    }

    pub fn sequence(&self) -> MessageSequence {
        self.header.sequence
    }
}

impl Encode for Submit {
    fn encoded_len(&self) -> usize {
        Self::length_for(&self.request)
    }

    fn encode_to(&self, buf: &mut BytesMut) {
        let r = &self.request;
        let recipients = r.recipients();

        put_header(buf, &self.header, self.encoded_len());
        put_fixed_str(buf, &r.sp_number, width::NUMBER);
        put_fixed_str(buf, &r.charge_number, width::NUMBER);
        buf.put_u8(recipients.len() as u8);
        for number in recipients {
            put_fixed_str(buf, number, width::NUMBER);
        }
        put_fixed_str(buf, &r.corp_id, width::CORP_ID);
        put_fixed_str(buf, &r.service_type, width::SERVICE_TYPE);
        buf.put_u8(r.fee_type);
        put_fixed_str(buf, &r.fee_value, width::FEE_VALUE);
        put_fixed_str(buf, &r.given_value, width::FEE_VALUE);
        buf.put_u8(r.agent_flag);
        buf.put_u8(r.mt_flag);
        buf.put_u8(r.priority);
        put_fixed_str(buf, &r.expire_time, width::TIME);
        put_fixed_str(buf, &r.schedule_time, width::TIME);
        buf.put_u8(r.report_flag);
        buf.put_u8(r.tppid);
        buf.put_u8(r.tpudhi);
        buf.put_u8(r.msg_coding);
        buf.put_u8(0); // message type
        buf.put_u32(r.msg_content.len() as u32);
        buf.put_slice(&r.msg_content);
        put_fixed_bytes(buf, &r.reserve, width::RESERVED);
    }
}

impl fmt::Display for Submit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.request;
        write!(
            f,
            "Submit: {};spNumber:{};chargeNumber:{};userCount:{};userNumber:{};corpId:{};serviceType:{};Message Coding:{:02X};Message Length:{}",
            self.header,
            r.sp_number,
            r.charge_number,
            r.recipients().len(),
            r.recipients().join(","),
            r.corp_id,
            r.service_type,
            r.msg_coding,
            r.msg_content.len()
        )
    }
}
