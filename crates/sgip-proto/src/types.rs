//! Command and result code tables

use serde::{Deserialize, Serialize};

/// Bit set on every response command
pub const RESPONSE_MASK: u32 = 0x8000_0000;

/// SGIP command IDs
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandId {
    Bind = 0x00000001,
    BindResp = 0x80000001,
    Unbind = 0x00000002,
    UnbindResp = 0x80000002,
    Submit = 0x00000003,
    SubmitResp = 0x80000003,
    Deliver = 0x00000004,
    DeliverResp = 0x80000004,
    Report = 0x00000005,
    ReportResp = 0x80000005,
}

impl CommandId {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x00000001 => Some(Self::Bind),
            0x80000001 => Some(Self::BindResp),
            0x00000002 => Some(Self::Unbind),
            0x80000002 => Some(Self::UnbindResp),
            0x00000003 => Some(Self::Submit),
            0x80000003 => Some(Self::SubmitResp),
            0x00000004 => Some(Self::Deliver),
            0x80000004 => Some(Self::DeliverResp),
            0x00000005 => Some(Self::Report),
            0x80000005 => Some(Self::ReportResp),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_response(self) -> bool {
        self.as_u32() & RESPONSE_MASK != 0
    }

    /// Response command paired with a request; `None` for responses.
    pub fn response(self) -> Option<Self> {
        if self.is_response() {
            return None;
        }
        Self::from_u32(self.as_u32() | RESPONSE_MASK)
    }
}

/// Result byte carried in responses
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Ok = 0,
    LoginError = 1,
    LoginTypeError = 4,
    ParameterError = 5,
}

impl ResultCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::LoginError),
            4 => Some(Self::LoginTypeError),
            5 => Some(Self::ParameterError),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_pairing() {
        assert_eq!(CommandId::Bind.response(), Some(CommandId::BindResp));
        assert_eq!(CommandId::Submit.response(), Some(CommandId::SubmitResp));
        assert_eq!(CommandId::ReportResp.response(), None);
        assert_eq!(CommandId::DeliverResp.as_u32(), 0x80000004);
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(CommandId::from_u32(0x10), None);
        assert_eq!(CommandId::from_u32(0x80000000), None);
        assert_eq!(ResultCode::from_u8(2), None);
        assert_eq!(ResultCode::from_u8(5), Some(ResultCode::ParameterError));
    }
}
