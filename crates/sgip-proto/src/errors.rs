//! Error types for the SGIP stack

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SgipError>;

/// Top-level SGIP error
#[derive(Debug, Error)]
pub enum SgipError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Rejected by peer with result {0}")]
    Rejected(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Framing and body errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unknown command: 0x{0:08X}")]
    UnknownCommand(u32),

    #[error("Invalid length {length} for command 0x{command:08X}")]
    InvalidLength { command: u32, length: u32 },

    #[error("Buffer too short: need {needed}, have {actual}")]
    BufferTooShort { needed: usize, actual: usize },

    #[error("Content length {declared} does not fit frame of {frame} bytes")]
    ContentLengthMismatch { declared: u32, frame: usize },
}

impl CodecError {
    /// Header faults end the connection; body faults do not.
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::UnknownCommand(_) | Self::InvalidLength { .. })
    }
}

/// A body that failed structural decoding, with whatever fields were read
/// before the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecode<T> {
    pub partial: T,
    pub error: CodecError,
}

impl<T> PartialDecode<T> {
    pub fn new(partial: T, error: CodecError) -> Self {
        Self { partial, error }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PartialDecode<U> {
        PartialDecode {
            partial: f(self.partial),
            error: self.error,
        }
    }
}
