//! # SGIP protocol
//!
//! Wire-level building blocks for the SGIP 1.2 short message gateway protocol:
//!
//! - **Codec** - fixed-layout header and bodies for every command and response
//! - **Sequence** - the 96-bit message sequence stamped on every outgoing frame
//! - **Config** - peer, identity and worker settings shared by both roles
//!
//! ## Example
//! ```rust,ignore
//! use sgip_proto::{SequenceGenerator, codec::{Bind, Encode}};
//!
//! let sequences = SequenceGenerator::new(20, 12345);
//! let bind = Bind::new(sequences.next(), login_type::SP_TO_SMG, "user", "secret");
//! stream.write_all(&bind.encode()).await?;
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod sequence;
pub mod types;

// Re-exports
pub use config::SgipConfig;
pub use errors::{CodecError, Result, SgipError};
pub use sequence::{MessageSequence, SequenceGenerator};
pub use types::{CommandId, ResultCode};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default SGIP port
pub const DEFAULT_SGIP_PORT: u16 = 8801;

/// Login types carried in Bind
pub mod login_type {
    /// SP connecting to the SMG (our outbound sessions)
    pub const SP_TO_SMG: u8 = 1;
    /// SMG connecting to the SP (the only type accepted inbound)
    pub const SMG_TO_SP: u8 = 2;
}
