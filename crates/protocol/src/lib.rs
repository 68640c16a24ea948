//! Protocol-level vocabulary shared by every Ferry crate.
//!
//! This crate does not encode bytes on the wire: it defines the values the
//! orchestration layer hands to (and receives from) a transport session.

pub mod codes;
pub mod messages;
pub mod packet;
pub mod types;

pub use codes::ErrorCode;
pub use messages::{BusinessRequest, InformationQuery, TransferCommand};
pub use packet::{Answer, ControlBody, ControlKind, DataBlock, Packet};
pub use types::{HostRole, TransferMode, TransferStatus};

/// Errors produced while decoding protocol payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unknown result code: {0}")]
    UnknownCode(char),
}
