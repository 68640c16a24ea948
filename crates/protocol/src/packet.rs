//! Values handed to a transport session.
//!
//! The transport owns the byte encoding; these types only fix what the
//! orchestration layer asks it to send and what it expects back.

use serde::{Deserialize, Serialize};

use crate::codes::ErrorCode;
use crate::messages::{BusinessRequest, InformationQuery, TransferCommand};

/// One block of a through-mode stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBlock {
    pub rank: u32,
    pub data: Vec<u8>,
    /// Hex SHA-256 of `data`, present for hash-augmented modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Final block of the stream; `data` is empty.
    #[serde(default)]
    pub eof: bool,
}

impl DataBlock {
    /// The empty block marking the end of a stream.
    pub fn end_of_file(rank: u32) -> Self {
        Self {
            rank,
            data: Vec::new(),
            digest: None,
            eof: true,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Control command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Cancel,
    Stop,
    Restart,
}

/// Control command payload in the encoding the partner understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "body", rename_all = "camelCase")]
pub enum ControlBody {
    Json(String),
    Legacy(String),
}

impl ControlBody {
    /// Encodes `command` as JSON when `use_json` is set, legacy text otherwise.
    pub fn encode(command: &TransferCommand, use_json: bool) -> Result<Self, crate::ProtocolError> {
        if use_json {
            Ok(Self::Json(command.to_json()?))
        } else {
            Ok(Self::Legacy(command.to_legacy()))
        }
    }

    /// Decodes back into a command, whatever the encoding.
    pub fn decode(&self) -> Result<TransferCommand, crate::ProtocolError> {
        match self {
            Self::Json(json) => Ok(serde_json::from_str(json)?),
            Self::Legacy(text) => TransferCommand::from_legacy(text),
        }
    }
}

/// Packets the orchestration layer sends over a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Packet {
    Data(DataBlock),
    #[serde(rename_all = "camelCase")]
    EndTransfer { last_rank: u32 },
    EndRequest { code: ErrorCode },
    Error { code: ErrorCode, message: String },
    Control { kind: ControlKind, body: ControlBody },
    Information(InformationQuery),
    Business(BusinessRequest),
}

impl Packet {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::EndTransfer { .. } => "end-transfer",
            Self::EndRequest { .. } => "end-request",
            Self::Error { .. } => "error",
            Self::Control { .. } => "control",
            Self::Information(_) => "information",
            Self::Business(_) => "business",
        }
    }
}

/// Partner answer to a one-shot request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Answer {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            payload: None,
        }
    }

    pub fn with_payload(code: ErrorCode, payload: impl Into<String>) -> Self {
        Self {
            code,
            message: None,
            payload: Some(payload.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_body_follows_partner_encoding() {
        let cmd = TransferCommand::new("hostb", "hosta", 12);
        match ControlBody::encode(&cmd, false).unwrap() {
            ControlBody::Legacy(text) => assert_eq!(text, "hostb hosta 12"),
            other => panic!("expected legacy body, got {other:?}"),
        }
        let json = ControlBody::encode(&cmd, true).unwrap();
        assert!(matches!(json, ControlBody::Json(_)));
        assert_eq!(json.decode().unwrap(), cmd);
    }

    #[test]
    fn end_of_file_block_is_empty() {
        let block = DataBlock::end_of_file(9);
        assert!(block.eof);
        assert!(block.is_empty());
        assert_eq!(block.rank, 9);
    }

    #[test]
    fn packet_type_tag() {
        let packet = Packet::EndRequest {
            code: ErrorCode::CompleteOk,
        };
        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains("\"type\":\"endRequest\""));
        assert_eq!(packet.name(), "end-request");
    }
}
