//! Client error types.

use std::time::Duration;

use ferry_protocol::{ErrorCode, ProtocolError};
use ferry_transfer::TransferError;

/// Errors produced while talking to a partner.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("cannot connect: {message}")]
    Connect { code: ErrorCode, message: String },

    #[error("partner answered {code}: {message}")]
    Remote { code: ErrorCode, message: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("session closed")]
    Closed,

    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("invalid file pattern: {0}")]
    InvalidPattern(String),
}

impl ClientError {
    /// Result code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Connect { code, .. } | Self::Remote { code, .. } => *code,
            Self::Transfer(TransferError::UnknownHost(_)) => ErrorCode::NotKnownHost,
            Self::Transfer(TransferError::RecordNotFound(_)) => ErrorCode::QueryRemotelyUnknown,
            Self::Timeout(_) | Self::Closed => ErrorCode::Disconnection,
            Self::Io(_) | Self::NotConnected(_) => ErrorCode::TransferError,
            Self::Json(_)
            | Self::Protocol(_)
            | Self::Transfer(_)
            | Self::InvalidPattern(_) => ErrorCode::Internal,
        }
    }
}

impl From<globset::Error> for ClientError {
    fn from(err: globset::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_for_errors() {
        let err = ClientError::Connect {
            code: ErrorCode::BadAuthent,
            message: "denied".into(),
        };
        assert_eq!(err.code(), ErrorCode::BadAuthent);
        assert_eq!(
            ClientError::Timeout(Duration::from_secs(1)).code(),
            ErrorCode::Disconnection
        );
        assert_eq!(
            ClientError::Transfer(TransferError::UnknownRule("x".into())).code(),
            ErrorCode::Internal
        );
        assert_eq!(
            ClientError::Transfer(TransferError::UnknownHost("x".into())).code(),
            ErrorCode::NotKnownHost
        );
    }
}
