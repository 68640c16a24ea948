//! Partner result classification.
//!
//! The declaration order is significant: a code's ordinal is the process exit
//! status reported by command-line front ends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Result code attached to every transfer outcome and partner answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InitOk,
    PreProcessingOk,
    TransferOk,
    PostProcessingOk,
    CompleteOk,
    ConnectionImpossible,
    ServerOverloaded,
    BadAuthent,
    ExternalOp,
    TransferError,
    DigestError,
    Disconnection,
    RemoteShutdown,
    FinalOp,
    Unimplemented,
    Shutdown,
    RemoteError,
    Internal,
    StoppedTransfer,
    CanceledTransfer,
    Warning,
    Unknown,
    QueryAlreadyFinished,
    QueryStillRunning,
    NotKnownHost,
    LoopSelfRequestedHost,
    QueryRemotelyUnknown,
    FileNotFound,
    CommandNotFound,
    PassThroughMode,
    Running,
    IncorrectCommand,
    FileNotAllowed,
    SizeNotAllowed,
}

impl ErrorCode {
    /// Every code, in ordinal order.
    pub const ALL: [ErrorCode; 34] = [
        Self::InitOk,
        Self::PreProcessingOk,
        Self::TransferOk,
        Self::PostProcessingOk,
        Self::CompleteOk,
        Self::ConnectionImpossible,
        Self::ServerOverloaded,
        Self::BadAuthent,
        Self::ExternalOp,
        Self::TransferError,
        Self::DigestError,
        Self::Disconnection,
        Self::RemoteShutdown,
        Self::FinalOp,
        Self::Unimplemented,
        Self::Shutdown,
        Self::RemoteError,
        Self::Internal,
        Self::StoppedTransfer,
        Self::CanceledTransfer,
        Self::Warning,
        Self::Unknown,
        Self::QueryAlreadyFinished,
        Self::QueryStillRunning,
        Self::NotKnownHost,
        Self::LoopSelfRequestedHost,
        Self::QueryRemotelyUnknown,
        Self::FileNotFound,
        Self::CommandNotFound,
        Self::PassThroughMode,
        Self::Running,
        Self::IncorrectCommand,
        Self::FileNotAllowed,
        Self::SizeNotAllowed,
    ];

    /// Position in declaration order, used as a process exit status.
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Single-character code used in compact partner answers.
    pub fn code_char(self) -> char {
        match self {
            Self::InitOk => 'i',
            Self::PreProcessingOk => 'B',
            Self::TransferOk => 'X',
            Self::PostProcessingOk => 'P',
            Self::CompleteOk => 'O',
            Self::ConnectionImpossible => 'C',
            Self::ServerOverloaded => 'l',
            Self::BadAuthent => 'A',
            Self::ExternalOp => 'E',
            Self::TransferError => 'T',
            Self::DigestError => 'M',
            Self::Disconnection => 'D',
            Self::RemoteShutdown => 'r',
            Self::FinalOp => 'F',
            Self::Unimplemented => 'U',
            Self::Shutdown => 'S',
            Self::RemoteError => 'R',
            Self::Internal => 'I',
            Self::StoppedTransfer => 'H',
            Self::CanceledTransfer => 'K',
            Self::Warning => 'W',
            Self::Unknown => '-',
            Self::QueryAlreadyFinished => 'Q',
            Self::QueryStillRunning => 's',
            Self::NotKnownHost => 'N',
            Self::LoopSelfRequestedHost => 'L',
            Self::QueryRemotelyUnknown => 'u',
            Self::FileNotFound => 'f',
            Self::CommandNotFound => 'c',
            Self::PassThroughMode => 'p',
            Self::Running => 'z',
            Self::IncorrectCommand => 'n',
            Self::FileNotAllowed => 'a',
            Self::SizeNotAllowed => 'd',
        }
    }

    /// Parses a single-character code.
    pub fn from_char(c: char) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|code| code.code_char() == c)
            .ok_or(ProtocolError::UnknownCode(c))
    }

    /// Human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Self::InitOk => "initialization step ok",
            Self::PreProcessingOk => "pre-processing step ok",
            Self::TransferOk => "transfer step ok",
            Self::PostProcessingOk => "post-processing step ok",
            Self::CompleteOk => "transfer complete",
            Self::ConnectionImpossible => "connection impossible",
            Self::ServerOverloaded => "server overloaded",
            Self::BadAuthent => "bad authentication",
            Self::ExternalOp => "external operation in error",
            Self::TransferError => "transfer in error",
            Self::DigestError => "digest verification failed",
            Self::Disconnection => "network disconnection",
            Self::RemoteShutdown => "remote shutdown",
            Self::FinalOp => "final action in error",
            Self::Unimplemented => "service not implemented",
            Self::Shutdown => "shutdown in progress",
            Self::RemoteError => "remote error",
            Self::Internal => "internal error",
            Self::StoppedTransfer => "transfer stopped",
            Self::CanceledTransfer => "transfer canceled",
            Self::Warning => "warning during transfer",
            Self::Unknown => "unknown status",
            Self::QueryAlreadyFinished => "request already finished",
            Self::QueryStillRunning => "request still running",
            Self::NotKnownHost => "unknown host",
            Self::LoopSelfRequestedHost => "host requested itself",
            Self::QueryRemotelyUnknown => "request unknown on partner",
            Self::FileNotFound => "file not found",
            Self::CommandNotFound => "command not found",
            Self::PassThroughMode => "through-mode transfer cannot be restarted",
            Self::Running => "transfer running",
            Self::IncorrectCommand => "incorrect command",
            Self::FileNotAllowed => "file not allowed",
            Self::SizeNotAllowed => "size not allowed",
        }
    }

    /// Whether this code only reports progress or completion.
    pub fn is_ok_step(self) -> bool {
        matches!(
            self,
            Self::InitOk
                | Self::PreProcessingOk
                | Self::TransferOk
                | Self::PostProcessingOk
                | Self::CompleteOk
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_declaration_order() {
        for (i, code) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(code.ordinal(), i as i32);
        }
        assert_eq!(ErrorCode::ConnectionImpossible.ordinal(), 5);
        assert_eq!(ErrorCode::Internal.ordinal(), 17);
        assert_eq!(ErrorCode::Unknown.ordinal(), 21);
    }

    #[test]
    fn code_chars_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code_char()), "duplicate char for {code:?}");
        }
    }

    #[test]
    fn from_char_resolves_known_codes() {
        assert_eq!(ErrorCode::from_char('O').unwrap(), ErrorCode::CompleteOk);
        assert_eq!(ErrorCode::from_char('p').unwrap(), ErrorCode::PassThroughMode);
        assert!(ErrorCode::from_char('#').is_err());
    }

    #[test]
    fn ok_steps() {
        assert!(ErrorCode::CompleteOk.is_ok_step());
        assert!(ErrorCode::InitOk.is_ok_step());
        assert!(!ErrorCode::Running.is_ok_step());
        assert!(!ErrorCode::Internal.is_ok_step());
    }
}
