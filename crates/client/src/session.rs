//! Transport-facing traits.
//!
//! The transport crate implements [`SessionHandle`] and [`Session`] on top of
//! its sockets and codecs. Keeping them as traits keeps orchestration logic
//! testable with in-memory sessions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ferry_protocol::{Answer, ErrorCode, Packet};
use ferry_transfer::{HostEntry, TransferRecord};

use crate::error::ClientError;

/// Boxed future returned by session traits.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Consumer of inbound bytes for a receive-through transfer. The transport
/// calls it once per data block.
pub trait RecvThroughHandler: Send {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), ClientError>;
}

/// Handler shared between the caller and the transport for one session.
pub type SharedRecvHandler = Arc<tokio::sync::Mutex<Box<dyn RecvThroughHandler>>>;

/// Whether a session streams caller-owned bytes, and in which direction.
#[derive(Clone, Default)]
pub enum ThroughRole {
    /// File-based transfer, or no transfer at all.
    #[default]
    None,
    Send,
    Recv(SharedRecvHandler),
}

impl std::fmt::Debug for ThroughRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Send => f.write_str("Send"),
            Self::Recv(_) => f.write_str("Recv"),
        }
    }
}

/// What to open a session for.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub host: HostEntry,
    /// The transfer to request once connected. `None` opens a session for
    /// one-shot control or information exchanges.
    pub record: Option<TransferRecord>,
    pub through: ThroughRole,
}

/// Result of one connection attempt.
pub enum ConnectAttempt {
    /// Authenticated, and the transfer request (if any) was accepted.
    Connected(Box<dyn Session>),
    /// Transient: the partner is not reachable yet.
    Pending(String),
    /// The partner refused the request because it is overloaded.
    Overloaded,
    /// Any other refusal or protocol failure.
    Fatal { code: ErrorCode, message: String },
}

/// Final report of the transport for a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub success: bool,
    pub code: ErrorCode,
    pub message: Option<String>,
    /// Last acknowledged block.
    pub rank: Option<u32>,
}

impl Completion {
    pub fn ok(rank: u32) -> Self {
        Self {
            success: true,
            code: ErrorCode::CompleteOk,
            message: None,
            rank: Some(rank),
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: Some(message.into()),
            rank: None,
        }
    }
}

/// An established session to a partner. Owned by exactly one operation.
pub trait Session: Send {
    fn send(&mut self, packet: Packet, flush: bool) -> SessionFuture<'_, Result<(), ClientError>>;

    /// Resolves once the channel accepts more data.
    fn writable(&mut self) -> SessionFuture<'_, Result<(), ClientError>>;

    fn await_completion(
        &mut self,
        timeout: Option<Duration>,
    ) -> SessionFuture<'_, Result<Completion, ClientError>>;

    /// Sends a packet and waits for the partner's answer.
    fn request(
        &mut self,
        packet: Packet,
        timeout: Duration,
    ) -> SessionFuture<'_, Result<Answer, ClientError>>;

    fn close(&mut self) -> SessionFuture<'_, ()>;
}

/// Opens sessions to partners.
pub trait SessionHandle: Send + Sync {
    fn connect(&self, request: ConnectRequest) -> SessionFuture<'_, ConnectAttempt>;
}

/// Action run once when a transfer ends in error.
pub trait ErrorHook: Send + Sync {
    fn on_error(&self, record: &TransferRecord);
}

/// Session handle for processes without a transport. Every connection
/// attempt fails; only submit-only work makes progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSessions;

impl SessionHandle for DetachedSessions {
    fn connect(&self, request: ConnectRequest) -> SessionFuture<'_, ConnectAttempt> {
        Box::pin(async move {
            ConnectAttempt::Fatal {
                code: ErrorCode::ConnectionImpossible,
                message: format!("no transport attached to reach {}", request.host.host_id),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_sessions_never_connect() {
        let request = ConnectRequest {
            host: HostEntry::server("hosta", "10.0.0.1:6666"),
            record: None,
            through: ThroughRole::None,
        };
        match DetachedSessions.connect(request).await {
            ConnectAttempt::Fatal { code, message } => {
                assert_eq!(code, ErrorCode::ConnectionImpossible);
                assert!(message.contains("hosta"));
            }
            _ => panic!("detached sessions must not connect"),
        }
    }

    #[test]
    fn completion_constructors() {
        assert!(Completion::ok(3).success);
        assert_eq!(Completion::ok(3).rank, Some(3));
        let failed = Completion::failed(ErrorCode::TransferError, "boom");
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("boom"));
    }
}
