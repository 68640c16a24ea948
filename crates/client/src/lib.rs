//! Client-side orchestration of Ferry transfers.
//!
//! A [`ClientRunner`] drives one transfer from record creation through
//! connection retries to completion or failure. [`SendThrough`] and
//! [`RecvThrough`] stream caller-owned bytes instead of files,
//! [`RemoteControl`] cancels, stops or restarts transfers on partners, and
//! [`FanOutDispatcher`] runs one request over many hosts and files.
//!
//! The transport is abstract: callers provide a [`SessionHandle`] together
//! with a record store, a rule resolver and a host directory, bundled in a
//! [`ClientContext`].

pub mod config;
pub mod control;
pub mod error;
pub mod fanout;
pub mod files;
pub mod information;
pub mod outcome;
pub mod runner;
pub mod session;
pub mod through;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{BackoffConfig, ClientConfig};
pub use control::RemoteControl;
pub use error::ClientError;
pub use fanout::{FanOutDispatcher, FanOutEvent, FanOutRequest};
pub use information::RequestInformation;
pub use outcome::{
    AggregateOutcome, EXIT_BAD_ARGUMENTS, EXIT_UNEXPECTED, ItemOutcome, RunOutcome, exit_code_for,
};
pub use runner::{ClientContext, ClientRunner};
pub use session::{
    Completion, ConnectAttempt, ConnectRequest, DetachedSessions, ErrorHook, RecvThroughHandler,
    Session, SessionFuture, SessionHandle, SharedRecvHandler, ThroughRole,
};
pub use through::{RecvThrough, SendThrough};
