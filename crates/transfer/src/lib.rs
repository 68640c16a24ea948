//! Transfer requests, persisted records and the lookups they depend on.
//!
//! Everything here is synchronous: records live in a local store and rule or
//! host resolution is a table lookup. Network work happens in `ferry-client`.

mod digest;
mod hosts;
mod record;
mod request;
mod rules;
mod store;

pub use digest::{calculate_file_checksum, checksum_bytes};
pub use hosts::{HostDirectory, HostEntry, StaticHosts};
pub use record::{RecordDraft, RecordKey, TransferRecord};
pub use request::{TransferRequest, TransferRequestBuilder};
pub use rules::{Rule, RuleResolver, StaticRules};
pub use store::{JsonFileStore, MemoryStore, RecordStore};

/// Default block size: 64 KiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 0x10000;

/// File information sent when the caller provides none.
pub const NO_INFO: &str = "noinfo";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown rule: {0}")]
    UnknownRule(String),

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("record not found: {0}")]
    RecordNotFound(RecordKey),

    #[error("record already exists: {0}")]
    DuplicateRecord(RecordKey),

    #[error("record is done and can no longer change: {0}")]
    RecordImmutable(RecordKey),

    #[error("rank went backwards for {key}: {current} -> {requested}")]
    RankRegression {
        key: RecordKey,
        current: u32,
        requested: u32,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
