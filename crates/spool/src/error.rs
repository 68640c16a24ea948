use std::path::PathBuf;

use ferry_transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid filter: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("another instance holds {0}")]
    AlreadyRunning(PathBuf),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}
