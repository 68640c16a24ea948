use std::fmt;

use chrono::{DateTime, Utc};
use ferry_protocol::{ErrorCode, TransferMode, TransferStatus};
use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Composite identity of a transfer record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub special_id: i64,
    pub requester: String,
    pub requested: String,
}

impl RecordKey {
    pub fn new(special_id: i64, requester: impl Into<String>, requested: impl Into<String>) -> Self {
        Self {
            special_id,
            requester: requester.into(),
            requested: requested.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.special_id, self.requester, self.requested)
    }
}

/// Persisted state of one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub key: RecordKey,
    pub rule: String,
    pub filename: String,
    pub mode: TransferMode,
    pub is_sender: bool,
    pub block_size: u32,
    /// Last block acknowledged by the partner.
    pub rank: u32,
    pub status: TransferStatus,
    pub error_code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub file_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_id: Option<String>,
    /// Size of the source file in bytes, `-1` when unknown.
    pub original_size: i64,
    pub start_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The record is transient and should not outlive its transfer.
    #[serde(default)]
    pub ignore_save: bool,
}

impl TransferRecord {
    pub fn special_id(&self) -> i64 {
        self.key.special_id
    }

    /// Completed successfully; the record can no longer change.
    pub fn is_all_done(&self) -> bool {
        self.status == TransferStatus::Done
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records a newly acknowledged rank. The rank never moves backwards
    /// while the transfer is running.
    pub fn advance_rank(&mut self, rank: u32) -> Result<(), TransferError> {
        if self.status == TransferStatus::Running && rank < self.rank {
            return Err(TransferError::RankRegression {
                key: self.key.clone(),
                current: self.rank,
                requested: rank,
            });
        }
        self.rank = rank;
        self.touch();
        Ok(())
    }

    pub fn set_running(&mut self) {
        self.status = TransferStatus::Running;
        self.error_code = ErrorCode::Running;
        self.error_message = None;
        self.touch();
    }

    pub fn set_done(&mut self) {
        self.status = TransferStatus::Done;
        self.error_code = ErrorCode::CompleteOk;
        self.error_message = None;
        self.touch();
    }

    pub fn set_in_error(&mut self, code: ErrorCode, message: Option<String>) {
        self.status = TransferStatus::InError;
        self.error_code = code;
        self.error_message = message;
        self.touch();
    }

    pub fn set_interrupted(&mut self, code: ErrorCode) {
        self.status = TransferStatus::Interrupted;
        self.error_code = code;
        self.touch();
    }

    pub fn set_to_submit(&mut self) {
        self.status = TransferStatus::ToSubmit;
        self.error_code = ErrorCode::InitOk;
        self.error_message = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Everything a store needs to create a record except its special id.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub requester: String,
    pub requested: String,
    pub rule: String,
    pub filename: String,
    pub mode: TransferMode,
    pub is_sender: bool,
    pub block_size: u32,
    pub file_info: String,
    pub follow_id: Option<String>,
    pub original_size: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub status: TransferStatus,
}

impl RecordDraft {
    pub(crate) fn into_record(self, special_id: i64) -> TransferRecord {
        let now = Utc::now();
        let error_code = match self.status {
            TransferStatus::Running => ErrorCode::Running,
            _ => ErrorCode::InitOk,
        };
        TransferRecord {
            key: RecordKey::new(special_id, self.requester, self.requested),
            rule: self.rule,
            filename: self.filename,
            mode: self.mode,
            is_sender: self.is_sender,
            block_size: self.block_size,
            rank: 0,
            status: self.status,
            error_code,
            error_message: None,
            file_info: self.file_info,
            follow_id: self.follow_id,
            original_size: self.original_size,
            start_time: self.start_time.unwrap_or(now),
            updated_at: now,
            ignore_save: false,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_draft(filename: &str) -> RecordDraft {
    RecordDraft {
        requester: "local".into(),
        requested: "hosta".into(),
        rule: "out".into(),
        filename: filename.into(),
        mode: TransferMode::Send,
        is_sender: true,
        block_size: crate::DEFAULT_BLOCK_SIZE,
        file_info: crate::NO_INFO.into(),
        follow_id: None,
        original_size: -1,
        start_time: None,
        status: TransferStatus::ToSubmit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_becomes_record() {
        let record = sample_draft("a.txt").into_record(5);
        assert_eq!(record.special_id(), 5);
        assert_eq!(record.key.requester, "local");
        assert_eq!(record.status, TransferStatus::ToSubmit);
        assert_eq!(record.error_code, ErrorCode::InitOk);
        assert_eq!(record.rank, 0);
    }

    #[test]
    fn rank_is_monotonic_while_running() {
        let mut record = sample_draft("a.txt").into_record(1);
        record.set_running();
        record.advance_rank(4).unwrap();
        record.advance_rank(4).unwrap();
        let err = record.advance_rank(2).unwrap_err();
        assert!(matches!(err, TransferError::RankRegression { current: 4, requested: 2, .. }));
        assert_eq!(record.rank, 4);
    }

    #[test]
    fn rank_may_be_reset_outside_running() {
        let mut record = sample_draft("a.txt").into_record(1);
        record.set_running();
        record.advance_rank(8).unwrap();
        record.set_in_error(ErrorCode::TransferError, None);
        record.advance_rank(0).unwrap();
        assert_eq!(record.rank, 0);
    }

    #[test]
    fn status_transitions() {
        let mut record = sample_draft("a.txt").into_record(1);
        assert!(!record.is_terminal());
        record.set_in_error(ErrorCode::ServerOverloaded, Some("busy".into()));
        assert!(record.is_terminal());
        assert!(!record.is_all_done());
        record.set_done();
        assert!(record.is_all_done());
        assert_eq!(record.error_code, ErrorCode::CompleteOk);
        assert!(record.error_message.is_none());
    }

    #[test]
    fn key_display() {
        let key = RecordKey::new(3, "a", "b");
        assert_eq!(key.to_string(), "3 (a -> b)");
    }
}
