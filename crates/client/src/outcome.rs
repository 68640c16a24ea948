//! Results of dispatch operations and their exit-status mapping.

use std::time::{Duration, Instant};

use ferry_protocol::ErrorCode;
use ferry_transfer::TransferRecord;

/// Exit status for malformed arguments.
pub const EXIT_BAD_ARGUMENTS: i32 = 2;

/// Exit status when the process fails outside any transfer.
pub const EXIT_UNEXPECTED: i32 = 66;

/// Result of one dispatch operation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub code: ErrorCode,
    /// Human-readable cause, from the partner when available.
    pub cause: Option<String>,
    /// Snapshot of the transfer record, if one was created or found.
    pub record: Option<TransferRecord>,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn succeeded(code: ErrorCode, record: Option<TransferRecord>, started: Instant) -> Self {
        Self {
            success: true,
            code,
            cause: None,
            record,
            duration: started.elapsed(),
        }
    }

    pub fn failed(
        code: ErrorCode,
        cause: impl Into<String>,
        record: Option<TransferRecord>,
        started: Instant,
    ) -> Self {
        Self {
            success: false,
            code,
            cause: Some(cause.into()),
            record,
            duration: started.elapsed(),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }

    pub fn special_id(&self) -> Option<i64> {
        self.record.as_ref().map(|r| r.special_id())
    }

    /// Process exit status: 0 on success, the code's ordinal otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { self.code.ordinal() }
    }
}

/// Exit status for an optional outcome; no outcome at all maps to `Unknown`.
pub fn exit_code_for(outcome: Option<&RunOutcome>) -> i32 {
    match outcome {
        Some(outcome) => outcome.exit_code(),
        None => ErrorCode::Unknown.ordinal(),
    }
}

/// One (host, file) result of a fan-out.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub host: String,
    pub file: String,
    pub outcome: RunOutcome,
}

/// Accumulated results of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<ItemOutcome>,
    /// The last failing item, reported as the representative failure.
    pub last_failure: Option<RunOutcome>,
}

impl AggregateOutcome {
    /// A batch that could not start at all.
    pub fn aborted(outcome: RunOutcome) -> Self {
        Self {
            success_count: 0,
            error_count: 1,
            results: Vec::new(),
            last_failure: Some(outcome),
        }
    }

    pub fn push(&mut self, item: ItemOutcome) {
        if item.outcome.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
            self.last_failure = Some(item.outcome.clone());
        }
        self.results.push(item);
    }

    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            exit_code_for(self.last_failure.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let now = Instant::now();
        assert_eq!(RunOutcome::succeeded(ErrorCode::CompleteOk, None, now).exit_code(), 0);
        let failed = RunOutcome::failed(ErrorCode::ConnectionImpossible, "down", None, now);
        assert_eq!(failed.exit_code(), 5);
        assert_eq!(exit_code_for(None), ErrorCode::Unknown.ordinal());
    }

    #[test]
    fn aggregate_counts_and_keeps_last_failure() {
        let now = Instant::now();
        let mut agg = AggregateOutcome::default();
        let item = |file: &str, outcome: RunOutcome| ItemOutcome {
            host: "hosta".into(),
            file: file.into(),
            outcome,
        };
        agg.push(item("a", RunOutcome::succeeded(ErrorCode::CompleteOk, None, now)));
        agg.push(item("b", RunOutcome::failed(ErrorCode::TransferError, "x", None, now)));
        agg.push(item("c", RunOutcome::failed(ErrorCode::FileNotFound, "y", None, now)));
        assert_eq!(agg.success_count, 1);
        assert_eq!(agg.error_count, 2);
        assert!(!agg.is_success());
        assert_eq!(agg.last_failure.as_ref().unwrap().code, ErrorCode::FileNotFound);
        assert_eq!(agg.exit_code(), ErrorCode::FileNotFound.ordinal());
    }
}
