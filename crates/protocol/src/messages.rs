use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Comment attached to control commands.
pub const REQUEST_COMMENT: &str = "Request on Transfer";

/// Business task name used by spool daemons to push status to observers.
pub const SPOOLED_INFORM_TASK: &str = "spooled-inform";

/// Observer answer asking for a full status snapshot on the next push.
pub const NEED_FULL: &str = "needfull";

/// Observer answer acknowledging an incremental snapshot.
pub const PARTIAL_OK: &str = "Validated";

/// Legacy timestamp layout for restart times (`yyyyMMddHHmmss`).
pub const LEGACY_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifies a transfer on a partner and optionally carries a reschedule time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCommand {
    pub requested: String,
    pub requester: String,
    pub special_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl TransferCommand {
    pub fn new(requested: &str, requester: &str, special_id: i64) -> Self {
        Self {
            requested: requested.to_string(),
            requester: requester.to_string(),
            special_id,
            restart_time: None,
            comment: REQUEST_COMMENT.to_string(),
        }
    }

    pub fn with_restart_time(mut self, restart_time: Option<NaiveDateTime>) -> Self {
        self.restart_time = restart_time;
        self
    }

    /// Space-separated form understood by partners without JSON support.
    pub fn to_legacy(&self) -> String {
        let mut text = format!("{} {} {}", self.requested, self.requester, self.special_id);
        if let Some(time) = self.restart_time {
            text.push(' ');
            text.push_str(&time.format(LEGACY_TIME_FORMAT).to_string());
        }
        text
    }

    /// Parses the space-separated legacy form.
    pub fn from_legacy(text: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(ProtocolError::MalformedCommand(text.to_string()));
        }
        let special_id = parts[2]
            .parse::<i64>()
            .map_err(|_| ProtocolError::MalformedCommand(text.to_string()))?;
        let restart_time = match parts.get(3) {
            Some(raw) => Some(
                NaiveDateTime::parse_from_str(raw, LEGACY_TIME_FORMAT)
                    .map_err(|_| ProtocolError::MalformedCommand(text.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            requested: parts[0].to_string(),
            requester: parts[1].to_string(),
            special_id,
            restart_time,
            comment: REQUEST_COMMENT.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read-only queries answered by a partner in a single exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "camelCase")]
pub enum InformationQuery {
    /// Returns the partner's copy of a transfer record as JSON.
    #[serde(rename_all = "camelCase")]
    DescribeTransfer {
        special_id: i64,
        requester: String,
        requested: String,
    },
    /// Returns newline-separated file names matching `pattern` under the
    /// rule's send directory.
    #[serde(rename_all = "camelCase")]
    ListFiles { rule: String, pattern: String },
}

/// Application-level request routed to a named task on the partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRequest {
    pub task: String,
    pub argument: String,
}

impl BusinessRequest {
    pub fn new(task: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            argument: argument.into(),
        }
    }
}
