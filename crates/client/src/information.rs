//! Read-only queries to a partner: its copy of a transfer record, and the
//! files a rule would serve.

use ferry_protocol::{Answer, InformationQuery, Packet};
use ferry_transfer::{RecordKey, TransferRecord};
use tracing::debug;

use crate::error::ClientError;
use crate::runner::ClientContext;

#[derive(Clone)]
pub struct RequestInformation {
    ctx: ClientContext,
}

impl RequestInformation {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    /// Fetches the partner's record for `key`.
    pub async fn describe_transfer(
        &self,
        host_id: &str,
        key: &RecordKey,
    ) -> Result<TransferRecord, ClientError> {
        let query = InformationQuery::DescribeTransfer {
            special_id: key.special_id,
            requester: key.requester.clone(),
            requested: key.requested.clone(),
        };
        let answer = self.query(host_id, query).await?;
        let payload = answer.payload.unwrap_or_default();
        let record: TransferRecord = serde_json::from_str(&payload)?;
        debug!(host = host_id, key = %record.key, status = ?record.status, "remote record");
        Ok(record)
    }

    /// Names of the files matching `pattern` on the partner, for `rule`.
    pub async fn list_files(
        &self,
        host_id: &str,
        rule: &str,
        pattern: &str,
    ) -> Result<Vec<String>, ClientError> {
        let query = InformationQuery::ListFiles {
            rule: rule.to_string(),
            pattern: pattern.to_string(),
        };
        let answer = self.query(host_id, query).await?;
        Ok(answer
            .payload
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn query(&self, host_id: &str, query: InformationQuery) -> Result<Answer, ClientError> {
        let host = self.ctx.hosts.lookup(host_id)?;
        let answer = self.ctx.exchange(&host, Packet::Information(query)).await?;
        if !answer.code.is_ok_step() {
            return Err(ClientError::Remote {
                code: answer.code,
                message: answer
                    .message
                    .unwrap_or_else(|| answer.code.message().to_string()),
            });
        }
        Ok(answer)
    }
}
