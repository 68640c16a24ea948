use chrono::{DateTime, Utc};

use crate::hosts::HostDirectory;
use crate::{DEFAULT_BLOCK_SIZE, NO_INFO, TransferError};

/// Immutable description of one transfer.
///
/// Either `rule` and `filename` are both set, or `fixed_id` is set and the
/// missing fields are recovered from the stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    remote_host: String,
    rule: Option<String>,
    filename: Option<String>,
    file_info: String,
    block_size: u32,
    use_hash: bool,
    fixed_id: Option<i64>,
    start_time: Option<DateTime<Utc>>,
    follow_id: Option<String>,
    no_log: bool,
    log_as_warn: bool,
}

impl TransferRequest {
    pub fn builder(remote_host: impl Into<String>) -> TransferRequestBuilder {
        TransferRequestBuilder {
            remote_host: remote_host.into(),
            rule: None,
            filename: None,
            file_info: None,
            block_size: DEFAULT_BLOCK_SIZE,
            use_hash: false,
            fixed_id: None,
            start_time: None,
            follow_id: None,
            no_log: false,
            log_as_warn: false,
        }
    }

    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn file_info(&self) -> &str {
        &self.file_info
    }

    /// Whether the caller supplied file information.
    pub fn has_file_info(&self) -> bool {
        self.file_info != NO_INFO
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    pub fn fixed_id(&self) -> Option<i64> {
        self.fixed_id
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn follow_id(&self) -> Option<&str> {
        self.follow_id.as_deref()
    }

    pub fn no_log(&self) -> bool {
        self.no_log
    }

    pub fn log_as_warn(&self) -> bool {
        self.log_as_warn
    }
}

/// Builder for [`TransferRequest`].
#[derive(Debug, Clone)]
pub struct TransferRequestBuilder {
    remote_host: String,
    rule: Option<String>,
    filename: Option<String>,
    file_info: Option<String>,
    block_size: u32,
    use_hash: bool,
    fixed_id: Option<i64>,
    start_time: Option<DateTime<Utc>>,
    follow_id: Option<String>,
    no_log: bool,
    log_as_warn: bool,
}

impl TransferRequestBuilder {
    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn file(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn file_info(mut self, info: impl Into<String>) -> Self {
        self.file_info = Some(info.into());
        self
    }

    /// A zero block size keeps the default.
    pub fn block_size(mut self, block_size: u32) -> Self {
        if block_size > 0 {
            self.block_size = block_size;
        }
        self
    }

    pub fn use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    pub fn fixed_id(mut self, special_id: i64) -> Self {
        self.fixed_id = Some(special_id);
        self
    }

    pub fn start_time(mut self, start_time: Option<DateTime<Utc>>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn follow_id(mut self, follow_id: impl Into<String>) -> Self {
        self.follow_id = Some(follow_id.into());
        self
    }

    pub fn no_log(mut self, no_log: bool) -> Self {
        self.no_log = no_log;
        self
    }

    pub fn log_as_warn(mut self, log_as_warn: bool) -> Self {
        self.log_as_warn = log_as_warn;
        self
    }

    /// Resolves the host alias and checks the request is complete.
    pub fn build(self, hosts: &dyn HostDirectory) -> Result<TransferRequest, TransferError> {
        let remote_host = self.remote_host.trim();
        if remote_host.is_empty() {
            return Err(TransferError::InvalidRequest("remote host is empty".into()));
        }
        let remote_host = hosts.resolve_alias(remote_host);

        let has_target = self.rule.as_deref().is_some_and(|r| !r.is_empty())
            && self.filename.as_deref().is_some_and(|f| !f.is_empty());
        if !has_target && self.fixed_id.is_none() {
            return Err(TransferError::InvalidRequest(
                "either rule and file or a transfer id is required".into(),
            ));
        }

        let file_info = self
            .file_info
            .filter(|info| !info.is_empty())
            .unwrap_or_else(|| NO_INFO.to_string());

        Ok(TransferRequest {
            remote_host,
            rule: self.rule,
            filename: self.filename,
            file_info,
            block_size: self.block_size,
            use_hash: self.use_hash,
            fixed_id: self.fixed_id,
            start_time: self.start_time,
            follow_id: self.follow_id,
            no_log: self.no_log,
            log_as_warn: self.log_as_warn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::{HostEntry, StaticHosts};

    fn hosts() -> StaticHosts {
        StaticHosts::new("me", "me-tls")
            .with_host(HostEntry::server("hosta", "10.0.0.1:6666"))
            .with_alias("primary", "hosta")
    }

    #[test]
    fn builds_with_defaults_and_alias() {
        let req = TransferRequest::builder("primary")
            .rule("out")
            .file("report.csv")
            .build(&hosts())
            .unwrap();
        assert_eq!(req.remote_host(), "hosta");
        assert_eq!(req.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(req.file_info(), NO_INFO);
        assert!(!req.has_file_info());
        assert!(req.fixed_id().is_none());
    }

    #[test]
    fn id_only_request_is_valid() {
        let req = TransferRequest::builder("hosta")
            .fixed_id(77)
            .build(&hosts())
            .unwrap();
        assert_eq!(req.fixed_id(), Some(77));
        assert!(req.rule().is_none());
    }

    #[test]
    fn incomplete_request_is_rejected() {
        let err = TransferRequest::builder("hosta")
            .rule("out")
            .build(&hosts())
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidRequest(_)));

        let err = TransferRequest::builder("  ")
            .rule("out")
            .file("a")
            .build(&hosts())
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidRequest(_)));
    }

    #[test]
    fn zero_block_size_keeps_default() {
        let req = TransferRequest::builder("hosta")
            .rule("out")
            .file("a")
            .block_size(0)
            .file_info("")
            .build(&hosts())
            .unwrap();
        assert_eq!(req.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(req.file_info(), NO_INFO);
    }
}
