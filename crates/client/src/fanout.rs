//! One request over many hosts and files.
//!
//! Items run one after the other, hosts outer and files inner, and a failing
//! item never stops the batch.

use std::time::Instant;

use chrono::{DateTime, Utc};
use ferry_protocol::ErrorCode;
use ferry_transfer::{Rule, TransferRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::files::{expand_local, has_wildcard, split_list};
use crate::information::RequestInformation;
use crate::outcome::{AggregateOutcome, ItemOutcome, RunOutcome};
use crate::runner::{ClientContext, ClientRunner};

/// Arguments of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanOutRequest {
    pub hosts: Vec<String>,
    /// Literal names or wildcard patterns.
    pub files: Vec<String>,
    pub rule: String,
    pub file_info: Option<String>,
    /// Zero keeps the default block size.
    pub block_size: u32,
    pub use_hash: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub no_log: bool,
    pub log_as_warn: bool,
    /// Register the transfers without opening any session.
    pub submit_only: bool,
}

impl FanOutRequest {
    /// `hosts` and `files` are comma-separated lists.
    pub fn new(hosts: &str, files: &str, rule: impl Into<String>) -> Self {
        Self {
            hosts: split_list(hosts),
            files: split_list(files),
            rule: rule.into(),
            ..Default::default()
        }
    }
}

/// Progress of a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum FanOutEvent {
    ItemStarted {
        host: String,
        file: String,
    },
    ItemFinished {
        host: String,
        file: String,
        success: bool,
        code: ErrorCode,
    },
}

const EVENT_CAPACITY: usize = 256;

pub struct FanOutDispatcher {
    ctx: ClientContext,
    runner: ClientRunner,
    info: RequestInformation,
    events_tx: mpsc::Sender<FanOutEvent>,
    events_rx: Option<mpsc::Receiver<FanOutEvent>>,
}

impl FanOutDispatcher {
    pub fn new(ctx: ClientContext) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            runner: ClientRunner::new(ctx.clone()),
            info: RequestInformation::new(ctx.clone()),
            ctx,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Progress events. Can be taken once; events are dropped while the
    /// receiver lags.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<FanOutEvent>> {
        self.events_rx.take()
    }

    pub async fn run_many(&self, request: &FanOutRequest) -> AggregateOutcome {
        let started = Instant::now();
        let rule = match self.ctx.rules.resolve(&request.rule) {
            Ok(rule) => rule,
            Err(e) => {
                warn!(rule = %request.rule, error = %e, "fan-out aborted");
                return AggregateOutcome::aborted(RunOutcome::failed(
                    ErrorCode::Internal,
                    e.to_string(),
                    None,
                    started,
                ));
            }
        };
        if request.hosts.is_empty() || request.files.is_empty() {
            return AggregateOutcome::aborted(RunOutcome::failed(
                ErrorCode::Internal,
                "no host or no file to transfer",
                None,
                started,
            ));
        }

        // Local names do not depend on the host.
        let local_files = rule
            .is_send_capable()
            .then(|| self.resolve_local(&rule, &request.files));

        let mut aggregate = AggregateOutcome::default();
        for host in &request.hosts {
            let files = match &local_files {
                Some(files) => files.clone(),
                None => self.resolve_remote(host, &rule, &request.files).await,
            };
            for file in files {
                self.emit(FanOutEvent::ItemStarted {
                    host: host.clone(),
                    file: file.clone(),
                });
                let outcome = self.run_item(request, host, &file).await;
                self.emit(FanOutEvent::ItemFinished {
                    host: host.clone(),
                    file: file.clone(),
                    success: outcome.success,
                    code: outcome.code,
                });
                aggregate.push(ItemOutcome {
                    host: host.clone(),
                    file,
                    outcome,
                });
            }
        }

        info!(
            rule = %request.rule,
            success = aggregate.success_count,
            errors = aggregate.error_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fan-out finished"
        );
        aggregate
    }

    async fn run_item(&self, request: &FanOutRequest, host: &str, file: &str) -> RunOutcome {
        let mut builder = TransferRequest::builder(host)
            .rule(request.rule.clone())
            .file(file)
            .block_size(request.block_size)
            .use_hash(request.use_hash)
            .start_time(request.start_time)
            .no_log(request.no_log)
            .log_as_warn(request.log_as_warn);
        if let Some(file_info) = &request.file_info {
            builder = builder.file_info(file_info.clone());
        }
        let transfer = match builder.build(self.ctx.hosts.as_ref()) {
            Ok(transfer) => transfer,
            Err(e) => {
                return RunOutcome::failed(ErrorCode::Internal, e.to_string(), None, Instant::now());
            }
        };

        if request.submit_only {
            self.runner.submit(&transfer)
        } else {
            self.runner.run(&transfer).await
        }
    }

    /// Expands patterns against the rule's send directory. A pattern that
    /// matches nothing contributes no file.
    fn resolve_local(&self, rule: &Rule, names: &[String]) -> Vec<String> {
        let mut resolved = Vec::new();
        for name in names {
            if !has_wildcard(name) {
                resolved.push(name.clone());
                continue;
            }
            match expand_local(&rule.send_path, name) {
                Ok(found) if !found.is_empty() => {
                    debug!(pattern = %name, count = found.len(), "pattern expanded");
                    resolved.extend(found);
                }
                Ok(_) => warn!(pattern = %name, "pattern matches no local file"),
                Err(e) => warn!(pattern = %name, error = %e, "cannot expand pattern"),
            }
        }
        resolved
    }

    /// Asks `host` which files match each pattern. Failures and empty
    /// answers contribute no file.
    async fn resolve_remote(&self, host: &str, rule: &Rule, names: &[String]) -> Vec<String> {
        let mut resolved = Vec::new();
        for name in names {
            if !has_wildcard(name) {
                resolved.push(name.clone());
                continue;
            }
            match self.info.list_files(host, &rule.name, name).await {
                Ok(found) if !found.is_empty() => resolved.extend(found),
                Ok(_) => warn!(host, pattern = %name, "pattern matches no remote file"),
                Err(e) => warn!(host, pattern = %name, error = %e, "cannot list remote files"),
            }
        }
        resolved
    }

    fn emit(&self, event: FanOutEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "fan-out event dropped");
        }
    }
}
