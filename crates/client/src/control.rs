//! Cancel, stop and restart transfers owned by a partner.
//!
//! The record is looked up locally first. When it is missing, the partner's
//! copy is fetched with a describe request and adopted locally as
//! `ToSubmit`.

use std::time::Instant;

use chrono::{Local, NaiveDateTime, Utc};
use ferry_protocol::{ControlBody, ControlKind, ErrorCode, Packet, TransferCommand};
use ferry_transfer::{HostEntry, RecordKey, TransferRecord, TransferRequest};
use tracing::{info, warn};

use crate::information::RequestInformation;
use crate::outcome::RunOutcome;
use crate::runner::{ClientContext, ClientRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    Stop,
}

impl Interrupt {
    fn kind(self) -> ControlKind {
        match self {
            Self::Cancel => ControlKind::Cancel,
            Self::Stop => ControlKind::Stop,
        }
    }

    fn code(self) -> ErrorCode {
        match self {
            Self::Cancel => ErrorCode::CanceledTransfer,
            Self::Stop => ErrorCode::StoppedTransfer,
        }
    }

    fn mark(self, record: &mut TransferRecord) {
        match self {
            Self::Cancel => {
                record.set_in_error(ErrorCode::CanceledTransfer, Some("canceled on request".into()))
            }
            Self::Stop => record.set_interrupted(ErrorCode::StoppedTransfer),
        }
    }
}

/// Both ends of a transfer as the host directory knows them.
struct Parties {
    requested: HostEntry,
    requester: HostEntry,
    requester_is_local: bool,
}

impl Parties {
    fn key(&self, special_id: i64) -> RecordKey {
        RecordKey::new(
            special_id,
            self.requester.host_id.clone(),
            self.requested.host_id.clone(),
        )
    }

    /// The end that is not this process.
    fn peer(&self) -> &HostEntry {
        if self.requester_is_local {
            &self.requested
        } else {
            &self.requester
        }
    }
}

#[derive(Clone)]
pub struct RemoteControl {
    ctx: ClientContext,
    runner: ClientRunner,
    info: RequestInformation,
}

impl RemoteControl {
    pub fn new(ctx: ClientContext) -> Self {
        Self {
            runner: ClientRunner::new(ctx.clone()),
            info: RequestInformation::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn cancel(&self, special_id: i64, requested: &str, requester: &str) -> RunOutcome {
        self.interrupt(Interrupt::Cancel, special_id, requested, requester)
            .await
    }

    pub async fn stop(&self, special_id: i64, requested: &str, requester: &str) -> RunOutcome {
        self.interrupt(Interrupt::Stop, special_id, requested, requester)
            .await
    }

    /// Restarts a transfer, optionally rescheduled at `restart_time` (local
    /// time). A client-only requester cannot be asked to restart, so when
    /// that requester is this process the transfer is run here by id.
    pub async fn restart(
        &self,
        special_id: i64,
        requested: &str,
        requester: &str,
        restart_time: Option<NaiveDateTime>,
    ) -> RunOutcome {
        let started = Instant::now();
        let parties = match self.resolve(requested, requester, started) {
            Ok(parties) => parties,
            Err(outcome) => return outcome,
        };
        let key = parties.key(special_id);
        let record = match self.locate(&key, parties.peer(), started).await {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };

        if record.is_all_done() {
            info!(%key, "restart not needed, transfer already done");
            return RunOutcome::succeeded(ErrorCode::CompleteOk, Some(record), started)
                .with_cause("transfer already finished");
        }

        if parties.requester.is_client_only() {
            if !parties.requester_is_local {
                return RunOutcome::failed(
                    ErrorCode::ConnectionImpossible,
                    format!("{} is client-only and cannot be asked to restart", key.requester),
                    Some(record),
                    started,
                );
            }
            return self.restart_locally(record, restart_time, started).await;
        }

        let command = TransferCommand::new(&key.requested, &key.requester, special_id)
            .with_restart_time(restart_time);
        let body = match ControlBody::encode(&command, parties.requester.use_json) {
            Ok(body) => body,
            Err(e) => return RunOutcome::failed(ErrorCode::Internal, e.to_string(), Some(record), started),
        };
        let packet = Packet::Control {
            kind: ControlKind::Restart,
            body,
        };

        match self.ctx.exchange(&parties.requester, packet).await {
            Ok(answer) => match answer.code {
                ErrorCode::QueryStillRunning
                | ErrorCode::Running
                | ErrorCode::PreProcessingOk
                | ErrorCode::CompleteOk
                | ErrorCode::RemoteError
                | ErrorCode::PassThroughMode => {
                    info!(%key, code = ?answer.code, "restart answered");
                    let outcome = RunOutcome::succeeded(answer.code, Some(record), started);
                    match answer.message {
                        Some(message) => outcome.with_cause(message),
                        None => outcome,
                    }
                }
                other => {
                    warn!(%key, code = ?other, "unexpected restart answer");
                    RunOutcome::failed(
                        ErrorCode::Internal,
                        format!("unexpected answer to restart: {other}"),
                        Some(record),
                        started,
                    )
                }
            },
            Err(e) => RunOutcome::failed(e.code(), e.to_string(), Some(record), started),
        }
    }

    async fn restart_locally(
        &self,
        record: TransferRecord,
        restart_time: Option<NaiveDateTime>,
        started: Instant,
    ) -> RunOutcome {
        let start_time = restart_time
            .and_then(|t| t.and_local_timezone(Local).earliest())
            .map(|t| t.with_timezone(&Utc));
        let request = match TransferRequest::builder(record.key.requested.clone())
            .fixed_id(record.special_id())
            .start_time(start_time)
            .build(self.ctx.hosts.as_ref())
        {
            Ok(request) => request,
            Err(e) => return RunOutcome::failed(ErrorCode::Internal, e.to_string(), Some(record), started),
        };

        info!(key = %record.key, "restarting locally");
        let outcome = self.runner.run(&request).await;
        if outcome.success {
            RunOutcome::succeeded(ErrorCode::PreProcessingOk, outcome.record, started)
        } else {
            outcome
        }
    }

    async fn interrupt(
        &self,
        action: Interrupt,
        special_id: i64,
        requested: &str,
        requester: &str,
    ) -> RunOutcome {
        let started = Instant::now();
        let parties = match self.resolve(requested, requester, started) {
            Ok(parties) => parties,
            Err(outcome) => return outcome,
        };
        let key = parties.key(special_id);
        let target = parties.peer();
        let mut record = match self.locate(&key, target, started).await {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };

        if record.is_all_done() {
            info!(%key, action = ?action, "transfer already done");
            return RunOutcome::succeeded(ErrorCode::TransferOk, Some(record), started)
                .with_cause("transfer already finished");
        }

        // No session can be opened towards a client-only partner.
        if target.is_client_only() {
            action.mark(&mut record);
            self.save(&record);
            info!(%key, action = ?action, "partner unreachable, local record marked");
            return RunOutcome::succeeded(action.code(), Some(record), started)
                .with_cause(format!("{} is client-only, local record marked", target.host_id));
        }

        let command = TransferCommand::new(&key.requested, &key.requester, special_id);
        let body = match ControlBody::encode(&command, target.use_json) {
            Ok(body) => body,
            Err(e) => return RunOutcome::failed(ErrorCode::Internal, e.to_string(), Some(record), started),
        };
        let packet = Packet::Control {
            kind: action.kind(),
            body,
        };

        match self.ctx.exchange(target, packet).await {
            Ok(answer) => match answer.code {
                ErrorCode::CompleteOk => {
                    action.mark(&mut record);
                    self.save(&record);
                    info!(%key, action = ?action, "acknowledged by partner");
                    RunOutcome::succeeded(ErrorCode::CompleteOk, Some(record), started)
                }
                ErrorCode::TransferOk => {
                    info!(%key, action = ?action, "partner reports transfer already finished");
                    RunOutcome::succeeded(ErrorCode::TransferOk, Some(record), started)
                        .with_cause("transfer already finished")
                }
                other => {
                    warn!(%key, action = ?action, code = ?other, "unexpected answer");
                    RunOutcome::failed(
                        ErrorCode::Internal,
                        format!("unexpected answer: {other}"),
                        Some(record),
                        started,
                    )
                }
            },
            Err(e) => RunOutcome::failed(e.code(), e.to_string(), Some(record), started),
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn resolve(&self, requested: &str, requester: &str, started: Instant) -> Result<Parties, RunOutcome> {
        let hosts = self.ctx.hosts.as_ref();
        let requested_id = hosts.resolve_alias(requested);
        let requester_id = hosts.resolve_alias(requester);

        // This process is not necessarily listed; it is then a plain client.
        let requested = match hosts.lookup(&requested_id) {
            Ok(host) => host,
            Err(_) if hosts.is_local(&requested_id) => HostEntry::client_only(requested_id),
            Err(e) => {
                return Err(RunOutcome::failed(
                    ErrorCode::ConnectionImpossible,
                    e.to_string(),
                    None,
                    started,
                ));
            }
        };
        let requester_is_local = hosts.is_local(&requester_id);
        let requester = match hosts.lookup(&requester_id) {
            Ok(host) => host,
            Err(_) if requester_is_local => HostEntry::client_only(requester_id),
            Err(e) => {
                return Err(RunOutcome::failed(ErrorCode::Internal, e.to_string(), None, started));
            }
        };

        Ok(Parties {
            requested,
            requester,
            requester_is_local,
        })
    }

    async fn locate(
        &self,
        key: &RecordKey,
        peer: &HostEntry,
        started: Instant,
    ) -> Result<TransferRecord, RunOutcome> {
        let internal = |cause: String, record: Option<TransferRecord>| {
            RunOutcome::failed(ErrorCode::Internal, cause, record, started)
        };

        match self.ctx.store.load_by_id(key) {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => return Err(internal(e.to_string(), None)),
        }

        if peer.is_client_only() {
            return Err(internal(
                format!("no local transfer {key} and {} cannot be queried", peer.host_id),
                None,
            ));
        }

        let mut record = self
            .info
            .describe_transfer(&peer.host_id, key)
            .await
            .map_err(|e| internal(format!("cannot describe transfer {key}: {e}"), None))?;

        if record.key != *key {
            return Err(internal(
                format!("partner described {} instead of {key}", record.key),
                None,
            ));
        }
        if record.is_all_done() {
            return Err(internal(format!("remote transfer {key} is already done"), Some(record)));
        }

        record.set_to_submit();
        self.ctx
            .store
            .insert(&record)
            .map_err(|e| internal(e.to_string(), Some(record.clone())))?;
        info!(%key, host = %peer.host_id, "transfer record adopted from partner");
        Ok(record)
    }

    fn save(&self, record: &TransferRecord) {
        if let Err(e) = self.ctx.store.update(record) {
            warn!(key = %record.key, error = %e, "cannot save transfer record");
        }
    }
}
