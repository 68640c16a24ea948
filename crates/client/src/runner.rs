//! Single-transfer driver.
//!
//! [`ClientRunner::run`] creates or recovers the transfer record, opens a
//! session with bounded retries, waits for the transport to report, and
//! leaves the record in a terminal state.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ferry_protocol::{Answer, ErrorCode, Packet, TransferStatus};
use ferry_transfer::{
    HostDirectory, HostEntry, RecordDraft, RecordKey, RecordStore, Rule, RuleResolver,
    TransferRecord, TransferRequest,
};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::outcome::RunOutcome;
use crate::session::{
    ConnectAttempt, ConnectRequest, ErrorHook, Session, SessionHandle, ThroughRole,
};

/// Collaborators shared by every client operation.
#[derive(Clone)]
pub struct ClientContext {
    pub sessions: Arc<dyn SessionHandle>,
    pub store: Arc<dyn RecordStore>,
    pub rules: Arc<dyn RuleResolver>,
    pub hosts: Arc<dyn HostDirectory>,
    pub config: ClientConfig,
    pub error_hook: Option<Arc<dyn ErrorHook>>,
}

impl ClientContext {
    pub fn new(
        sessions: Arc<dyn SessionHandle>,
        store: Arc<dyn RecordStore>,
        rules: Arc<dyn RuleResolver>,
        hosts: Arc<dyn HostDirectory>,
    ) -> Self {
        Self {
            sessions,
            store,
            rules,
            hosts,
            config: ClientConfig::default(),
            error_hook: None,
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_error_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Opens a session for one-shot exchanges, with the same attempt bound
    /// as transfers. Overload answers count as attempts here.
    pub async fn open_session(&self, host: &HostEntry) -> Result<Box<dyn Session>, ClientError> {
        let limit = self.config.retry_limit.max(1);
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=limit {
            let request = ConnectRequest {
                host: host.clone(),
                record: None,
                through: ThroughRole::None,
            };
            let delay = match self.sessions.connect(request).await {
                ConnectAttempt::Connected(session) => return Ok(session),
                ConnectAttempt::Pending(reason) => {
                    last_reason = reason;
                    self.config.reconnect.delay_for_attempt(attempt)
                }
                ConnectAttempt::Overloaded => {
                    last_reason = "partner overloaded".into();
                    self.config.overload_backoff
                }
                ConnectAttempt::Fatal { code, message } => {
                    return Err(ClientError::Connect { code, message });
                }
            };
            debug!(host = %host.host_id, attempt, reason = %last_reason, "control session not ready");
            if attempt < limit {
                tokio::time::sleep(delay).await;
            }
        }

        Err(ClientError::Connect {
            code: ErrorCode::ConnectionImpossible,
            message: format!("no connection to {} after {limit} attempt(s): {last_reason}", host.host_id),
        })
    }

    /// Sends one packet to a partner and returns its answer.
    pub async fn exchange(&self, host: &HostEntry, packet: Packet) -> Result<Answer, ClientError> {
        let mut session = self.open_session(host).await?;
        debug!(host = %host.host_id, packet = packet.name(), "sending request");
        let answer = session.request(packet, self.config.request_timeout).await;
        session.close().await;
        answer
    }
}

/// How a request is about to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitKind {
    Direct,
    Submit,
    SendThrough,
    RecvThrough,
}

impl InitKind {
    fn is_through(self) -> bool {
        matches!(self, Self::SendThrough | Self::RecvThrough)
    }
}

/// A request whose record exists and whose partner is resolved.
pub(crate) struct Prepared {
    pub(crate) host: HostEntry,
    pub(crate) record: TransferRecord,
    pub(crate) no_log: bool,
    pub(crate) log_as_warn: bool,
    pub(crate) started: Instant,
}

/// Drives single transfers to a terminal state.
#[derive(Clone)]
pub struct ClientRunner {
    ctx: ClientContext,
}

impl ClientRunner {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    /// Runs one transfer: connect with retries, wait for completion,
    /// finalize. Never returns early with a transient error.
    pub async fn run(&self, request: &TransferRequest) -> RunOutcome {
        let started = Instant::now();
        let mut prepared = match self.init_request(request, InitKind::Direct, started) {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };
        let session = match self
            .connect_with_retry(&mut prepared, ThroughRole::None)
            .await
        {
            Ok(session) => session,
            Err(outcome) => return outcome,
        };
        self.finish_transfer(session, prepared).await
    }

    /// Registers the transfer for later pickup without opening a session.
    pub fn submit(&self, request: &TransferRequest) -> RunOutcome {
        let started = Instant::now();
        match self.init_request(request, InitKind::Submit, started) {
            Ok(prepared) => {
                info!(
                    host = %prepared.host.host_id,
                    special_id = prepared.record.special_id(),
                    file = %prepared.record.filename,
                    "transfer submitted"
                );
                RunOutcome::succeeded(ErrorCode::InitOk, Some(prepared.record), started)
            }
            Err(outcome) => outcome,
        }
    }

    // -----------------------------------------------------------------------
    // Record preparation
    // -----------------------------------------------------------------------

    /// Resolves the partner and rule, then creates the record or recovers it
    /// by id.
    pub(crate) fn init_request(
        &self,
        request: &TransferRequest,
        kind: InitKind,
        started: Instant,
    ) -> Result<Prepared, RunOutcome> {
        let host = self.ctx.hosts.lookup(request.remote_host()).map_err(|e| {
            RunOutcome::failed(ErrorCode::ConnectionImpossible, e.to_string(), None, started)
        })?;
        let requester = self.ctx.hosts.local_host_id(host.use_tls);

        let mut record = match request.fixed_id() {
            Some(special_id) => {
                let key = RecordKey::new(special_id, requester, host.host_id.clone());
                self.recover_record(request, key, kind, started)?
            }
            None => self.create_record(request, &host, requester, kind, started)?,
        };

        if kind.is_through() && !record.ignore_save {
            record.ignore_save = true;
            self.ctx.store.update(&record).map_err(|e| {
                RunOutcome::failed(ErrorCode::Internal, e.to_string(), Some(record.clone()), started)
            })?;
        }

        debug!(
            host = %host.host_id,
            special_id = record.special_id(),
            mode = ?record.mode,
            "transfer record ready"
        );

        Ok(Prepared {
            host,
            record,
            no_log: request.no_log(),
            log_as_warn: request.log_as_warn(),
            started,
        })
    }

    fn create_record(
        &self,
        request: &TransferRequest,
        host: &HostEntry,
        requester: String,
        kind: InitKind,
        started: Instant,
    ) -> Result<TransferRecord, RunOutcome> {
        let internal = |cause: String| RunOutcome::failed(ErrorCode::Internal, cause, None, started);

        let rule_name = request.rule().unwrap_or_default();
        let filename = request.filename().unwrap_or_default();
        let rule = self
            .ctx
            .rules
            .resolve(rule_name)
            .map_err(|e| internal(e.to_string()))?;

        match kind {
            InitKind::SendThrough if !rule.is_send_capable() => {
                return Err(internal(format!("rule {} cannot send", rule.name)));
            }
            InitKind::RecvThrough if !rule.is_recv_capable() => {
                return Err(internal(format!("rule {} cannot receive", rule.name)));
            }
            _ => {}
        }

        let mut mode = rule.mode;
        if request.use_hash() {
            mode = mode.with_hash();
        }
        if kind.is_through() {
            mode = mode.with_through();
        }

        let original_size = if mode.is_send() && !mode.is_through() {
            local_file_size(&rule, filename)
        } else {
            -1
        };

        let draft = RecordDraft {
            requester,
            requested: host.host_id.clone(),
            rule: rule.name.clone(),
            filename: filename.to_string(),
            mode,
            is_sender: mode.is_send(),
            block_size: request.block_size(),
            file_info: request.file_info().to_string(),
            follow_id: request.follow_id().map(str::to_string),
            original_size,
            start_time: request.start_time(),
            status: TransferStatus::ToSubmit,
        };
        self.ctx
            .store
            .create(draft)
            .map_err(|e| internal(format!("cannot save transfer record: {e}")))
    }

    fn recover_record(
        &self,
        request: &TransferRequest,
        key: RecordKey,
        kind: InitKind,
        started: Instant,
    ) -> Result<TransferRecord, RunOutcome> {
        let mut record = match self.ctx.store.load_by_id(&key) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(RunOutcome::failed(
                    ErrorCode::QueryRemotelyUnknown,
                    format!("no transfer {key}"),
                    None,
                    started,
                ));
            }
            Err(e) => {
                return Err(RunOutcome::failed(
                    ErrorCode::Internal,
                    e.to_string(),
                    None,
                    started,
                ));
            }
        };

        if record.is_all_done() {
            return Err(RunOutcome::failed(
                ErrorCode::QueryAlreadyFinished,
                format!("transfer {key} is already done"),
                Some(record),
                started,
            ));
        }

        if request.has_file_info() {
            record.file_info = request.file_info().to_string();
        }
        if let Some(start_time) = request.start_time() {
            record.start_time = start_time;
        }
        if kind == InitKind::Submit {
            record.set_to_submit();
        }
        self.ctx.store.update(&record).map_err(|e| {
            RunOutcome::failed(ErrorCode::Internal, e.to_string(), Some(record.clone()), started)
        })?;
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Opens the transfer session.
    ///
    /// "Not yet connected" consumes an attempt and backs off. An overload
    /// answer keeps the attempt slot, sleeps, and counts against the
    /// separate overload bound. Any other refusal is terminal.
    pub(crate) async fn connect_with_retry(
        &self,
        prepared: &mut Prepared,
        through: ThroughRole,
    ) -> Result<Box<dyn Session>, RunOutcome> {
        let config = &self.ctx.config;
        let limit = config.retry_limit.max(1);
        let mut attempt: u32 = 0;
        let mut overloads: u32 = 0;
        let mut last_reason = String::from("no attempt made");

        while attempt < limit {
            attempt += 1;
            debug!(
                host = %prepared.host.host_id,
                special_id = prepared.record.special_id(),
                attempt,
                "connecting"
            );

            let request = ConnectRequest {
                host: prepared.host.clone(),
                record: Some(prepared.record.clone()),
                through: through.clone(),
            };

            match self.ctx.sessions.connect(request).await {
                ConnectAttempt::Connected(session) => {
                    prepared.record.set_running();
                    self.save(&prepared.record);
                    info!(
                        host = %prepared.host.host_id,
                        special_id = prepared.record.special_id(),
                        attempt,
                        "connected"
                    );
                    return Ok(session);
                }
                ConnectAttempt::Pending(reason) => {
                    debug!(host = %prepared.host.host_id, attempt, %reason, "not yet connected");
                    last_reason = reason;
                    if attempt < limit {
                        tokio::time::sleep(config.reconnect.delay_for_attempt(attempt)).await;
                    }
                }
                ConnectAttempt::Overloaded => {
                    overloads += 1;
                    if !prepared.record.is_terminal() {
                        prepared
                            .record
                            .set_in_error(ErrorCode::ServerOverloaded, Some("partner overloaded".into()));
                        self.save(&prepared.record);
                    }
                    if overloads > config.overload_retry_limit {
                        let cause = format!(
                            "partner still overloaded after {} retries",
                            config.overload_retry_limit
                        );
                        return Err(self.terminate(prepared, ErrorCode::ConnectionImpossible, cause));
                    }
                    warn!(
                        host = %prepared.host.host_id,
                        overloads,
                        backoff_ms = config.overload_backoff.as_millis() as u64,
                        "partner overloaded, backing off"
                    );
                    attempt -= 1;
                    tokio::time::sleep(config.overload_backoff).await;
                }
                ConnectAttempt::Fatal { code, message } => {
                    return Err(self.terminate(prepared, code, message));
                }
            }
        }

        let cause = format!("no connection after {limit} attempt(s): {last_reason}");
        Err(self.terminate(prepared, ErrorCode::ConnectionImpossible, cause))
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Waits for the transport to report, closes the session and finalizes.
    pub(crate) async fn finish_transfer(
        &self,
        mut session: Box<dyn Session>,
        mut prepared: Prepared,
    ) -> RunOutcome {
        let completion = session
            .await_completion(self.ctx.config.completion_timeout)
            .await;
        session.close().await;

        match completion {
            Ok(completion) if completion.success => self.complete(&mut prepared, completion.rank),
            Ok(completion) => {
                let cause = completion
                    .message
                    .unwrap_or_else(|| completion.code.message().to_string());
                self.terminate(&mut prepared, completion.code, cause)
            }
            Err(e) => self.terminate(&mut prepared, e.code(), e.to_string()),
        }
    }

    /// Marks the record done and drops it when no log is kept.
    pub(crate) fn complete(&self, prepared: &mut Prepared, rank: Option<u32>) -> RunOutcome {
        if let Some(rank) = rank
            && let Err(e) = prepared.record.advance_rank(rank)
        {
            warn!(special_id = prepared.record.special_id(), error = %e, "ignoring rank");
        }
        prepared.record.set_done();
        self.save(&prepared.record);
        if prepared.no_log {
            self.remove(&prepared.record);
        }
        info!(
            host = %prepared.host.host_id,
            special_id = prepared.record.special_id(),
            file = %prepared.record.filename,
            elapsed_ms = prepared.started.elapsed().as_millis() as u64,
            "transfer complete"
        );
        RunOutcome::succeeded(
            ErrorCode::CompleteOk,
            Some(prepared.record.clone()),
            prepared.started,
        )
    }

    /// Terminal failure: finalize in error, drop the record when it is not
    /// meant to be kept, and build the outcome.
    pub(crate) fn terminate(
        &self,
        prepared: &mut Prepared,
        code: ErrorCode,
        cause: String,
    ) -> RunOutcome {
        self.finalize_in_error(&mut prepared.record, code, &cause);
        if prepared.no_log || prepared.record.ignore_save {
            self.remove(&prepared.record);
        }
        if prepared.log_as_warn {
            warn!(
                host = %prepared.host.host_id,
                special_id = prepared.record.special_id(),
                code = ?code,
                %cause,
                "transfer failed"
            );
        } else {
            error!(
                host = %prepared.host.host_id,
                special_id = prepared.record.special_id(),
                code = ?code,
                %cause,
                "transfer failed"
            );
        }
        RunOutcome::failed(code, cause, Some(prepared.record.clone()), prepared.started)
    }

    /// Marks the record in error, persists it and runs the error hook once.
    pub(crate) fn finalize_in_error(&self, record: &mut TransferRecord, code: ErrorCode, cause: &str) {
        if record.is_all_done() {
            return;
        }
        record.set_in_error(code, Some(cause.to_string()));
        self.save(record);
        if let Some(hook) = &self.ctx.error_hook {
            hook.on_error(record);
        }
    }

    fn save(&self, record: &TransferRecord) {
        if let Err(e) = self.ctx.store.update(record) {
            warn!(special_id = record.special_id(), error = %e, "cannot save transfer record");
        }
    }

    fn remove(&self, record: &TransferRecord) {
        match self.ctx.store.delete(&record.key) {
            Ok(_) => debug!(special_id = record.special_id(), "transfer record deleted"),
            Err(e) => warn!(special_id = record.special_id(), error = %e, "cannot delete transfer record"),
        }
    }
}

/// Size of the file a send rule will read, `-1` when missing or empty.
fn local_file_size(rule: &Rule, filename: &str) -> i64 {
    let path = Path::new(filename);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        rule.send_path.join(path)
    };
    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > 0 => meta.len() as i64,
        _ => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSessions, Scripted, SessionEvent, fixture_context};
    use std::sync::Mutex;

    struct CountingHook {
        calls: Mutex<Vec<i64>>,
    }

    impl ErrorHook for CountingHook {
        fn on_error(&self, record: &TransferRecord) {
            self.calls.lock().unwrap().push(record.special_id());
        }
    }

    fn send_request(ctx: &ClientContext, file: &str) -> TransferRequest {
        TransferRequest::builder("hosta")
            .rule("out")
            .file(file)
            .build(ctx.hosts.as_ref())
            .unwrap()
    }

    #[tokio::test]
    async fn successful_run_marks_record_done() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.csv"), b"1,2,3").unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.code, ErrorCode::CompleteOk);
        let record = outcome.record.unwrap();
        assert_eq!(record.original_size, 5);
        let stored = ctx.store.load_by_id(&record.key).unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Done);
        assert_eq!(stored.rank, sessions.completion_rank());
        assert_eq!(sessions.connect_count("hosta"), 1);
        assert_eq!(sessions.count(|e| matches!(e, SessionEvent::Close { .. })), 1);
    }

    #[tokio::test]
    async fn retry_bound_on_not_yet_connected() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script("hosta", vec![Scripted::Pending; 10]);
        let hook = Arc::new(CountingHook {
            calls: Mutex::new(Vec::new()),
        });
        let mut ctx = fixture_context(sessions.clone(), tmp.path()).with_error_hook(hook.clone());
        ctx.config = ClientConfig::immediate(4);
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.code, ErrorCode::ConnectionImpossible);
        assert_eq!(sessions.connect_count("hosta"), 4);
        assert_eq!(hook.calls.lock().unwrap().len(), 1);
        let key = outcome.record.unwrap().key;
        let stored = ctx.store.load_by_id(&key).unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::InError);
        assert_eq!(stored.error_code, ErrorCode::ConnectionImpossible);
    }

    #[tokio::test]
    async fn pending_then_connected_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script("hosta", vec![Scripted::Pending, Scripted::Pending]);
        let mut ctx = fixture_context(sessions.clone(), tmp.path());
        ctx.config = ClientConfig::immediate(3);
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(sessions.connect_count("hosta"), 3);
    }

    #[tokio::test]
    async fn no_log_failure_deletes_record() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script("hosta", vec![Scripted::Pending; 3]);
        let mut ctx = fixture_context(sessions.clone(), tmp.path());
        ctx.config = ClientConfig::immediate(3);
        let runner = ClientRunner::new(ctx.clone());
        let request = TransferRequest::builder("hosta")
            .rule("out")
            .file("a.csv")
            .no_log(true)
            .build(ctx.hosts.as_ref())
            .unwrap();

        let outcome = runner.run(&request).await;

        assert_eq!(outcome.code, ErrorCode::ConnectionImpossible);
        assert!(ctx.store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_keeps_record_unless_no_log() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());

        let kept = runner.run(&send_request(&ctx, "a.csv")).await;
        assert!(kept.success);
        assert_eq!(ctx.store.list().unwrap().len(), 1);

        let request = TransferRequest::builder("hosta")
            .rule("out")
            .file("b.csv")
            .no_log(true)
            .build(ctx.hosts.as_ref())
            .unwrap();
        let dropped = runner.run(&request).await;
        assert!(dropped.success);
        assert_eq!(ctx.store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overload_keeps_attempt_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script(
            "hosta",
            vec![Scripted::Overloaded, Scripted::Overloaded, Scripted::Pending],
        );
        let mut ctx = fixture_context(sessions.clone(), tmp.path());
        ctx.config = ClientConfig::immediate(2);
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        // Two overloads do not consume the two attempt slots.
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(sessions.connect_count("hosta"), 4);
    }

    #[tokio::test]
    async fn overload_bound_is_separate_and_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script("hosta", vec![Scripted::Overloaded; 10]);
        let mut ctx = fixture_context(sessions.clone(), tmp.path());
        ctx.config = ClientConfig {
            overload_retry_limit: 2,
            ..ClientConfig::immediate(5)
        };
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        assert_eq!(outcome.code, ErrorCode::ConnectionImpossible);
        assert_eq!(sessions.connect_count("hosta"), 3);
        let record = outcome.record.unwrap();
        assert_eq!(record.status, TransferStatus::InError);
    }

    #[tokio::test]
    async fn fatal_refusal_is_classified() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.script("hosta", vec![Scripted::Fatal(ErrorCode::BadAuthent)]);
        let mut ctx = fixture_context(sessions.clone(), tmp.path());
        ctx.config = ClientConfig::immediate(3);
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "a.csv")).await;

        assert_eq!(outcome.code, ErrorCode::BadAuthent);
        assert_eq!(sessions.connect_count("hosta"), 1);
    }

    #[tokio::test]
    async fn transfer_failure_reported_by_transport() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        sessions.fail_file("hosta", "bad.csv");
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.run(&send_request(&ctx, "bad.csv")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.code, ErrorCode::TransferError);
        let stored = ctx
            .store
            .load_by_id(&outcome.record.unwrap().key)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransferStatus::InError);
    }

    #[tokio::test]
    async fn unknown_rule_is_internal() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());
        let request = TransferRequest::builder("hosta")
            .rule("nope")
            .file("a.csv")
            .build(ctx.hosts.as_ref())
            .unwrap();

        let outcome = runner.run(&request).await;

        assert_eq!(outcome.code, ErrorCode::Internal);
        assert_eq!(sessions.connect_count("hosta"), 0);
    }

    #[tokio::test]
    async fn unknown_id_is_remotely_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());
        let request = TransferRequest::builder("hosta")
            .fixed_id(999)
            .build(ctx.hosts.as_ref())
            .unwrap();

        let outcome = runner.run(&request).await;

        assert_eq!(outcome.code, ErrorCode::QueryRemotelyUnknown);
    }

    #[tokio::test]
    async fn recovered_record_updates_file_info() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());
        let submitted = runner.submit(&send_request(&ctx, "a.csv"));
        let id = submitted.special_id().unwrap();

        let request = TransferRequest::builder("hosta")
            .fixed_id(id)
            .file_info("batch 7")
            .build(ctx.hosts.as_ref())
            .unwrap();
        let outcome = runner.run(&request).await;

        assert!(outcome.success, "{outcome:?}");
        let record = outcome.record.unwrap();
        assert_eq!(record.special_id(), id);
        assert_eq!(record.file_info, "batch 7");
        assert_eq!(record.filename, "a.csv");
    }

    #[tokio::test]
    async fn submit_uses_no_session() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());

        let outcome = runner.submit(&send_request(&ctx, "a.csv"));

        assert!(outcome.success);
        assert_eq!(outcome.code, ErrorCode::InitOk);
        assert_eq!(outcome.record.unwrap().status, TransferStatus::ToSubmit);
        assert!(sessions.events().is_empty());
    }

    #[tokio::test]
    async fn hash_request_switches_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), tmp.path());
        let runner = ClientRunner::new(ctx.clone());
        let request = TransferRequest::builder("hosta")
            .rule("out")
            .file("a.csv")
            .use_hash(true)
            .build(ctx.hosts.as_ref())
            .unwrap();

        let outcome = runner.submit(&request);

        assert_eq!(
            outcome.record.unwrap().mode,
            ferry_protocol::TransferMode::SendHash
        );
        // Nothing sent on the wire for a submit.
        assert!(!sessions
            .events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Send { packet: Packet::Data(_), .. })));
    }
}
