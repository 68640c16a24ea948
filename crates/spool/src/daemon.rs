//! The spooled-directory daemon.
//!
//! Lifecycle: `Initializing → Watching → {Dispatching → Watching}* →
//! Stopped`. The watch loop alone owns the [`FileMonitor`]; parallel
//! dispatches report back over a channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use ferry_client::{ClientContext, ClientRunner, RemoteControl, RunOutcome};
use ferry_protocol::ErrorCode;
use ferry_transfer::TransferRequest;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SpoolArguments;
use crate::error::SpoolError;
use crate::monitor::{FileItem, FileMonitor};
use crate::observer::{ObserverPush, PushResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Initializing,
    Watching,
    Dispatching,
    Stopped,
}

struct Shared {
    state: RwLock<DaemonState>,
    sent: AtomicU64,
    error: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: DaemonState) {
        *self.state.write().unwrap() = state;
    }
}

/// Control over a started daemon.
pub struct SpoolHandle {
    name: String,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

impl SpoolHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the daemon to stop after in-flight dispatches.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> DaemonState {
        *self.shared.state.read().unwrap()
    }

    /// Items dispatched successfully, one per (file, host).
    pub fn sent(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// Items that failed, one per (file, host).
    pub fn error(&self) -> u64 {
        self.shared.error.load(Ordering::Relaxed)
    }

    /// Waits for the daemon to stop.
    pub async fn join(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::failed(
                ErrorCode::Internal,
                format!("spool {} task failed: {e}", self.name),
                None,
                Instant::now(),
            ),
        }
    }
}

pub struct SpoolDaemon {
    args: SpoolArguments,
    ctx: ClientContext,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl SpoolDaemon {
    pub fn new(args: SpoolArguments, ctx: ClientContext) -> Self {
        Self {
            args,
            ctx,
            shared: Arc::new(Shared {
                state: RwLock::new(DaemonState::Initializing),
                sent: AtomicU64::new(0),
                error: AtomicU64::new(0),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the daemon on the current runtime.
    pub fn start(self) -> SpoolHandle {
        let name = self.args.name.clone();
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());
        SpoolHandle {
            name,
            shared,
            cancel,
            task,
        }
    }

    /// Runs until the stop file appears or the daemon is stopped.
    pub async fn run(self) -> RunOutcome {
        let started = Instant::now();
        self.shared.set_state(DaemonState::Initializing);
        let outcome = self.watch(started).await;
        self.shared.set_state(DaemonState::Stopped);

        let sent = self.shared.sent.load(Ordering::Relaxed);
        let errors = self.shared.error.load(Ordering::Relaxed);
        if outcome.success {
            info!(spool = %self.args.name, sent, errors, "spool stopped");
        } else {
            error!(
                spool = %self.args.name,
                code = ?outcome.code,
                cause = outcome.cause.as_deref().unwrap_or_default(),
                "spool cannot run"
            );
        }
        outcome
    }

    fn validate(&self) -> Result<(), SpoolError> {
        self.args.validate()?;
        let rule = self.ctx.rules.resolve(&self.args.rule)?;
        if !rule.is_send_capable() {
            return Err(SpoolError::InvalidConfig(format!(
                "rule {} cannot send",
                rule.name
            )));
        }
        Ok(())
    }

    async fn watch(&self, started: Instant) -> RunOutcome {
        let internal = |cause: String| RunOutcome::failed(ErrorCode::Internal, cause, None, started);

        if let Err(e) = self.validate() {
            return internal(e.to_string());
        }
        if self.args.stop_file.exists() {
            info!(spool = %self.args.name, stop_file = %self.args.stop_file.display(), "stop file present, nothing to do");
            return RunOutcome::succeeded(ErrorCode::CompleteOk, None, started);
        }
        if let Some(dir) = self.args.directories.iter().find(|dir| !dir.is_dir()) {
            return internal(format!("{} is not a directory", dir.display()));
        }
        let mut monitor = match FileMonitor::new(&self.args) {
            Ok(monitor) => monitor,
            Err(e) => return internal(e.to_string()),
        };
        match monitor.acquire_lock(&self.cancel).await {
            Ok(true) => {}
            Ok(false) => {
                info!(spool = %self.args.name, "stopped while waiting for the lock");
                return RunOutcome::succeeded(ErrorCode::CompleteOk, None, started);
            }
            Err(e) => return internal(e.to_string()),
        }

        let dispatcher = Dispatcher {
            ctx: self.ctx.clone(),
            runner: ClientRunner::new(self.ctx.clone()),
            control: RemoteControl::new(self.ctx.clone()),
            args: Arc::new(self.args.clone()),
            shared: Arc::clone(&self.shared),
        };
        let observers = ObserverPush::new(self.ctx.clone(), self.args.observer_hosts.clone());
        let parallel = self.args.parallel && self.args.limit_parallel != 1;
        let permits = (parallel && self.args.limit_parallel > 1)
            .then(|| Arc::new(Semaphore::new(self.args.limit_parallel)));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<DispatchResult>();
        let mut workers = JoinSet::new();
        let mut observer_task: Option<JoinHandle<Vec<PushResult>>> = None;

        let mut tick = tokio::time::interval(self.args.elapse());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut observer_tick = tokio::time::interval(self.args.elapse_observer());
        observer_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.shared.set_state(DaemonState::Watching);
        info!(
            spool = %self.args.name,
            directories = self.args.directories.len(),
            hosts = ?self.args.hosts,
            submit_only = self.args.submit_only,
            parallel,
            "watching"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(spool = %self.args.name, "stop requested");
                    break;
                }
                _ = tick.tick() => {
                    if self.args.stop_file.exists() {
                        info!(spool = %self.args.name, "stop file found");
                        break;
                    }
                    if let Err(e) = monitor.refresh_lock() {
                        warn!(spool = %self.args.name, error = %e, "cannot refresh lock");
                    }

                    let valid = monitor.scan();
                    if !valid.is_empty() {
                        self.shared.set_state(DaemonState::Dispatching);
                        for item in valid {
                            if parallel {
                                let dispatcher = dispatcher.clone();
                                let results = results_tx.clone();
                                let permits = permits.clone();
                                workers.spawn(async move {
                                    let _permit = match permits {
                                        Some(permits) => permits.acquire_owned().await.ok(),
                                        None => None,
                                    };
                                    let _ = results.send(dispatcher.dispatch(item).await);
                                });
                            } else {
                                let result = dispatcher.dispatch(item).await;
                                monitor.finalize_valid_file(&result.path, result.success, result.special_id);
                            }
                        }
                        self.shared.set_state(DaemonState::Watching);
                    }

                    if let Err(e) = monitor.save_status() {
                        warn!(spool = %self.args.name, error = %e, "cannot save status");
                    }
                }
                _ = observer_tick.tick(), if !observers.is_empty() => {
                    if observer_task.is_some() {
                        debug!(spool = %self.args.name, "previous status push still running");
                        continue;
                    }
                    let pending = observers.prepare(&monitor);
                    if parallel {
                        let observers = observers.clone();
                        observer_task = Some(tokio::spawn(async move { observers.send(pending).await }));
                    } else {
                        let sent = tokio::select! {
                            results = observers.send(pending) => Some(results),
                            _ = self.cancel.cancelled() => None,
                        };
                        match sent {
                            Some(results) => ObserverPush::apply(&mut monitor, results),
                            None => {
                                info!(spool = %self.args.name, "stop requested");
                                break;
                            }
                        }
                    }
                }
                Some(joined) = async {
                    match observer_task.as_mut() {
                        Some(task) => Some(task.await),
                        None => None,
                    }
                }, if observer_task.is_some() => {
                    observer_task = None;
                    match joined {
                        Ok(results) => ObserverPush::apply(&mut monitor, results),
                        Err(e) => error!(spool = %self.args.name, error = %e, "status push task failed"),
                    }
                }
                Some(result) = results_rx.recv() => {
                    monitor.finalize_valid_file(&result.path, result.success, result.special_id);
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        error!(spool = %self.args.name, error = %e, "dispatch task failed");
                    }
                }
            }
        }

        if let Some(task) = observer_task.take() {
            task.abort();
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(spool = %self.args.name, error = %e, "dispatch task failed");
            }
        }
        while let Ok(result) = results_rx.try_recv() {
            monitor.finalize_valid_file(&result.path, result.success, result.special_id);
        }
        if !observers.is_empty() {
            let last_push = tokio::time::timeout(self.args.elapse_observer(), observers.push_all(&mut monitor));
            if last_push.await.is_err() {
                warn!(spool = %self.args.name, "last status push timed out");
            }
        }
        if let Err(e) = monitor.save_status() {
            warn!(spool = %self.args.name, error = %e, "cannot save status");
        }
        monitor.release_lock();

        RunOutcome::succeeded(ErrorCode::CompleteOk, None, started)
    }
}

struct DispatchResult {
    path: PathBuf,
    success: bool,
    special_id: Option<i64>,
}

/// Sends one valid file to every configured host.
#[derive(Clone)]
struct Dispatcher {
    ctx: ClientContext,
    runner: ClientRunner,
    control: RemoteControl,
    args: Arc<SpoolArguments>,
    shared: Arc<Shared>,
}

impl Dispatcher {
    async fn dispatch(&self, item: FileItem) -> DispatchResult {
        let file = item.path.to_string_lossy().into_owned();
        // A record id only identifies the transfer to a single partner.
        let known_id = match self.args.hosts.len() {
            1 => item.special_id,
            _ => None,
        };

        let mut success = true;
        let mut special_id = None;
        for host in &self.args.hosts {
            let outcome = if self.args.submit_only {
                self.submit(host, &file, known_id)
            } else if let Some(id) = known_id {
                self.resubmit(host, &file, id).await
            } else {
                self.run_fresh(host, &file).await
            };

            if outcome.success {
                self.shared.sent.fetch_add(1, Ordering::Relaxed);
                debug!(spool = %self.args.name, host, file, code = ?outcome.code, "item sent");
            } else {
                self.shared.error.fetch_add(1, Ordering::Relaxed);
                success = false;
                let cause = outcome.cause.as_deref().unwrap_or_default();
                if self.args.log_as_warn {
                    warn!(spool = %self.args.name, host, file, code = ?outcome.code, cause, "item failed");
                } else {
                    error!(spool = %self.args.name, host, file, code = ?outcome.code, cause, "item failed");
                }
            }
            special_id = outcome.special_id().or(special_id);
        }

        DispatchResult {
            path: item.path,
            success,
            special_id,
        }
    }

    fn request(&self, host: &str, file: &str, fixed_id: Option<i64>) -> Result<TransferRequest, RunOutcome> {
        let mut builder = TransferRequest::builder(host)
            .rule(self.args.rule.clone())
            .file(file)
            .file_info(self.args.file_info.clone())
            .block_size(self.args.block_size)
            .use_hash(self.args.use_hash)
            .no_log(self.args.no_log)
            .log_as_warn(self.args.log_as_warn);
        if let Some(id) = fixed_id {
            builder = builder.fixed_id(id);
        }
        builder.build(self.ctx.hosts.as_ref()).map_err(|e| {
            RunOutcome::failed(ErrorCode::Internal, e.to_string(), None, Instant::now())
        })
    }

    /// Registers the file for a server to pick up. A known record is
    /// reused unless it is gone or already done.
    fn submit(&self, host: &str, file: &str, known_id: Option<i64>) -> RunOutcome {
        if let Some(id) = known_id {
            let outcome = match self.request(host, file, Some(id)) {
                Ok(request) => self.runner.submit(&request),
                Err(outcome) => return outcome,
            };
            if outcome.success
                || !matches!(
                    outcome.code,
                    ErrorCode::QueryRemotelyUnknown | ErrorCode::QueryAlreadyFinished
                )
            {
                return outcome;
            }
            debug!(host, file, special_id = id, "previous record not reusable");
        }
        match self.request(host, file, None) {
            Ok(request) => self.runner.submit(&request),
            Err(outcome) => outcome,
        }
    }

    /// A file seen before: restart its transfer. Only when the restart
    /// fails is the old transfer canceled and a new one started.
    async fn resubmit(&self, host: &str, file: &str, special_id: i64) -> RunOutcome {
        let hosts = self.ctx.hosts.as_ref();
        let requester = match hosts.lookup(&hosts.resolve_alias(host)) {
            Ok(entry) => hosts.local_host_id(entry.use_tls),
            Err(_) => return self.run_fresh(host, file).await,
        };

        let restarted = self.control.restart(special_id, host, &requester, None).await;
        if restarted.success {
            return restarted;
        }
        warn!(host, file, special_id, code = ?restarted.code, "restart failed, canceling");
        let canceled = self.control.cancel(special_id, host, &requester).await;
        debug!(host, special_id, code = ?canceled.code, "previous transfer canceled");
        self.run_fresh(host, file).await
    }

    async fn run_fresh(&self, host: &str, file: &str) -> RunOutcome {
        match self.request(host, file, None) {
            Ok(request) => self.runner.run(&request).await,
            Err(outcome) => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_client::testing::{MockSessions, fixture_context};
    use ferry_protocol::{ControlKind, Packet, TransferStatus};
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    struct Fixture {
        watch: tempfile::TempDir,
        state: tempfile::TempDir,
        sessions: Arc<MockSessions>,
        ctx: ClientContext,
    }

    fn fixture() -> Fixture {
        let watch = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        let sessions = Arc::new(MockSessions::new());
        let ctx = fixture_context(sessions.clone(), watch.path());
        Fixture {
            watch,
            state,
            sessions,
            ctx,
        }
    }

    impl Fixture {
        fn args(&self, hosts: &[&str]) -> SpoolArguments {
            let mut args = SpoolArguments::new(
                "outbox",
                vec![self.watch.path().to_path_buf()],
                self.state.path().join("outbox.status"),
                self.state.path().join("stop"),
                "out",
                hosts.iter().map(|h| h.to_string()).collect(),
            );
            args.elapse_ms = 10;
            args.elapse_observer_ms = 20;
            args
        }

        fn drop_file(&self, name: &str) -> String {
            let path = self.watch.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path.to_string_lossy().into_owned()
        }
    }

    async fn wait_until(handle: &SpoolHandle, done: impl Fn(&SpoolHandle) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(handle) {
            assert!(Instant::now() < deadline, "daemon made no progress");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn lock_path(args: &SpoolArguments) -> PathBuf {
        let mut name = args.status_file.clone().into_os_string();
        name.push(".chk");
        PathBuf::from(name)
    }

    #[tokio::test]
    async fn stop_file_at_start_is_immediate_success() {
        let f = fixture();
        let args = f.args(&["hosta"]);
        std::fs::write(&args.stop_file, b"").unwrap();
        f.drop_file("a.txt");

        let outcome = SpoolDaemon::new(args.clone(), f.ctx.clone()).run().await;

        assert!(outcome.success);
        assert!(f.sessions.events().is_empty());
        assert!(f.ctx.store.list().unwrap().is_empty());
        assert!(!lock_path(&args).exists());
    }

    #[tokio::test]
    async fn invalid_setup_fails_fast() {
        let f = fixture();

        let mut missing_dir = f.args(&["hosta"]);
        missing_dir.directories.push(f.state.path().join("absent"));
        let outcome = SpoolDaemon::new(missing_dir, f.ctx.clone()).run().await;
        assert_eq!(outcome.code, ErrorCode::Internal);

        let mut receive_rule = f.args(&["hosta"]);
        receive_rule.rule = "in".into();
        let outcome = SpoolDaemon::new(receive_rule, f.ctx.clone()).run().await;
        assert_eq!(outcome.code, ErrorCode::Internal);

        let mut status_dir = f.args(&["hosta"]);
        status_dir.status_file = f.state.path().to_path_buf();
        let outcome = SpoolDaemon::new(status_dir, f.ctx.clone()).run().await;
        assert_eq!(outcome.code, ErrorCode::Internal);
    }

    #[tokio::test]
    async fn submit_only_spool_registers_files() {
        let f = fixture();
        let args = f.args(&["hosta"]);
        f.drop_file("a.txt");
        f.drop_file("b.txt");

        let handle = SpoolDaemon::new(args.clone(), f.ctx.clone()).start();
        wait_until(&handle, |h| h.sent() >= 2).await;
        assert!(lock_path(&args).exists());
        handle.stop();
        let outcome = handle.join().await;

        assert!(outcome.success);
        let records = f.ctx.store.list().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == TransferStatus::ToSubmit));
        assert!(f.sessions.events().is_empty());
        assert!(args.status_file.exists());
        assert!(!lock_path(&args).exists());
    }

    #[tokio::test]
    async fn direct_dispatch_counts_each_host() {
        let f = fixture();
        let mut args = f.args(&["hosta", "hostb"]);
        args.submit_only = false;
        let file = f.drop_file("a.txt");
        f.sessions.fail_file("hostb", &file);

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        wait_until(&handle, |h| h.sent() + h.error() >= 2).await;
        handle.stop();

        assert_eq!(handle.sent(), 1);
        assert_eq!(handle.error(), 1);
        let outcome = handle.join().await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn stop_file_ends_watch() {
        let f = fixture();
        let args = f.args(&["hosta"]);
        let handle = SpoolDaemon::new(args.clone(), f.ctx.clone()).start();
        wait_until(&handle, |h| h.state() == DaemonState::Watching).await;

        std::fs::write(&args.stop_file, b"").unwrap();
        let outcome = handle.join().await;

        assert!(outcome.success);
        assert!(!lock_path(&args).exists());
    }

    fn cancels_to(sessions: &MockSessions, host: &str) -> usize {
        sessions
            .requests_to(host)
            .into_iter()
            .filter(|p| matches!(p, Packet::Control { kind: ControlKind::Cancel, .. }))
            .count()
    }

    #[tokio::test]
    async fn failed_file_restarts_then_cancels_and_resends() {
        let f = fixture();
        let mut args = f.args(&["hosta"]);
        args.submit_only = false;
        args.parallel = false;
        let file = f.drop_file("a.txt");
        f.sessions.fail_file("hosta", &file);

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        wait_until(&handle, |h| h.error() >= 1).await;
        assert_eq!(f.ctx.store.list().unwrap().len(), 1);

        // No change to the file: the failure alone brings it back.
        wait_until(&handle, |h| h.error() >= 2).await;
        handle.stop();
        handle.join().await;

        assert!(cancels_to(&f.sessions, "hosta") >= 1);
        // First run, local restart, cancel exchange, fresh run.
        assert!(f.sessions.connect_count("hosta") >= 4);
        let records = f.ctx.store.list().unwrap();
        assert!(records.len() >= 2);
        assert!(records.iter().any(|r| r.error_code == ErrorCode::CanceledTransfer));
    }

    #[tokio::test]
    async fn finished_restart_sends_nothing_new() {
        let f = fixture();
        let mut args = f.args(&["hosta"]);
        args.submit_only = false;
        args.parallel = false;
        let file = f.drop_file("a.txt");

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        wait_until(&handle, |h| h.sent() >= 1).await;
        assert_eq!(f.sessions.connect_count("hosta"), 1);

        let changed = std::fs::File::options().write(true).open(&file).unwrap();
        changed
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        wait_until(&handle, |h| h.sent() >= 2).await;
        assert_eq!(handle.error(), 0);
        handle.stop();
        let outcome = handle.join().await;

        assert!(outcome.success);
        assert_eq!(f.sessions.connect_count("hosta"), 1);
        assert_eq!(cancels_to(&f.sessions, "hosta"), 0);
        assert_eq!(f.ctx.store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_while_waiting_for_lock() {
        let f = fixture();
        let mut args = f.args(&["hosta"]);
        args.elapse_ms = 60_000;
        std::fs::write(lock_path(&args), b"").unwrap();

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.join())
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(f.sessions.events().is_empty());
    }

    #[tokio::test]
    async fn observers_get_status_until_stop() {
        let f = fixture();
        let mut args = f.args(&["hosta"]);
        args.observer_hosts = vec!["hostb".into()];
        f.drop_file("a.txt");

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        wait_until(&handle, |_| !f.sessions.requests_to("hostb").is_empty()).await;
        handle.stop();
        handle.join().await;

        let pushes = f.sessions.requests_to("hostb");
        assert!(pushes.len() >= 2, "periodic and final pushes");
        assert!(pushes.iter().all(|p| matches!(p, Packet::Business(_))));
    }

    #[tokio::test]
    async fn slow_observer_does_not_hold_back_stop() {
        for parallel in [false, true] {
            let f = fixture();
            let mut args = f.args(&["hosta"]);
            args.observer_hosts = vec!["hostb".into()];
            args.parallel = parallel;
            f.sessions.delay_requests("hostb", Duration::from_millis(300));

            let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
            wait_until(&handle, |h| h.state() == DaemonState::Watching).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
            let outcome = tokio::time::timeout(Duration::from_secs(2), handle.join())
                .await
                .unwrap();

            assert!(outcome.success, "parallel = {parallel}");
        }
    }

    #[tokio::test]
    async fn scanning_goes_on_while_observer_is_slow() {
        let f = fixture();
        let mut args = f.args(&["hosta"]);
        args.observer_hosts = vec!["hostb".into()];
        args.parallel = true;
        f.sessions.delay_requests("hostb", Duration::from_secs(30));

        let handle = SpoolDaemon::new(args, f.ctx.clone()).start();
        wait_until(&handle, |h| h.state() == DaemonState::Watching).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.drop_file("late.txt");
        wait_until(&handle, |h| h.sent() >= 1).await;
        handle.stop();
        handle.join().await;
    }

    #[test]
    fn lock_path_matches_monitor() {
        let f = fixture();
        let args = f.args(&["hosta"]);
        let monitor = FileMonitor::new(&args).unwrap();
        assert_eq!(monitor.lock_file(), Path::new(&lock_path(&args)));
    }
}
