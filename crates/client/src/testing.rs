//! In-memory collaborators for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ferry_protocol::{Answer, ErrorCode, Packet, TransferMode, TransferStatus};
use ferry_transfer::{
    HostEntry, MemoryStore, RecordDraft, Rule, StaticHosts, StaticRules, TransferRecord,
};
use tokio::sync::Semaphore;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::runner::ClientContext;
use crate::session::{
    Completion, ConnectAttempt, ConnectRequest, Session, SessionFuture, SessionHandle, ThroughRole,
};

/// Scripted connection result, consumed before the default `Connected`.
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Pending,
    Overloaded,
    Fatal(ErrorCode),
}

/// Everything the mock transport observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connect { host: String },
    Send { host: String, packet: Packet },
    Writable { host: String },
    AwaitCompletion { host: String },
    Request { host: String, packet: Packet },
    Close { host: String },
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, VecDeque<Scripted>>,
    failing: HashSet<(String, String)>,
    answers: HashMap<String, VecDeque<Answer>>,
    delays: HashMap<String, Duration>,
    inbound: Vec<Vec<u8>>,
    events: Vec<SessionEvent>,
}

struct MockShared {
    state: Mutex<MockState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    completion_rank: u32,
}

impl MockShared {
    fn log(&self, event: SessionEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

/// Session handle backed by scripts instead of sockets.
pub struct MockSessions {
    shared: Arc<MockShared>,
}

impl Default for MockSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessions {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MockShared {
                state: Mutex::new(MockState::default()),
                gate: Mutex::new(None),
                completion_rank: 4,
            }),
        }
    }

    /// Queues connection results for `host`.
    pub fn script(&self, host: &str, results: Vec<Scripted>) {
        let mut state = self.shared.state.lock().unwrap();
        state
            .scripts
            .entry(host.to_string())
            .or_default()
            .extend(results);
    }

    /// Makes every transfer of `file` to `host` complete in error.
    pub fn fail_file(&self, host: &str, file: &str) {
        self.shared
            .state
            .lock()
            .unwrap()
            .failing
            .insert((host.to_string(), file.to_string()));
    }

    /// Queues an answer for the next one-shot request to `host`. Without a
    /// queued answer, requests are answered with `CompleteOk`.
    pub fn answer(&self, host: &str, answer: Answer) {
        self.shared
            .state
            .lock()
            .unwrap()
            .answers
            .entry(host.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Holds every one-shot request to `host` for `delay` before answering.
    pub fn delay_requests(&self, host: &str, delay: Duration) {
        self.shared
            .state
            .lock()
            .unwrap()
            .delays
            .insert(host.to_string(), delay);
    }

    /// Blocks delivered to receive-through handlers on completion.
    pub fn feed_inbound(&self, blocks: Vec<Vec<u8>>) {
        self.shared.state.lock().unwrap().inbound = blocks;
    }

    /// `writable()` takes one permit from `gate` per call.
    pub fn gate_writes(&self, gate: Arc<Semaphore>) {
        *self.shared.gate.lock().unwrap() = Some(gate);
    }

    pub fn completion_rank(&self) -> u32 {
        self.shared.completion_rank
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.shared.state.lock().unwrap().events.clone()
    }

    pub fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
        self.shared
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| pred(e))
            .count()
    }

    pub fn connect_count(&self, host: &str) -> usize {
        self.count(|e| matches!(e, SessionEvent::Connect { host: h } if h == host))
    }

    /// Packets sent to `host` with `request`, in order.
    pub fn requests_to(&self, host: &str) -> Vec<Packet> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Request { host: h, packet } if h == host => Some(packet),
                _ => None,
            })
            .collect()
    }
}

impl SessionHandle for MockSessions {
    fn connect(&self, request: ConnectRequest) -> SessionFuture<'_, ConnectAttempt> {
        Box::pin(async move {
            let host = request.host.host_id.clone();
            let (scripted, failing) = {
                let mut state = self.shared.state.lock().unwrap();
                state.events.push(SessionEvent::Connect { host: host.clone() });
                let scripted = state.scripts.get_mut(&host).and_then(|q| q.pop_front());
                let failing = request.record.as_ref().is_some_and(|r| {
                    state
                        .failing
                        .contains(&(host.clone(), r.filename.clone()))
                });
                (scripted, failing)
            };

            match scripted {
                Some(Scripted::Pending) => ConnectAttempt::Pending(format!("{host} unreachable")),
                Some(Scripted::Overloaded) => ConnectAttempt::Overloaded,
                Some(Scripted::Fatal(code)) => ConnectAttempt::Fatal {
                    code,
                    message: format!("{host} refused"),
                },
                None => ConnectAttempt::Connected(Box::new(MockSession {
                    host,
                    failing,
                    through: request.through,
                    shared: Arc::clone(&self.shared),
                })),
            }
        })
    }
}

struct MockSession {
    host: String,
    failing: bool,
    through: ThroughRole,
    shared: Arc<MockShared>,
}

impl Session for MockSession {
    fn send(&mut self, packet: Packet, _flush: bool) -> SessionFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.shared.log(SessionEvent::Send {
                host: self.host.clone(),
                packet,
            });
            Ok(())
        })
    }

    fn writable(&mut self) -> SessionFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            let gate = self.shared.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.acquire().await.map_err(|_| ClientError::Closed)?.forget();
            }
            self.shared.log(SessionEvent::Writable {
                host: self.host.clone(),
            });
            Ok(())
        })
    }

    fn await_completion(
        &mut self,
        _timeout: Option<Duration>,
    ) -> SessionFuture<'_, Result<Completion, ClientError>> {
        Box::pin(async move {
            self.shared.log(SessionEvent::AwaitCompletion {
                host: self.host.clone(),
            });
            if let ThroughRole::Recv(handler) = &self.through {
                let blocks = self.shared.state.lock().unwrap().inbound.clone();
                let mut handler = handler.lock().await;
                for block in &blocks {
                    if let Err(e) = handler.write_bytes(block) {
                        return Ok(Completion::failed(ErrorCode::TransferError, e.to_string()));
                    }
                }
            }
            if self.failing {
                Ok(Completion::failed(ErrorCode::TransferError, "scripted failure"))
            } else {
                Ok(Completion::ok(self.shared.completion_rank))
            }
        })
    }

    fn request(
        &mut self,
        packet: Packet,
        _timeout: Duration,
    ) -> SessionFuture<'_, Result<Answer, ClientError>> {
        Box::pin(async move {
            let delay = self.shared.state.lock().unwrap().delays.get(&self.host).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.shared.state.lock().unwrap();
            state.events.push(SessionEvent::Request {
                host: self.host.clone(),
                packet,
            });
            let answer = state
                .answers
                .get_mut(&self.host)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Answer::new(ErrorCode::CompleteOk));
            Ok(answer)
        })
    }

    fn close(&mut self) -> SessionFuture<'_, ()> {
        Box::pin(async move {
            self.shared.log(SessionEvent::Close {
                host: self.host.clone(),
            });
        })
    }
}

/// Hosts: `hosta`, `hostb` (JSON), `hostc` (legacy text), `laptop`
/// (client only). Local ids: `local` / `local-tls`.
pub fn fixture_hosts() -> StaticHosts {
    let mut legacy = HostEntry::server("hostc", "10.0.0.3:6666");
    legacy.use_json = false;
    StaticHosts::new("local", "local-tls")
        .with_host(HostEntry::server("hosta", "10.0.0.1:6666"))
        .with_host(HostEntry::server("hostb", "10.0.0.2:6666"))
        .with_host(legacy)
        .with_host(HostEntry::client_only("laptop"))
        .with_alias("primary", "hosta")
}

/// Rules: `out` (send from `send_dir`), `in` (receive), `out-hash`.
pub fn fixture_rules(send_dir: &Path) -> StaticRules {
    StaticRules::new(vec![
        Rule {
            name: "out".into(),
            mode: TransferMode::Send,
            send_path: send_dir.to_path_buf(),
            recv_path: send_dir.join("in"),
        },
        Rule {
            name: "in".into(),
            mode: TransferMode::Recv,
            send_path: send_dir.to_path_buf(),
            recv_path: send_dir.join("in"),
        },
        Rule {
            name: "out-hash".into(),
            mode: TransferMode::SendHash,
            send_path: send_dir.to_path_buf(),
            recv_path: send_dir.join("in"),
        },
    ])
}

/// Draft of a plain send from `requester` to `requested`.
pub fn draft(requester: &str, requested: &str, filename: &str) -> RecordDraft {
    RecordDraft {
        requester: requester.into(),
        requested: requested.into(),
        rule: "out".into(),
        filename: filename.into(),
        mode: TransferMode::Send,
        is_sender: true,
        block_size: ferry_transfer::DEFAULT_BLOCK_SIZE,
        file_info: ferry_transfer::NO_INFO.into(),
        follow_id: None,
        original_size: -1,
        start_time: None,
        status: TransferStatus::ToSubmit,
    }
}

/// A record as a partner would hold it, built outside any shared store.
pub fn detached_record(requester: &str, requested: &str, filename: &str) -> TransferRecord {
    use ferry_transfer::RecordStore;
    let store = MemoryStore::new();
    store
        .create(draft(requester, requested, filename))
        .expect("memory store accepts drafts")
}

/// Context over `sessions`, a fresh memory store and the fixtures above,
/// with no sleeping between attempts.
pub fn fixture_context(sessions: Arc<MockSessions>, send_dir: &Path) -> ClientContext {
    ClientContext::new(
        sessions,
        Arc::new(MemoryStore::new()),
        Arc::new(fixture_rules(send_dir)),
        Arc::new(fixture_hosts()),
    )
    .with_config(ClientConfig::immediate(3))
}
