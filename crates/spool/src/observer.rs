//! Status pushes to observer hosts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ferry_client::ClientContext;
use ferry_protocol::messages::{NEED_FULL, SPOOLED_INFORM_TASK};
use ferry_protocol::{Answer, BusinessRequest, Packet};
use tracing::{debug, warn};

use crate::monitor::{FileItem, FileMonitor, MonitorStatus};

/// A summary built from the monitor, waiting to be sent.
pub(crate) struct PendingPush {
    observer: String,
    status: MonitorStatus,
    items: BTreeMap<PathBuf, FileItem>,
}

/// What an observer made of its summary.
pub(crate) struct PushResult {
    observer: String,
    items: BTreeMap<PathBuf, FileItem>,
    delivered: bool,
}

#[derive(Clone)]
pub(crate) struct ObserverPush {
    ctx: ClientContext,
    observers: Vec<String>,
}

impl ObserverPush {
    pub(crate) fn new(ctx: ClientContext, observers: Vec<String>) -> Self {
        Self { ctx, observers }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn prepare(&self, monitor: &FileMonitor) -> Vec<PendingPush> {
        let items = monitor.snapshot();
        self.observers
            .iter()
            .map(|observer| PendingPush {
                observer: observer.clone(),
                status: monitor.status_for(observer),
                items: items.clone(),
            })
            .collect()
    }

    /// Sends prepared summaries. The monitor is not needed, so this can run
    /// beside the watch loop.
    pub(crate) async fn send(&self, pending: Vec<PendingPush>) -> Vec<PushResult> {
        let mut results = Vec::with_capacity(pending.len());
        for push in pending {
            let delivered = self.deliver(&push.observer, &push.status).await;
            results.push(PushResult {
                observer: push.observer,
                items: push.items,
                delivered,
            });
        }
        results
    }

    /// An observer that failed or asked for a full view gets a full summary
    /// next time.
    pub(crate) fn apply(monitor: &mut FileMonitor, results: Vec<PushResult>) {
        for result in results {
            if result.delivered {
                monitor.mark_delivered(&result.observer, result.items);
            } else {
                monitor.force_full(&result.observer);
            }
        }
    }

    pub(crate) async fn push_all(&self, monitor: &mut FileMonitor) {
        let pending = self.prepare(monitor);
        let results = self.send(pending).await;
        Self::apply(monitor, results);
    }

    async fn deliver(&self, observer: &str, status: &MonitorStatus) -> bool {
        let json = match serde_json::to_string(status) {
            Ok(json) => json,
            Err(e) => {
                warn!(observer, error = %e, "cannot encode status");
                return false;
            }
        };
        let host = match self.ctx.hosts.lookup(observer) {
            Ok(host) => host,
            Err(e) => {
                warn!(observer, error = %e, "unknown observer");
                return false;
            }
        };

        let packet = Packet::Business(BusinessRequest::new(SPOOLED_INFORM_TASK, json));
        match self.ctx.exchange(&host, packet).await {
            Ok(answer) if answer.code.is_ok_step() && !asks_for_full(&answer) => {
                debug!(observer, full = status.full, items = status.items.len(), "status delivered");
                true
            }
            Ok(answer) => {
                debug!(observer, code = ?answer.code, "observer wants a full status");
                false
            }
            Err(e) => {
                warn!(observer, error = %e, "cannot inform observer");
                false
            }
        }
    }
}

fn asks_for_full(answer: &Answer) -> bool {
    [&answer.payload, &answer.message]
        .into_iter()
        .flatten()
        .any(|text| text.trim().eq_ignore_ascii_case(NEED_FULL))
}
