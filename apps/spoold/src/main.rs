//! Ferry spooled-directory daemon entry point.
//!
//! Usage: `ferry-spoold <config.json>`. Every configured spool runs until
//! its stop file appears or the process receives Ctrl-C. The exit status
//! is 0 when every spool ended cleanly, otherwise the first failure's code.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ferry_client::{ClientContext, DetachedSessions, EXIT_BAD_ARGUMENTS, EXIT_UNEXPECTED, RunOutcome};
use ferry_spool::{SpoolConfigFile, SpoolDaemon};
use ferry_transfer::JsonFileStore;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: ferry-spoold <config.json>");
        std::process::exit(EXIT_BAD_ARGUMENTS);
    };

    let config = match SpoolConfigFile::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot load configuration");
            std::process::exit(EXIT_BAD_ARGUMENTS);
        }
    };

    std::process::exit(exit_status(run(config)));
}

/// Arguments were already accepted, so a failure here is unexpected.
fn exit_status(result: anyhow::Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "spool daemon failed");
            EXIT_UNEXPECTED
        }
    }
}

fn run(config: SpoolConfigFile) -> anyhow::Result<i32> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host_id = %config.host_id,
        spools = config.spools.len(),
        "starting Ferry spool daemon"
    );

    let store = JsonFileStore::open(config.record_store.clone())
        .with_context(|| format!("opening record store {}", config.record_store.display()))?;
    // The wire transport is provided by the embedding deployment; standalone
    // runs can still register submit-only transfers.
    let ctx = ClientContext::new(
        Arc::new(DetachedSessions),
        Arc::new(store),
        Arc::new(config.rule_table()),
        Arc::new(config.host_directory()),
    )
    .with_config(config.client_config());

    let rt = tokio::runtime::Runtime::new()?;
    let outcomes = rt.block_on(async move {
        let handles: Vec<_> = config
            .spools
            .into_iter()
            .map(|args| SpoolDaemon::new(args, ctx.clone()).start())
            .collect();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping spools");
                handles.iter().for_each(|h| h.stop());
            }
            _ = wait_all_stopped(&handles) => {}
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            outcomes.push((name, handle.join().await));
        }
        outcomes
    });

    let mut code = 0;
    for (name, outcome) in &outcomes {
        report(name, outcome);
        if code == 0 && !outcome.success {
            code = outcome.exit_code();
        }
    }
    Ok(code)
}

async fn wait_all_stopped(handles: &[ferry_spool::SpoolHandle]) {
    let mut tick = tokio::time::interval(std::time::Duration::from_millis(500));
    loop {
        tick.tick().await;
        if handles.iter().all(|h| h.state() == ferry_spool::DaemonState::Stopped) {
            return;
        }
    }
}

fn report(name: &str, outcome: &RunOutcome) {
    if outcome.success {
        tracing::info!(spool = name, duration_ms = outcome.duration_ms() as u64, "spool ended");
    } else {
        tracing::error!(
            spool = name,
            code = ?outcome.code,
            cause = outcome.cause.as_deref().unwrap_or_default(),
            "spool failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_failure_is_unexpected() {
        let failed = Err(anyhow::anyhow!("opening record store /nowhere"));
        assert_eq!(exit_status(failed), EXIT_UNEXPECTED);
        assert_ne!(exit_status(Err(anyhow::anyhow!("boom"))), EXIT_BAD_ARGUMENTS);
        assert_eq!(exit_status(Ok(0)), 0);
    }
}
