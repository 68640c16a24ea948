//! Spool job arguments and the daemon's configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_client::{BackoffConfig, ClientConfig};
use ferry_transfer::{DEFAULT_BLOCK_SIZE, HostEntry, NO_INFO, Rule, StaticHosts, StaticRules};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SpoolError;

fn default_elapse_ms() -> u64 {
    1000
}

fn default_elapse_observer_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_file_info() -> String {
    NO_INFO.to_string()
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

/// One configured spool job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpoolArguments {
    pub name: String,
    pub directories: Vec<PathBuf>,
    /// Persisted monitor state. Its lock is `<statusFile>.chk`.
    pub status_file: PathBuf,
    /// Empty means "use the configuration file's default".
    #[serde(default)]
    pub stop_file: PathBuf,
    pub rule: String,
    pub hosts: Vec<String>,
    /// Filter on file names.
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub minimal_size: u64,
    #[serde(default = "default_elapse_ms")]
    pub elapse_ms: u64,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Concurrent dispatches when `parallel` is set: 0 is unbounded, 1 runs
    /// inline.
    #[serde(default)]
    pub limit_parallel: usize,
    #[serde(default = "default_true")]
    pub submit_only: bool,
    #[serde(default)]
    pub observer_hosts: Vec<String>,
    #[serde(default = "default_elapse_observer_ms")]
    pub elapse_observer_ms: u64,
    #[serde(default = "default_file_info")]
    pub file_info: String,
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    #[serde(default)]
    pub use_hash: bool,
    #[serde(default)]
    pub no_log: bool,
    #[serde(default = "default_true")]
    pub log_as_warn: bool,
}

impl SpoolArguments {
    /// Arguments with every optional setting at its default.
    pub fn new(
        name: impl Into<String>,
        directories: Vec<PathBuf>,
        status_file: impl Into<PathBuf>,
        stop_file: impl Into<PathBuf>,
        rule: impl Into<String>,
        hosts: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            directories,
            status_file: status_file.into(),
            stop_file: stop_file.into(),
            rule: rule.into(),
            hosts,
            regex: None,
            minimal_size: 0,
            elapse_ms: default_elapse_ms(),
            recursive: false,
            parallel: true,
            limit_parallel: 0,
            submit_only: true,
            observer_hosts: Vec::new(),
            elapse_observer_ms: default_elapse_observer_ms(),
            file_info: default_file_info(),
            block_size: DEFAULT_BLOCK_SIZE,
            use_hash: false,
            no_log: false,
            log_as_warn: true,
        }
    }

    pub fn elapse(&self) -> Duration {
        Duration::from_millis(self.elapse_ms)
    }

    pub fn elapse_observer(&self) -> Duration {
        Duration::from_millis(self.elapse_observer_ms)
    }

    /// Checks what can be checked without touching the watched directories.
    pub fn validate(&self) -> Result<(), SpoolError> {
        let invalid = |msg: String| Err(SpoolError::InvalidConfig(format!("{}: {msg}", self.name)));

        if self.directories.is_empty() {
            return invalid("no directory to watch".into());
        }
        if self.hosts.is_empty() {
            return invalid("no destination host".into());
        }
        if self.rule.is_empty() {
            return invalid("no rule".into());
        }
        if self.elapse_ms == 0 || self.elapse_observer_ms == 0 {
            return invalid("polling intervals must be positive".into());
        }
        if self.status_file.as_os_str().is_empty() || self.status_file.is_dir() {
            return invalid(format!("bad status file {}", self.status_file.display()));
        }
        if self.stop_file.as_os_str().is_empty() || self.stop_file.is_dir() {
            return invalid(format!("bad stop file {}", self.stop_file.display()));
        }
        if let Some(pattern) = &self.regex {
            regex::Regex::new(pattern)?;
        }
        Ok(())
    }
}

/// Retry and timeout settings as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub retry_limit: u32,
    pub overload_retry_limit: u32,
    pub overload_backoff_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_factor: f64,
    pub completion_timeout_ms: Option<u64>,
    pub request_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let config = ClientConfig::default();
        Self {
            retry_limit: config.retry_limit,
            overload_retry_limit: config.overload_retry_limit,
            overload_backoff_ms: config.overload_backoff.as_millis() as u64,
            reconnect_initial_ms: config.reconnect.initial_delay.as_millis() as u64,
            reconnect_max_ms: config.reconnect.max_delay.as_millis() as u64,
            reconnect_factor: config.reconnect.backoff_factor,
            completion_timeout_ms: config.completion_timeout.map(|d| d.as_millis() as u64),
            request_timeout_ms: config.request_timeout.as_millis() as u64,
        }
    }
}

impl ClientSettings {
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            retry_limit: self.retry_limit,
            overload_retry_limit: self.overload_retry_limit,
            overload_backoff: Duration::from_millis(self.overload_backoff_ms),
            reconnect: BackoffConfig {
                initial_delay: Duration::from_millis(self.reconnect_initial_ms),
                max_delay: Duration::from_millis(self.reconnect_max_ms),
                backoff_factor: self.reconnect_factor,
            },
            completion_timeout: self.completion_timeout_ms.map(Duration::from_millis),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

fn default_host_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "ferry".into())
}

/// Everything the daemon binary reads at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpoolConfigFile {
    #[serde(default)]
    pub client: ClientSettings,
    /// Requester id towards plain partners. Defaults to the host name.
    #[serde(default = "default_host_id")]
    pub host_id: String,
    /// Requester id towards TLS partners. Defaults to `host_id`.
    #[serde(default)]
    pub tls_host_id: Option<String>,
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub record_store: PathBuf,
    /// Stop file for spools that do not name one.
    #[serde(default)]
    pub stop_file: Option<PathBuf>,
    pub spools: Vec<SpoolArguments>,
}

impl SpoolConfigFile {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, SpoolError> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&data)?;
        config.apply_defaults();
        config.validate()?;
        debug!(
            path = %path.display(),
            spools = config.spools.len(),
            hosts = config.hosts.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), SpoolError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    fn apply_defaults(&mut self) {
        if let Some(stop_file) = &self.stop_file {
            for spool in &mut self.spools {
                if spool.stop_file.as_os_str().is_empty() {
                    spool.stop_file = stop_file.clone();
                }
            }
        }
    }

    fn validate(&self) -> Result<(), SpoolError> {
        if self.spools.is_empty() {
            return Err(SpoolError::InvalidConfig("no spool configured".into()));
        }
        let mut status_files = std::collections::HashSet::new();
        for spool in &self.spools {
            spool.validate()?;
            if !status_files.insert(&spool.status_file) {
                return Err(SpoolError::InvalidConfig(format!(
                    "status file {} shared by several spools",
                    spool.status_file.display()
                )));
            }
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        self.client.to_client_config()
    }

    pub fn host_directory(&self) -> StaticHosts {
        let tls_id = self.tls_host_id.clone().unwrap_or_else(|| self.host_id.clone());
        let hosts = self
            .hosts
            .iter()
            .cloned()
            .fold(StaticHosts::new(self.host_id.clone(), tls_id), StaticHosts::with_host);
        self.aliases
            .iter()
            .fold(hosts, |hosts, (alias, id)| hosts.with_alias(alias.clone(), id.clone()))
    }

    pub fn rule_table(&self) -> StaticRules {
        StaticRules::new(self.rules.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_transfer::{HostDirectory, RuleResolver};

    const SAMPLE: &str = r#"{
        "hostId": "edge-1",
        "client": { "retryLimit": 5 },
        "hosts": [
            { "hostId": "central", "address": "10.1.0.1:6666", "useTls": true },
            { "hostId": "legacy", "address": "10.1.0.2:6666", "useJson": false }
        ],
        "aliases": { "hq": "central" },
        "rules": [ { "name": "push", "mode": "send", "sendPath": "/srv/out" } ],
        "recordStore": "/var/lib/ferry/records.json",
        "stopFile": "/run/ferry/stop",
        "spools": [
            {
                "name": "outbox",
                "directories": ["/srv/out"],
                "statusFile": "/var/lib/ferry/outbox.status",
                "rule": "push",
                "hosts": ["hq"]
            }
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ferry.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = SpoolConfigFile::load(&path).unwrap();

        let spool = &config.spools[0];
        assert_eq!(spool.stop_file, PathBuf::from("/run/ferry/stop"));
        assert_eq!(spool.elapse_ms, 1000);
        assert_eq!(spool.elapse_observer_ms, 5000);
        assert!(spool.submit_only);
        assert!(spool.parallel);
        assert_eq!(spool.limit_parallel, 0);
        assert_eq!(spool.file_info, NO_INFO);
        assert_eq!(spool.block_size, DEFAULT_BLOCK_SIZE);
        assert!(spool.log_as_warn);

        let client = config.client_config();
        assert_eq!(client.retry_limit, 5);
        assert_eq!(client.overload_retry_limit, 3);
        assert_eq!(client.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builds_directories() {
        let config: SpoolConfigFile = serde_json::from_str(SAMPLE).unwrap();

        let hosts = config.host_directory();
        assert_eq!(hosts.resolve_alias("hq"), "central");
        assert!(hosts.lookup("central").unwrap().use_tls);
        assert!(!hosts.lookup("legacy").unwrap().use_json);
        assert_eq!(hosts.local_host_id(true), "edge-1");

        let rules = config.rule_table();
        assert!(rules.resolve("push").unwrap().is_send_capable());
    }

    #[test]
    fn rejects_spool_without_stop_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ferry.json");
        let mut config: SpoolConfigFile = serde_json::from_str(SAMPLE).unwrap();
        config.stop_file = None;
        config.save(&path).unwrap();

        let err = SpoolConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, SpoolError::InvalidConfig(_)));
    }

    #[test]
    fn validate_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let base = SpoolArguments::new(
            "s",
            vec![tmp.path().to_path_buf()],
            tmp.path().join("status.json"),
            tmp.path().join("stop"),
            "push",
            vec!["central".into()],
        );
        assert!(base.validate().is_ok());

        let mut no_dirs = base.clone();
        no_dirs.directories.clear();
        assert!(no_dirs.validate().is_err());

        let mut dir_status = base.clone();
        dir_status.status_file = tmp.path().to_path_buf();
        assert!(dir_status.validate().is_err());

        let mut bad_regex = base.clone();
        bad_regex.regex = Some("(".into());
        assert!(matches!(bad_regex.validate(), Err(SpoolError::Regex(_))));
    }
}
