use std::collections::HashMap;

use ferry_protocol::HostRole;
use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Network identity of a partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    pub host_id: String,
    /// `host:port` the partner listens on. Empty for client-only partners.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub role: HostRole,
    /// Partner understands structured JSON commands.
    #[serde(default = "default_true")]
    pub use_json: bool,
}

fn default_true() -> bool {
    true
}

impl HostEntry {
    pub fn server(host_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            address: address.into(),
            use_tls: false,
            role: HostRole::Server,
            use_json: true,
        }
    }

    pub fn client_only(host_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            address: String::new(),
            use_tls: false,
            role: HostRole::ClientOnly,
            use_json: true,
        }
    }

    pub fn is_client_only(&self) -> bool {
        self.role == HostRole::ClientOnly
    }
}

/// Partner lookup and local identity.
pub trait HostDirectory: Send + Sync {
    fn lookup(&self, host_id: &str) -> Result<HostEntry, TransferError>;

    /// Maps an alias to the host id it stands for; unknown names map to
    /// themselves.
    fn resolve_alias(&self, name: &str) -> String;

    /// Identity this process uses as requester towards a partner.
    fn local_host_id(&self, use_tls: bool) -> String;

    fn is_local(&self, host_id: &str) -> bool {
        host_id == self.local_host_id(false) || host_id == self.local_host_id(true)
    }
}

/// Host table loaded from configuration.
#[derive(Debug, Clone)]
pub struct StaticHosts {
    local_id: String,
    local_tls_id: String,
    hosts: HashMap<String, HostEntry>,
    aliases: HashMap<String, String>,
}

impl StaticHosts {
    pub fn new(local_id: impl Into<String>, local_tls_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            local_tls_id: local_tls_id.into(),
            hosts: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_host(mut self, entry: HostEntry) -> Self {
        self.hosts.insert(entry.host_id.clone(), entry);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, host_id: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), host_id.into());
        self
    }
}

impl HostDirectory for StaticHosts {
    fn lookup(&self, host_id: &str) -> Result<HostEntry, TransferError> {
        self.hosts
            .get(host_id)
            .cloned()
            .ok_or_else(|| TransferError::UnknownHost(host_id.to_string()))
    }

    fn resolve_alias(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn local_host_id(&self, use_tls: bool) -> String {
        if use_tls {
            self.local_tls_id.clone()
        } else {
            self.local_id.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticHosts {
        StaticHosts::new("me", "me-tls")
            .with_host(HostEntry::server("hosta", "10.0.0.1:6666"))
            .with_host(HostEntry::client_only("laptop"))
            .with_alias("primary", "hosta")
    }

    #[test]
    fn lookup_and_alias() {
        let hosts = directory();
        assert_eq!(hosts.resolve_alias("primary"), "hosta");
        assert_eq!(hosts.resolve_alias("hosta"), "hosta");
        assert_eq!(hosts.lookup("hosta").unwrap().address, "10.0.0.1:6666");
        assert!(hosts.lookup("laptop").unwrap().is_client_only());
        assert!(matches!(
            hosts.lookup("primary"),
            Err(TransferError::UnknownHost(_))
        ));
    }

    #[test]
    fn local_identity_follows_tls() {
        let hosts = directory();
        assert_eq!(hosts.local_host_id(false), "me");
        assert_eq!(hosts.local_host_id(true), "me-tls");
        assert!(hosts.is_local("me-tls"));
        assert!(!hosts.is_local("hosta"));
    }

    #[test]
    fn host_entry_defaults() {
        let entry: HostEntry = serde_json::from_str(r#"{"hostId":"x"}"#).unwrap();
        assert!(entry.use_json);
        assert!(!entry.use_tls);
        assert_eq!(entry.role, HostRole::Server);
    }
}
