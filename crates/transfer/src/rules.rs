use std::collections::HashMap;
use std::path::PathBuf;

use ferry_protocol::TransferMode;
use serde::{Deserialize, Serialize};

use crate::TransferError;

/// A named transfer rule: direction, options and local directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    pub mode: TransferMode,
    #[serde(default)]
    pub send_path: PathBuf,
    #[serde(default)]
    pub recv_path: PathBuf,
}

impl Rule {
    pub fn is_send_capable(&self) -> bool {
        self.mode.is_send()
    }

    pub fn is_recv_capable(&self) -> bool {
        self.mode.is_recv()
    }
}

/// Maps rule names to rules.
pub trait RuleResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Rule, TransferError>;
}

/// Rule table loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRules {
    rules: HashMap<String, Rule>,
}

impl StaticRules {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn insert(&mut self, rule: Rule) {
        self.rules.insert(rule.name.clone(), rule);
    }
}

impl RuleResolver for StaticRules {
    fn resolve(&self, name: &str) -> Result<Rule, TransferError> {
        self.rules
            .get(name)
            .cloned()
            .ok_or_else(|| TransferError::UnknownRule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_and_unknown() {
        let rules = StaticRules::new(vec![Rule {
            name: "out".into(),
            mode: TransferMode::SendHash,
            send_path: PathBuf::from("/data/out"),
            recv_path: PathBuf::new(),
        }]);
        let rule = rules.resolve("out").unwrap();
        assert!(rule.is_send_capable());
        assert!(!rule.is_recv_capable());
        assert!(matches!(
            rules.resolve("missing"),
            Err(TransferError::UnknownRule(name)) if name == "missing"
        ));
    }

    #[test]
    fn rule_from_json() {
        let json = r#"{"name":"in","mode":"recvThrough","recvPath":"/data/in"}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.is_recv_capable());
        assert!(rule.mode.is_through());
        assert_eq!(rule.send_path, PathBuf::new());
    }
}
