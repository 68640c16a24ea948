use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferStatus {
    /// Registered, waiting for a server (or a later run) to pick it up.
    ToSubmit,
    Running,
    Done,
    InError,
    Interrupted,
}

impl TransferStatus {
    /// Done, in error or interrupted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::InError | Self::Interrupted)
    }
}

/// How a rule moves data, seen from the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferMode {
    Send,
    Recv,
    SendHash,
    RecvHash,
    SendThrough,
    RecvThrough,
    SendHashThrough,
    RecvHashThrough,
}

impl TransferMode {
    pub fn is_send(self) -> bool {
        matches!(
            self,
            Self::Send | Self::SendHash | Self::SendThrough | Self::SendHashThrough
        )
    }

    pub fn is_recv(self) -> bool {
        !self.is_send()
    }

    pub fn is_through(self) -> bool {
        matches!(
            self,
            Self::SendThrough | Self::RecvThrough | Self::SendHashThrough | Self::RecvHashThrough
        )
    }

    pub fn has_hash(self) -> bool {
        matches!(
            self,
            Self::SendHash | Self::RecvHash | Self::SendHashThrough | Self::RecvHashThrough
        )
    }

    /// The hash-augmented variant of this mode.
    pub fn with_hash(self) -> Self {
        match self {
            Self::Send => Self::SendHash,
            Self::Recv => Self::RecvHash,
            Self::SendThrough => Self::SendHashThrough,
            Self::RecvThrough => Self::RecvHashThrough,
            other => other,
        }
    }

    /// The through-mode variant of this mode.
    pub fn with_through(self) -> Self {
        match self {
            Self::Send => Self::SendThrough,
            Self::Recv => Self::RecvThrough,
            Self::SendHash => Self::SendHashThrough,
            Self::RecvHash => Self::RecvHashThrough,
            other => other,
        }
    }
}

/// Whether a partner listens for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostRole {
    /// Accepts inbound sessions.
    #[default]
    Server,
    /// Initiates sessions only; nothing can connect to it.
    ClientOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TransferStatus::Done.is_terminal());
        assert!(TransferStatus::InError.is_terminal());
        assert!(TransferStatus::Interrupted.is_terminal());
        assert!(!TransferStatus::Running.is_terminal());
        assert!(!TransferStatus::ToSubmit.is_terminal());
    }

    #[test]
    fn hash_variant_keeps_direction_and_through() {
        assert_eq!(TransferMode::Send.with_hash(), TransferMode::SendHash);
        assert_eq!(
            TransferMode::RecvThrough.with_hash(),
            TransferMode::RecvHashThrough
        );
        assert_eq!(TransferMode::SendHash.with_hash(), TransferMode::SendHash);
        assert!(TransferMode::SendHashThrough.is_send());
        assert!(TransferMode::SendHashThrough.is_through());
        assert!(TransferMode::RecvHash.is_recv());
        assert!(!TransferMode::RecvHash.is_through());
    }

    #[test]
    fn through_variant() {
        assert_eq!(TransferMode::Send.with_through(), TransferMode::SendThrough);
        assert_eq!(
            TransferMode::RecvHash.with_through(),
            TransferMode::RecvHashThrough
        );
    }

    #[test]
    fn mode_field_names() {
        let json = serde_json::to_string(&TransferMode::SendHashThrough).unwrap();
        assert_eq!(json, "\"sendHashThrough\"");
        let role: HostRole = serde_json::from_str("\"clientOnly\"").unwrap();
        assert_eq!(role, HostRole::ClientOnly);
    }
}
