//! Audit trail for executed remediation actions.
//!
//! Every action execution is appended here regardless of outcome, so the
//! owner can reconstruct what the engine did on their behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Who initiated an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionActor {
    /// Executed automatically by the engine's auto-action policy.
    Auto,
    /// Executed by the vault owner through a remediation flow.
    User,
}

impl std::fmt::Display for ActionActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::User => write!(f, "user"),
        }
    }
}

/// One executed remediation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionAuditEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// The flow this action belonged to, if any.
    pub flow_id: Option<Uuid>,
    /// Stable action identifier (e.g. "lock_vault_<uuid>").
    pub action_id: String,
    /// Who initiated it.
    pub actor: ActionActor,
    /// Whether the back-end accepted it.
    pub success: bool,
    /// Outcome or error message.
    pub message: String,
    /// When it was executed.
    pub timestamp: DateTime<Utc>,
}

impl ActionAuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        flow_id: Option<Uuid>,
        action_id: impl Into<String>,
        actor: ActionActor,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            flow_id,
            action_id: action_id.into(),
            actor,
            success,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// In-memory, append-only audit log of remediation actions.
#[derive(Default)]
pub struct ActionAuditLog {
    entries: Arc<RwLock<Vec<ActionAuditEntry>>>,
}

impl ActionAuditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub async fn append(&self, entry: ActionAuditEntry) {
        self.entries.write().await.push(entry);
    }

    /// Returns all entries, oldest first.
    pub async fn entries(&self) -> Vec<ActionAuditEntry> {
        self.entries.read().await.clone()
    }

    /// Returns entries for one flow.
    pub async fn for_flow(&self, flow_id: Uuid) -> Vec<ActionAuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.flow_id == Some(flow_id))
            .cloned()
            .collect()
    }

    /// Number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_filter_by_flow() {
        let log = ActionAuditLog::new();
        let flow_id = Uuid::new_v4();

        log.append(ActionAuditEntry::new(
            Some(flow_id),
            "lock_vault_x",
            ActionActor::Auto,
            true,
            "vault locked",
        ))
        .await;
        log.append(ActionAuditEntry::new(
            None,
            "revoke_all_sessions",
            ActionActor::User,
            false,
            "backend unavailable",
        ))
        .await;

        assert_eq!(log.len().await, 2);
        let for_flow = log.for_flow(flow_id).await;
        assert_eq!(for_flow.len(), 1);
        assert_eq!(for_flow[0].action_id, "lock_vault_x");
        assert_eq!(for_flow[0].actor, ActionActor::Auto);
    }
}
