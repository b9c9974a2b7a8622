//! Remediation actions and the execution seam.
//!
//! A [`RemediationAction`] is a fully parameterized, serializable command
//! against the vault back-end. The engine and flows never talk to the
//! back-end directly; they hand actions to an [`ActionDispatch`]
//! implementation and consume the [`ActionOutcome`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A concrete remediation command.
///
/// Identity: two actions are the same when their variant and parameters
/// match, which is what flow bookkeeping keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemediationAction {
    /// Lock a single vault against all access.
    LockVault { vault_id: Uuid },
    /// Lock every vault in the account.
    CloseAllVaults,
    /// Revoke the named nominees from a vault.
    RevokeNominees {
        vault_id: Uuid,
        nominees: Vec<String>,
    },
    /// Revoke every nominee from a vault.
    RevokeAllNominees { vault_id: Uuid },
    /// Invalidate all active sessions for the account.
    RevokeAllSessions,
    /// Redact the named documents in place.
    RedactDocuments {
        vault_id: Uuid,
        document_ids: Vec<Uuid>,
    },
    /// Restrict the named documents to owner-only access.
    RestrictDocumentAccess {
        vault_id: Uuid,
        document_ids: Vec<Uuid>,
    },
    /// Force a password rotation for one vault.
    ChangeVaultPassword { vault_id: Uuid },
    /// Force a password rotation for every vault.
    ChangeAllPasswords,
    /// Capture the current client network context for the investigation.
    RecordMonitoringContext,
    /// Flag a vault's access log for owner review.
    ReviewAccessLogs { vault_id: Uuid },
    /// Flag a vault's sharing settings for owner review.
    ReviewDocumentSharing { vault_id: Uuid },
    /// Require a second key for future unlocks of a vault.
    EnableDualKeyProtection { vault_id: Uuid },
    /// Turn on enhanced activity monitoring for a vault.
    EnableEnhancedMonitoring { vault_id: Uuid },
}

impl RemediationAction {
    /// Stable identifier: the variant name, suffixed with the vault for
    /// vault-scoped actions. Used for audit entries and deduplication
    /// across flow updates.
    pub fn action_id(&self) -> String {
        match self {
            Self::LockVault { vault_id } => format!("lock_vault_{}", vault_id),
            Self::CloseAllVaults => "close_all_vaults".to_string(),
            Self::RevokeNominees { vault_id, .. } => format!("revoke_nominees_{}", vault_id),
            Self::RevokeAllNominees { vault_id } => {
                format!("revoke_all_nominees_{}", vault_id)
            }
            Self::RevokeAllSessions => "revoke_all_sessions".to_string(),
            Self::RedactDocuments { vault_id, .. } => format!("redact_documents_{}", vault_id),
            Self::RestrictDocumentAccess { vault_id, .. } => {
                format!("restrict_document_access_{}", vault_id)
            }
            Self::ChangeVaultPassword { vault_id } => {
                format!("change_vault_password_{}", vault_id)
            }
            Self::ChangeAllPasswords => "change_all_passwords".to_string(),
            Self::RecordMonitoringContext => "record_monitoring_context".to_string(),
            Self::ReviewAccessLogs { vault_id } => format!("review_access_logs_{}", vault_id),
            Self::ReviewDocumentSharing { vault_id } => {
                format!("review_document_sharing_{}", vault_id)
            }
            Self::EnableDualKeyProtection { vault_id } => {
                format!("enable_dual_key_protection_{}", vault_id)
            }
            Self::EnableEnhancedMonitoring { vault_id } => {
                format!("enable_enhanced_monitoring_{}", vault_id)
            }
        }
    }

    /// Short variant name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LockVault { .. } => "lock_vault",
            Self::CloseAllVaults => "close_all_vaults",
            Self::RevokeNominees { .. } => "revoke_nominees",
            Self::RevokeAllNominees { .. } => "revoke_all_nominees",
            Self::RevokeAllSessions => "revoke_all_sessions",
            Self::RedactDocuments { .. } => "redact_documents",
            Self::RestrictDocumentAccess { .. } => "restrict_document_access",
            Self::ChangeVaultPassword { .. } => "change_vault_password",
            Self::ChangeAllPasswords => "change_all_passwords",
            Self::RecordMonitoringContext => "record_monitoring_context",
            Self::ReviewAccessLogs { .. } => "review_access_logs",
            Self::ReviewDocumentSharing { .. } => "review_document_sharing",
            Self::EnableDualKeyProtection { .. } => "enable_dual_key_protection",
            Self::EnableEnhancedMonitoring { .. } => "enable_enhanced_monitoring",
        }
    }

    /// Human-readable imperative for step lists and alerts.
    pub fn title(&self) -> String {
        match self {
            Self::LockVault { .. } => "Lock this vault".to_string(),
            Self::CloseAllVaults => "Close all vaults".to_string(),
            Self::RevokeNominees { nominees, .. } => {
                format!("Revoke nominee access for {}", nominees.join(", "))
            }
            Self::RevokeAllNominees { .. } => "Revoke all nominee access".to_string(),
            Self::RevokeAllSessions => "Sign out of all active sessions".to_string(),
            Self::RedactDocuments { document_ids, .. } => {
                format!("Redact {} sensitive document(s)", document_ids.len())
            }
            Self::RestrictDocumentAccess { document_ids, .. } => {
                format!("Restrict access to {} document(s)", document_ids.len())
            }
            Self::ChangeVaultPassword { .. } => "Change this vault's password".to_string(),
            Self::ChangeAllPasswords => "Change all vault passwords".to_string(),
            Self::RecordMonitoringContext => {
                "Record the monitoring source for investigation".to_string()
            }
            Self::ReviewAccessLogs { .. } => "Review this vault's access logs".to_string(),
            Self::ReviewDocumentSharing { .. } => {
                "Review this vault's sharing settings".to_string()
            }
            Self::EnableDualKeyProtection { .. } => {
                "Enable dual-key protection".to_string()
            }
            Self::EnableEnhancedMonitoring { .. } => {
                "Enable enhanced monitoring".to_string()
            }
        }
    }

    /// Whether the engine may run this without owner confirmation.
    ///
    /// Automatic execution is limited to lock, revoke, and record
    /// operations. Content-destructive and review actions always wait
    /// for the owner.
    pub fn is_safe_for_auto(&self) -> bool {
        matches!(
            self,
            Self::LockVault { .. }
                | Self::CloseAllVaults
                | Self::RevokeNominees { .. }
                | Self::RevokeAllNominees { .. }
                | Self::RevokeAllSessions
                | Self::RecordMonitoringContext
        )
    }
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// The result of executing one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Identifier of the executed action.
    pub action_id: String,
    /// Whether the back-end accepted the action.
    pub success: bool,
    /// Whether the back-end state actually changed (false for no-ops such
    /// as locking an already locked vault).
    pub changed: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Error detail when `success` is false.
    pub error: Option<String>,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
}

impl ActionOutcome {
    /// A successful execution that changed back-end state.
    pub fn success(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            success: true,
            changed: true,
            message: message.into(),
            error: None,
            executed_at: Utc::now(),
        }
    }

    /// A successful execution that found nothing to change.
    pub fn noop(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            changed: false,
            ..Self::success(action_id, message)
        }
    }

    /// A failed execution. The flow keeps the action retryable.
    pub fn failure(action_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            action_id: action_id.into(),
            success: false,
            changed: false,
            message: format!("action failed: {}", error),
            error: Some(error),
            executed_at: Utc::now(),
        }
    }
}

/// Execution seam between the engine and the action executor.
#[async_trait]
pub trait ActionDispatch: Send + Sync {
    /// Executes one action against the back-end. Back-end errors are
    /// reported in the outcome, never panicked or swallowed.
    async fn execute(&self, action: &RemediationAction) -> ActionOutcome;
}
