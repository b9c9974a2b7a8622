//! Collaborator trait definitions for Vault Guard.
//!
//! The engine is a library: everything with side effects lives behind one of
//! these narrow interfaces. The action back-end exposes one operation per
//! remediation action variant, each idempotent and tolerant of no-op targets.

use crate::activity::{VaultRef, VaultSnapshot};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in collaborators.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for collaborator operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Acknowledgement returned by back-end mutations.
///
/// `changed` distinguishes a real state change from an idempotent no-op
/// (locking an already-locked vault, revoking zero nominees).
#[derive(Debug, Clone)]
pub struct BackendAck {
    /// Whether any state actually changed.
    pub changed: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl BackendAck {
    /// A mutation that changed state.
    pub fn changed(message: impl Into<String>) -> Self {
        Self {
            changed: true,
            message: message.into(),
        }
    }

    /// An idempotent no-op.
    pub fn noop(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
        }
    }
}

/// Read-only source of vault activity snapshots.
///
/// Eventually consistent; the engine treats an empty snapshot as a valid
/// zero-risk input, never as an error.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Lists the vaults owned by the current user.
    async fn list_vaults(&self) -> ConnectorResult<Vec<VaultRef>>;

    /// Fetches the activity snapshot for one vault.
    async fn fetch_activity(&self, vault_id: Uuid) -> ConnectorResult<VaultSnapshot>;
}

/// The action back-end: one operation per remediation action variant.
///
/// Every operation must be idempotent and must treat an empty target set as
/// success (revoking nominees from a vault that has none succeeds with zero
/// revoked).
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Locks a single vault.
    async fn lock_vault(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Locks every vault owned by the user.
    async fn close_all_vaults(&self) -> ConnectorResult<BackendAck>;

    /// Revokes the named nominees from a vault.
    async fn revoke_nominees(
        &self,
        vault_id: Uuid,
        nominees: &[String],
    ) -> ConnectorResult<BackendAck>;

    /// Revokes every nominee from a vault.
    async fn revoke_all_nominees(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Revokes all active sessions for the user.
    async fn revoke_all_sessions(&self) -> ConnectorResult<BackendAck>;

    /// Redacts the given documents.
    async fn redact_documents(
        &self,
        vault_id: Uuid,
        document_ids: &[Uuid],
    ) -> ConnectorResult<BackendAck>;

    /// Restricts access to the given documents to the owner.
    async fn restrict_document_access(
        &self,
        vault_id: Uuid,
        document_ids: &[Uuid],
    ) -> ConnectorResult<BackendAck>;

    /// Rotates one vault's password.
    async fn change_vault_password(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Rotates every vault password.
    async fn change_all_passwords(&self) -> ConnectorResult<BackendAck>;

    /// Records the current monitoring context (source IP, device).
    async fn record_monitoring_context(&self) -> ConnectorResult<BackendAck>;

    /// Flags the vault's access log for owner review.
    async fn flag_access_log_review(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Flags the vault's sharing activity for owner review.
    async fn flag_sharing_review(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Enables dual-key protection on a vault.
    async fn enable_dual_key_protection(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;

    /// Enables enhanced monitoring on a vault.
    async fn enable_enhanced_monitoring(&self, vault_id: Uuid) -> ConnectorResult<BackendAck>;
}

/// Fire-and-forget alert delivery. Best effort; duplicate suppression is the
/// sink's concern, not the engine's.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Dispatches an alert. Errors are logged by the caller and dropped.
    async fn notify(&self, title: &str, body: &str, classification: &str) -> ConnectorResult<()>;
}

/// Polled screen-capture sensor.
///
/// Implementations must degrade to `false` when the platform primitive is
/// unavailable rather than fail.
pub trait CaptureSensor: Send + Sync {
    /// Whether the screen is currently being captured or mirrored.
    fn is_captured(&self) -> bool;
}

/// Best-effort remediation-step generator.
///
/// Callers must wrap every invocation in a timeout; the deterministic
/// quick-step fallback is always the authoritative result on expiry.
#[async_trait]
pub trait EnhancementService: Send + Sync {
    /// Generates remediation steps from a free-text threat context.
    async fn generate_steps(&self, context: &str) -> ConnectorResult<Vec<String>>;
}
