//! Remediation action execution.
//!
//! Translates each [`RemediationAction`] variant into its back-end
//! operation, bounds every call with a timeout, and records the outcome in
//! the audit log. Back-end failures become failed outcomes; they never
//! abort the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;
use vg_connectors::{BackendAck, ConnectorResult, VaultBackend};
use vg_core::{ActionDispatch, ActionOutcome, RemediationAction};
use vg_observability::{ActionActor, ActionAuditEntry, ActionAuditLog};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Hard budget per back-end call.
    pub action_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
        }
    }
}

/// Executes remediation actions against a vault back-end.
pub struct ActionExecutor {
    backend: Arc<dyn VaultBackend>,
    audit: Arc<ActionAuditLog>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(backend: Arc<dyn VaultBackend>) -> Self {
        Self {
            backend,
            audit: Arc::new(ActionAuditLog::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Uses a shared audit log instead of a private one.
    pub fn with_audit(mut self, audit: Arc<ActionAuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// The audit log this executor appends to.
    pub fn audit(&self) -> Arc<ActionAuditLog> {
        Arc::clone(&self.audit)
    }

    /// Executes one action on behalf of an actor, recording the attempt.
    ///
    /// A no-op acknowledgement (locking an already-locked vault) is a
    /// success with `changed = false`.
    pub async fn execute_as(
        &self,
        action: &RemediationAction,
        actor: ActionActor,
        flow_id: Option<Uuid>,
    ) -> ActionOutcome {
        let action_id = action.action_id();
        let started = Instant::now();

        let result =
            tokio::time::timeout(self.config.action_timeout, self.call_backend(action)).await;
        let outcome = match result {
            Ok(Ok(ack)) => ack_to_outcome(&action_id, ack),
            Ok(Err(error)) => ActionOutcome::failure(&action_id, error.to_string()),
            Err(_) => ActionOutcome::failure(
                &action_id,
                format!(
                    "timed out after {} ms",
                    self.config.action_timeout.as_millis()
                ),
            ),
        };

        let elapsed = started.elapsed();
        metrics::counter!(
            "vg_actions_executed_total",
            "action" => action.name(),
            "outcome" => if outcome.success { "success" } else { "failure" },
        )
        .increment(1);
        metrics::histogram!("vg_action_duration_seconds").record(elapsed.as_secs_f64());

        if outcome.success {
            info!(
                action = action.name(),
                %actor,
                changed = outcome.changed,
                elapsed_ms = elapsed.as_millis() as u64,
                "action executed"
            );
        } else {
            warn!(
                action = action.name(),
                %actor,
                error = ?outcome.error,
                "action failed"
            );
        }

        self.audit
            .append(ActionAuditEntry::new(
                flow_id,
                &action_id,
                actor,
                outcome.success,
                outcome.message.clone(),
            ))
            .await;

        outcome
    }

    async fn call_backend(&self, action: &RemediationAction) -> ConnectorResult<BackendAck> {
        match action {
            RemediationAction::LockVault { vault_id } => {
                self.backend.lock_vault(*vault_id).await
            }
            RemediationAction::CloseAllVaults => self.backend.close_all_vaults().await,
            RemediationAction::RevokeNominees { vault_id, nominees } => {
                self.backend.revoke_nominees(*vault_id, nominees).await
            }
            RemediationAction::RevokeAllNominees { vault_id } => {
                self.backend.revoke_all_nominees(*vault_id).await
            }
            RemediationAction::RevokeAllSessions => self.backend.revoke_all_sessions().await,
            RemediationAction::RedactDocuments {
                vault_id,
                document_ids,
            } => self.backend.redact_documents(*vault_id, document_ids).await,
            RemediationAction::RestrictDocumentAccess {
                vault_id,
                document_ids,
            } => {
                self.backend
                    .restrict_document_access(*vault_id, document_ids)
                    .await
            }
            RemediationAction::ChangeVaultPassword { vault_id } => {
                self.backend.change_vault_password(*vault_id).await
            }
            RemediationAction::ChangeAllPasswords => self.backend.change_all_passwords().await,
            RemediationAction::RecordMonitoringContext => {
                self.backend.record_monitoring_context().await
            }
            RemediationAction::ReviewAccessLogs { vault_id } => {
                self.backend.flag_access_log_review(*vault_id).await
            }
            RemediationAction::ReviewDocumentSharing { vault_id } => {
                self.backend.flag_sharing_review(*vault_id).await
            }
            RemediationAction::EnableDualKeyProtection { vault_id } => {
                self.backend.enable_dual_key_protection(*vault_id).await
            }
            RemediationAction::EnableEnhancedMonitoring { vault_id } => {
                self.backend.enable_enhanced_monitoring(*vault_id).await
            }
        }
    }
}

fn ack_to_outcome(action_id: &str, ack: BackendAck) -> ActionOutcome {
    if ack.changed {
        ActionOutcome::success(action_id, ack.message)
    } else {
        ActionOutcome::noop(action_id, ack.message)
    }
}

/// Engine-facing dispatch: executions through this path are attributed to
/// the auto-action policy.
#[async_trait]
impl ActionDispatch for ActionExecutor {
    async fn execute(&self, action: &RemediationAction) -> ActionOutcome {
        self.execute_as(action, ActionActor::Auto, None).await
    }
}
