//! Mock collaborators for testing.
//!
//! Provides an in-memory vault directory implementing both the activity
//! source and the action back-end, with failure injection and an action
//! history for test verification, plus recording/static implementations of
//! the alert sink, capture sensor, and enhancement service.

use crate::activity::{VaultRef, VaultSnapshot};
use crate::traits::{
    ActivitySource, AlertSink, BackendAck, CaptureSensor, ConnectorError, ConnectorResult,
    EnhancementService, VaultBackend,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Normal operation.
    #[default]
    Normal,
    /// Fail all back-end mutations.
    FailMutations(ConnectorError),
    /// Fail after N calls.
    FailAfter { calls: u64, error: ConnectorError },
}

/// Record of a back-end call for test verification.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub operation: String,
    pub vault_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one mock vault.
#[derive(Debug, Clone)]
struct MockVaultState {
    snapshot: VaultSnapshot,
    locked: bool,
    dual_key: bool,
    enhanced_monitoring: bool,
    redacted: HashSet<Uuid>,
    restricted: HashSet<Uuid>,
    password_version: u32,
}

/// In-memory vault directory acting as activity source and action back-end.
pub struct MockVaultDirectory {
    vaults: Arc<RwLock<HashMap<Uuid, MockVaultState>>>,
    sessions_active: AtomicBool,
    monitoring_context_recorded: AtomicBool,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
    history: Arc<RwLock<Vec<BackendCall>>>,
}

impl MockVaultDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            vaults: Arc::new(RwLock::new(HashMap::new())),
            sessions_active: AtomicBool::new(true),
            monitoring_context_recorded: AtomicBool::new(false),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Adds a vault built from a snapshot.
    pub async fn insert_vault(&self, snapshot: VaultSnapshot) {
        let mut vaults = self.vaults.write().await;
        vaults.insert(
            snapshot.vault.id,
            MockVaultState {
                snapshot,
                locked: false,
                dual_key: false,
                enhanced_monitoring: false,
                redacted: HashSet::new(),
                restricted: HashSet::new(),
                password_version: 0,
            },
        );
    }

    /// Sets the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Returns the recorded back-end calls.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.history.read().await.clone()
    }

    /// Whether a vault is currently locked.
    pub async fn is_locked(&self, vault_id: Uuid) -> bool {
        self.vaults
            .read()
            .await
            .get(&vault_id)
            .map(|v| v.locked)
            .unwrap_or(false)
    }

    /// Nominees currently attached to a vault.
    pub async fn nominees(&self, vault_id: Uuid) -> Vec<String> {
        self.vaults
            .read()
            .await
            .get(&vault_id)
            .map(|v| v.snapshot.nominees.clone())
            .unwrap_or_default()
    }

    /// Whether sessions are still active.
    pub fn sessions_active(&self) -> bool {
        self.sessions_active.load(Ordering::SeqCst)
    }

    /// Whether the monitoring context has been recorded.
    pub fn monitoring_context_recorded(&self) -> bool {
        self.monitoring_context_recorded.load(Ordering::SeqCst)
    }

    async fn check_behavior(&self) -> ConnectorResult<()> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        match &*self.behavior.read().await {
            MockBehavior::Normal => Ok(()),
            MockBehavior::FailMutations(err) => Err(err.clone()),
            MockBehavior::FailAfter { calls, error } => {
                if count > *calls {
                    Err(error.clone())
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn record(&self, operation: &str, vault_id: Option<Uuid>) {
        self.history.write().await.push(BackendCall {
            operation: operation.to_string(),
            vault_id,
            timestamp: Utc::now(),
        });
    }
}

impl Default for MockVaultDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivitySource for MockVaultDirectory {
    async fn list_vaults(&self) -> ConnectorResult<Vec<VaultRef>> {
        let vaults = self.vaults.read().await;
        Ok(vaults.values().map(|v| v.snapshot.vault.clone()).collect())
    }

    async fn fetch_activity(&self, vault_id: Uuid) -> ConnectorResult<VaultSnapshot> {
        let vaults = self.vaults.read().await;
        vaults
            .get(&vault_id)
            .map(|v| v.snapshot.clone())
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))
    }
}

#[async_trait]
impl VaultBackend for MockVaultDirectory {
    async fn lock_vault(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("lock_vault", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        if vault.locked {
            Ok(BackendAck::noop("vault already locked"))
        } else {
            vault.locked = true;
            Ok(BackendAck::changed("vault locked"))
        }
    }

    async fn close_all_vaults(&self) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("close_all_vaults", None).await;
        let mut vaults = self.vaults.write().await;
        let mut closed = 0usize;
        for vault in vaults.values_mut() {
            if !vault.locked {
                vault.locked = true;
                closed += 1;
            }
        }
        if closed == 0 {
            Ok(BackendAck::noop("all vaults already locked"))
        } else {
            Ok(BackendAck::changed(format!("{} vaults locked", closed)))
        }
    }

    async fn revoke_nominees(
        &self,
        vault_id: Uuid,
        nominees: &[String],
    ) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("revoke_nominees", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        let before = vault.snapshot.nominees.len();
        vault.snapshot.nominees.retain(|n| !nominees.contains(n));
        let revoked = before - vault.snapshot.nominees.len();
        if revoked == 0 {
            Ok(BackendAck::noop("no matching nominees"))
        } else {
            Ok(BackendAck::changed(format!("{} nominees revoked", revoked)))
        }
    }

    async fn revoke_all_nominees(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("revoke_all_nominees", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        let revoked = vault.snapshot.nominees.len();
        vault.snapshot.nominees.clear();
        if revoked == 0 {
            Ok(BackendAck::noop("vault has no nominees"))
        } else {
            Ok(BackendAck::changed(format!("{} nominees revoked", revoked)))
        }
    }

    async fn revoke_all_sessions(&self) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("revoke_all_sessions", None).await;
        if self.sessions_active.swap(false, Ordering::SeqCst) {
            Ok(BackendAck::changed("all sessions revoked"))
        } else {
            Ok(BackendAck::noop("no active sessions"))
        }
    }

    async fn redact_documents(
        &self,
        vault_id: Uuid,
        document_ids: &[Uuid],
    ) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("redact_documents", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        let before = vault.redacted.len();
        vault.redacted.extend(document_ids.iter().copied());
        let added = vault.redacted.len() - before;
        if added == 0 {
            Ok(BackendAck::noop("documents already redacted"))
        } else {
            Ok(BackendAck::changed(format!("{} documents redacted", added)))
        }
    }

    async fn restrict_document_access(
        &self,
        vault_id: Uuid,
        document_ids: &[Uuid],
    ) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("restrict_document_access", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        let before = vault.restricted.len();
        vault.restricted.extend(document_ids.iter().copied());
        let added = vault.restricted.len() - before;
        if added == 0 {
            Ok(BackendAck::noop("documents already restricted"))
        } else {
            Ok(BackendAck::changed(format!("{} documents restricted", added)))
        }
    }

    async fn change_vault_password(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("change_vault_password", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        vault.password_version += 1;
        Ok(BackendAck::changed("password rotated"))
    }

    async fn change_all_passwords(&self) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("change_all_passwords", None).await;
        let mut vaults = self.vaults.write().await;
        for vault in vaults.values_mut() {
            vault.password_version += 1;
        }
        Ok(BackendAck::changed(format!(
            "{} passwords rotated",
            vaults.len()
        )))
    }

    async fn record_monitoring_context(&self) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("record_monitoring_context", None).await;
        if self.monitoring_context_recorded.swap(true, Ordering::SeqCst) {
            Ok(BackendAck::noop("monitoring context already recorded"))
        } else {
            Ok(BackendAck::changed("monitoring context recorded"))
        }
    }

    async fn flag_access_log_review(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("flag_access_log_review", Some(vault_id)).await;
        Ok(BackendAck::changed("access log flagged for review"))
    }

    async fn flag_sharing_review(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("flag_sharing_review", Some(vault_id)).await;
        Ok(BackendAck::changed("sharing activity flagged for review"))
    }

    async fn enable_dual_key_protection(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("enable_dual_key_protection", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        if vault.dual_key {
            Ok(BackendAck::noop("dual-key protection already enabled"))
        } else {
            vault.dual_key = true;
            Ok(BackendAck::changed("dual-key protection enabled"))
        }
    }

    async fn enable_enhanced_monitoring(&self, vault_id: Uuid) -> ConnectorResult<BackendAck> {
        self.check_behavior().await?;
        self.record("enable_enhanced_monitoring", Some(vault_id)).await;
        let mut vaults = self.vaults.write().await;
        let vault = vaults
            .get_mut(&vault_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("vault {}", vault_id)))?;
        if vault.enhanced_monitoring {
            Ok(BackendAck::noop("enhanced monitoring already enabled"))
        } else {
            vault.enhanced_monitoring = true;
            Ok(BackendAck::changed("enhanced monitoring enabled"))
        }
    }
}

/// An alert dispatched to the recording sink.
#[derive(Debug, Clone)]
pub struct RecordedAlert {
    pub title: String,
    pub body: String,
    pub classification: String,
}

/// Alert sink that records notifications for assertions.
#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Arc<RwLock<Vec<RecordedAlert>>>,
}

impl RecordingAlertSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded alerts.
    pub async fn alerts(&self) -> Vec<RecordedAlert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, title: &str, body: &str, classification: &str) -> ConnectorResult<()> {
        self.alerts.write().await.push(RecordedAlert {
            title: title.to_string(),
            body: body.to_string(),
            classification: classification.to_string(),
        });
        Ok(())
    }
}

/// Capture sensor backed by a settable flag.
#[derive(Default)]
pub struct TestCaptureSensor {
    captured: AtomicBool,
}

impl TestCaptureSensor {
    /// Creates a sensor reporting "not captured".
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capture flag.
    pub fn set_captured(&self, captured: bool) {
        self.captured.store(captured, Ordering::SeqCst);
    }
}

impl CaptureSensor for TestCaptureSensor {
    fn is_captured(&self) -> bool {
        self.captured.load(Ordering::SeqCst)
    }
}

/// Enhancement service returning a fixed step list.
pub struct CannedEnhancer {
    steps: Vec<String>,
}

impl CannedEnhancer {
    /// Creates an enhancer that always returns the given steps.
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl EnhancementService for CannedEnhancer {
    async fn generate_steps(&self, _context: &str) -> ConnectorResult<Vec<String>> {
        Ok(self.steps.clone())
    }
}

/// Enhancement service that never responds. For timeout tests.
pub struct StalledEnhancer;

#[async_trait]
impl EnhancementService for StalledEnhancer {
    async fn generate_steps(&self, _context: &str) -> ConnectorResult<Vec<String>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
