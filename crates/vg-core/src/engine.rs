//! The orchestrating engine.
//!
//! Owns the periodic analysis cycle, the capture poll, the flow registry,
//! the auto-action policy, and alert dispatch. Vault snapshots are analyzed
//! concurrently; results are merged and flows mutated single-threaded, so
//! each flow has one writer.

use crate::analysis::{analyze_vault, AnalysisConfig, ThreatMetrics};
use crate::detectors::{run_all, DetectorConfig};
use crate::enhancement::{quick_steps, StepEnhancer, StepPlan};
use crate::events::{EngineEvent, EventBus};
use crate::flow::RemediationFlow;
use crate::remediation::ActionDispatch;
use crate::threat::{Severity, ThreatItem};
use crate::triage::{Classification, TriageConfig, TriageEngine, TriageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use vg_connectors::{
    ActivitySource, AlertSink, CaptureSensor, ConnectorError, EnhancementService,
    VaultSnapshot,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between periodic analysis cycles.
    pub analysis_interval: Duration,
    /// Interval between capture sensor polls.
    pub capture_poll_interval: Duration,
    /// Budget for the step enhancement service per result.
    pub enhancement_timeout: Duration,
    /// Whether critical results may auto-start flows and run auto actions.
    pub auto_actions_enabled: bool,
    pub detectors: DetectorConfig,
    pub analysis: AnalysisConfig,
    pub triage: TriageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_interval: Duration::from_secs(30),
            capture_poll_interval: Duration::from_secs(1),
            enhancement_timeout: Duration::from_secs(4),
            auto_actions_enabled: true,
            detectors: DetectorConfig::default(),
            analysis: AnalysisConfig::default(),
            triage: TriageConfig::default(),
        }
    }
}

/// Engine-level errors. Per-vault fetch failures are logged and skipped,
/// not raised; these cover cycle-fatal conditions only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("vault directory unavailable: {0}")]
    Directory(#[from] ConnectorError),
    #[error("analysis task failed: {0}")]
    TaskFailed(String),
}

/// Summary of one analysis cycle.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub vaults_analyzed: usize,
    pub findings: usize,
    pub results: Vec<TriageResult>,
    /// Flows auto-started this cycle.
    pub flows_started: Vec<Uuid>,
}

type FlowKey = (Uuid, Classification);
type SharedFlow = Arc<Mutex<RemediationFlow>>;

/// Per-vault output of the concurrent analysis phase.
struct VaultAnalysis {
    snapshot: VaultSnapshot,
    metrics: ThreatMetrics,
    findings: Vec<ThreatItem>,
}

/// The threat detection, triage, and guided-remediation engine.
pub struct VaultGuardEngine {
    config: EngineConfig,
    activity: Arc<dyn ActivitySource>,
    dispatch: Arc<dyn ActionDispatch>,
    alerts: Arc<dyn AlertSink>,
    capture: Arc<dyn CaptureSensor>,
    enhancer: Option<StepEnhancer>,
    triage: TriageEngine,
    flows: RwLock<HashMap<FlowKey, SharedFlow>>,
    events: EventBus,
    capture_active: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl VaultGuardEngine {
    pub fn new(
        config: EngineConfig,
        activity: Arc<dyn ActivitySource>,
        dispatch: Arc<dyn ActionDispatch>,
        alerts: Arc<dyn AlertSink>,
        capture: Arc<dyn CaptureSensor>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let triage = TriageEngine::new(config.triage.clone());
        Self {
            config,
            activity,
            dispatch,
            alerts,
            capture,
            enhancer: None,
            triage,
            flows: RwLock::new(HashMap::new()),
            events: EventBus::default(),
            capture_active: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Attaches a step enhancement service, bounded by the configured
    /// timeout.
    pub fn with_enhancer(mut self, service: Arc<dyn EnhancementService>) -> Self {
        self.enhancer = Some(StepEnhancer::new(service, self.config.enhancement_timeout));
        self
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Looks up the active flow for a vault and classification.
    pub async fn flow(&self, vault_id: Uuid, classification: Classification) -> Option<SharedFlow> {
        self.flows
            .read()
            .await
            .get(&(vault_id, classification))
            .cloned()
    }

    /// Number of active flows.
    pub async fn active_flow_count(&self) -> usize {
        self.flows.read().await.len()
    }

    /// Step guidance for a result: enhanced when a service is attached and
    /// answers in time, rule-based quick steps otherwise.
    pub async fn steps_for(&self, result: &TriageResult) -> StepPlan {
        match &self.enhancer {
            Some(enhancer) => enhancer.plan(result).await,
            None => StepPlan::new(quick_steps(result)),
        }
    }

    /// Runs one full analysis cycle.
    ///
    /// `force_screen_monitoring` injects the account-wide screen
    /// monitoring result; the capture poll sets it on a rising edge.
    #[instrument(skip(self))]
    pub async fn run_analysis_cycle(
        &self,
        force_screen_monitoring: bool,
    ) -> Result<CycleSummary, EngineError> {
        let started = Instant::now();
        let vaults = self.activity.list_vaults().await?;

        // Fetch and analyze every vault concurrently.
        let tasks: Vec<JoinHandle<Option<VaultAnalysis>>> = vaults
            .iter()
            .map(|vault| {
                let activity = Arc::clone(&self.activity);
                let analysis = self.config.analysis.clone();
                let detectors = self.config.detectors.clone();
                let vault = vault.clone();
                tokio::spawn(async move {
                    match activity.fetch_activity(vault.id).await {
                        Ok(snapshot) => {
                            let metrics = analyze_vault(&snapshot, &analysis);
                            let findings = run_all(&snapshot, &metrics, &detectors);
                            Some(VaultAnalysis {
                                snapshot,
                                metrics,
                                findings,
                            })
                        }
                        Err(error) => {
                            warn!(vault = %vault.name, %error, "activity fetch failed, skipping vault");
                            None
                        }
                    }
                })
            })
            .collect();

        let mut per_vault = Vec::with_capacity(tasks.len());
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(Some(analyzed)) => per_vault.push(analyzed),
                Ok(None) => {}
                Err(error) => return Err(EngineError::TaskFailed(error.to_string())),
            }
        }

        // Merge single-threaded from here on.
        let mut findings_total = 0;
        let mut results = Vec::new();
        for analyzed in &per_vault {
            findings_total += analyzed.findings.len();
            for finding in &analyzed.findings {
                metrics::counter!(
                    "vg_findings_total",
                    "severity" => finding.severity.as_str(),
                )
                .increment(1);
            }
            results.extend(self.triage.triage_vault(
                &analyzed.snapshot,
                &analyzed.metrics,
                &analyzed.findings,
            ));
        }

        if force_screen_monitoring {
            if let Some(first) = per_vault.first() {
                let names = per_vault
                    .iter()
                    .map(|a| a.snapshot.vault.name.clone())
                    .collect();
                results.push(
                    self.triage
                        .screen_monitoring_result(&first.snapshot.vault, names),
                );
            } else {
                warn!("capture detected but no vault is reachable for triage");
            }
        }

        let results = self.triage.consolidate(results);
        for result in &results {
            metrics::counter!(
                "vg_triage_results_total",
                "classification" => result.classification.as_str(),
            )
            .increment(1);
        }

        self.dispatch_alerts(&results).await;
        self.refresh_flows(&results).await;

        let mut flows_started = Vec::new();
        if self.config.auto_actions_enabled {
            if let Some(flow_id) = self.auto_start(&results).await {
                flows_started.push(flow_id);
            }
        }

        let elapsed = started.elapsed();
        metrics::counter!("vg_analysis_cycles_total").increment(1);
        metrics::histogram!("vg_cycle_duration_seconds").record(elapsed.as_secs_f64());
        metrics::gauge!("vg_active_flows").set(self.active_flow_count().await as f64);

        info!(
            vaults = per_vault.len(),
            findings = findings_total,
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "analysis cycle complete"
        );
        self.events.publish(EngineEvent::CycleCompleted {
            vaults: per_vault.len(),
            findings: findings_total,
            results: results.len(),
        });

        Ok(CycleSummary {
            vaults_analyzed: per_vault.len(),
            findings: findings_total,
            results,
            flows_started,
        })
    }

    /// Opens a flow for a result, or folds the result into the existing
    /// flow for the same vault and classification.
    pub async fn start_flow(&self, result: TriageResult, auto_started: bool) -> SharedFlow {
        let key = (result.vault_id, result.classification);
        let (flow, created) = {
            let mut flows = self.flows.write().await;
            match flows.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let flow = Arc::new(Mutex::new(RemediationFlow::new(result.clone())));
                    flows.insert(key, Arc::clone(&flow));
                    (flow, true)
                }
            }
        };

        if created {
            let flow_id = flow.lock().await.id;
            info!(
                flow = %flow_id,
                classification = %result.classification,
                vault = %result.vault_name,
                auto_started,
                "remediation flow started"
            );
            self.events.publish(EngineEvent::FlowStarted {
                flow_id,
                result: result.clone(),
                auto_started,
            });
            if auto_started && !result.auto_actions.is_empty() {
                self.execute_auto_actions(&flow).await;
            }
        } else {
            let mut guard = flow.lock().await;
            guard.update_result(result);
            self.events.publish(EngineEvent::FlowUpdated {
                flow_id: guard.id,
                classification: guard.classification(),
            });
        }
        flow
    }

    /// Drops a completed flow from the registry. Keeps incomplete flows.
    pub async fn retire_flow(&self, vault_id: Uuid, classification: Classification) -> bool {
        let mut flows = self.flows.write().await;
        if let Some(flow) = flows.get(&(vault_id, classification)) {
            if flow.lock().await.is_complete() {
                flows.remove(&(vault_id, classification));
                metrics::gauge!("vg_active_flows").set(flows.len() as f64);
                return true;
            }
        }
        false
    }

    /// Signals the background loops to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Spawns the periodic analysis loop and the capture poll.
    pub fn spawn(self: Arc<Self>) -> EngineHandle {
        let analysis = tokio::spawn(Self::analysis_loop(Arc::clone(&self)));
        let capture = tokio::spawn(Self::capture_loop(Arc::clone(&self)));
        EngineHandle {
            shutdown: self.shutdown.clone(),
            analysis,
            capture,
        }
    }

    async fn analysis_loop(engine: Arc<Self>) {
        let mut interval = tokio::time::interval(engine.config.analysis_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut shutdown = engine.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = engine.run_analysis_cycle(false).await {
                        error!(%error, "analysis cycle failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("analysis loop stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn capture_loop(engine: Arc<Self>) {
        let mut interval = tokio::time::interval(engine.config.capture_poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut shutdown = engine.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let captured = engine.capture.is_captured();
                    let was = engine.capture_active.swap(captured, Ordering::SeqCst);
                    if captured && !was {
                        info!("screen capture became active");
                        engine.events.publish(EngineEvent::CaptureDetected {
                            at: chrono::Utc::now(),
                        });
                        if let Err(error) = engine.run_analysis_cycle(true).await {
                            error!(%error, "capture-triggered cycle failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("capture loop stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn dispatch_alerts(&self, results: &[TriageResult]) {
        for result in results.iter().filter(|r| r.severity == Severity::Critical) {
            if let Err(error) = self
                .alerts
                .notify(
                    &result.title,
                    &result.description,
                    result.classification.as_str(),
                )
                .await
            {
                warn!(%error, classification = %result.classification, "alert dispatch failed");
            } else {
                metrics::counter!("vg_alerts_dispatched_total").increment(1);
            }
            self.events.publish(EngineEvent::CriticalFinding {
                result: result.clone(),
            });
        }
    }

    /// Folds re-derived results into their existing flows.
    async fn refresh_flows(&self, results: &[TriageResult]) {
        let flows = self.flows.read().await;
        for result in results {
            if let Some(flow) = flows.get(&(result.vault_id, result.classification)) {
                let mut guard = flow.lock().await;
                guard.update_result(result.clone());
                self.events.publish(EngineEvent::FlowUpdated {
                    flow_id: guard.id,
                    classification: guard.classification(),
                });
            }
        }
    }

    /// Auto-starts a flow for the most urgent critical result that has no
    /// active flow yet. One per cycle; the next cycle picks up the rest.
    async fn auto_start(&self, results: &[TriageResult]) -> Option<Uuid> {
        let candidate = {
            let flows = self.flows.read().await;
            results
                .iter()
                .find(|r| {
                    r.severity == Severity::Critical
                        && !flows.contains_key(&(r.vault_id, r.classification))
                })
                .cloned()
        }?;

        let flow = self.start_flow(candidate, true).await;
        let flow_id = flow.lock().await.id;
        Some(flow_id)
    }

    async fn execute_auto_actions(&self, flow: &SharedFlow) {
        let (flow_id, actions) = {
            let guard = flow.lock().await;
            (guard.id, guard.result().auto_actions.clone())
        };
        for action in actions {
            // Policy guard: the triage engine only emits safe actions, but
            // dispatch is the last line.
            if !action.is_safe_for_auto() {
                warn!(action = action.name(), "unsafe action skipped by auto policy");
                continue;
            }
            let outcome = self.dispatch.execute(&action).await;
            if outcome.success {
                info!(flow = %flow_id, action = action.name(), changed = outcome.changed, "auto action executed");
            } else {
                warn!(flow = %flow_id, action = action.name(), error = ?outcome.error, "auto action failed");
            }
            flow.lock().await.complete_auto_action(&action, &outcome);
            self.events.publish(EngineEvent::ActionExecuted {
                flow_id,
                outcome,
            });
        }
    }
}

/// Handle over the spawned background loops.
pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    analysis: JoinHandle<()>,
    capture: JoinHandle<()>,
}

impl EngineHandle {
    /// Signals shutdown and waits for both loops to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.analysis.await;
        let _ = self.capture.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowState;
    use crate::remediation::{ActionOutcome, RemediationAction};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::Mutex as AsyncMutex;
    use vg_connectors::{
        ActivityRecord, ActivityType, MockVaultDirectory, RecordingAlertSink,
        TestCaptureSensor, VaultRef,
    };

    /// Dispatch stub that records executed actions and always succeeds.
    #[derive(Default)]
    struct RecordingDispatch {
        executed: AsyncMutex<Vec<RemediationAction>>,
    }

    #[async_trait]
    impl ActionDispatch for RecordingDispatch {
        async fn execute(&self, action: &RemediationAction) -> ActionOutcome {
            self.executed.lock().await.push(action.clone());
            ActionOutcome::success(action.action_id(), "done")
        }
    }

    fn brute_force_snapshot(name: &str) -> VaultSnapshot {
        let mut snapshot = VaultSnapshot::new(VaultRef::new(name));
        let now = Utc::now();
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::LoginFailure,
                now - ChronoDuration::minutes(i),
            ));
        }
        snapshot
    }

    fn quiet_snapshot(name: &str) -> VaultSnapshot {
        let mut snapshot = VaultSnapshot::new(VaultRef::new(name));
        let now = Utc::now();
        for day in 1..4 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::Access,
                now - ChronoDuration::days(day),
            ));
        }
        snapshot
    }

    struct Harness {
        engine: Arc<VaultGuardEngine>,
        directory: Arc<MockVaultDirectory>,
        dispatch: Arc<RecordingDispatch>,
        alerts: Arc<RecordingAlertSink>,
        capture: Arc<TestCaptureSensor>,
    }

    async fn harness(snapshots: Vec<VaultSnapshot>) -> Harness {
        let directory = Arc::new(MockVaultDirectory::new());
        for snapshot in snapshots {
            directory.insert_vault(snapshot).await;
        }
        let dispatch = Arc::new(RecordingDispatch::default());
        let alerts = Arc::new(RecordingAlertSink::new());
        let capture = Arc::new(TestCaptureSensor::new());
        let engine = Arc::new(VaultGuardEngine::new(
            EngineConfig::default(),
            directory.clone(),
            dispatch.clone(),
            alerts.clone(),
            capture.clone(),
        ));
        Harness {
            engine,
            directory,
            dispatch,
            alerts,
            capture,
        }
    }

    #[tokio::test]
    async fn test_quiet_vaults_produce_nothing() {
        let h = harness(vec![quiet_snapshot("Personal"), quiet_snapshot("Work")]).await;
        let summary = h.engine.run_analysis_cycle(false).await.expect("cycle");
        assert_eq!(summary.vaults_analyzed, 2);
        assert_eq!(summary.findings, 0);
        assert!(summary.results.is_empty());
        assert!(summary.flows_started.is_empty());
        assert!(h.alerts.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_critical_result_auto_starts_flow_and_runs_auto_actions() {
        let h = harness(vec![brute_force_snapshot("Personal")]).await;
        let summary = h.engine.run_analysis_cycle(false).await.expect("cycle");

        assert_eq!(summary.flows_started.len(), 1);
        let executed = h.dispatch.executed.lock().await.clone();
        // Brute force auto actions: lock vault then revoke sessions.
        assert_eq!(executed.len(), 2);
        assert!(matches!(executed[0], RemediationAction::LockVault { .. }));
        assert!(matches!(executed[1], RemediationAction::RevokeAllSessions));

        // Auto actions recorded on the flow; questions still pending.
        let vault_id = summary.results[0].vault_id;
        let flow = h
            .engine
            .flow(vault_id, Classification::BruteForce)
            .await
            .expect("flow registered");
        let guard = flow.lock().await;
        assert_eq!(guard.completed_actions().len(), 2);
        assert!(matches!(guard.state(), FlowState::AwaitingQuestion(0)));

        // A critical alert was dispatched.
        let alerts = h.alerts.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].classification, "brute_force");
    }

    #[tokio::test]
    async fn test_rederived_result_updates_flow_instead_of_duplicating() {
        let h = harness(vec![brute_force_snapshot("Personal")]).await;
        h.engine.run_analysis_cycle(false).await.expect("first");
        assert_eq!(h.engine.active_flow_count().await, 1);

        // The same vault still shows the same pattern next cycle.
        let summary = h.engine.run_analysis_cycle(false).await.expect("second");
        assert_eq!(h.engine.active_flow_count().await, 1);
        assert!(summary.flows_started.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_vault_not_cycle() {
        let h = harness(vec![quiet_snapshot("Personal")]).await;
        // A vault listed by the directory but whose snapshot fetch fails.
        struct HalfBrokenSource {
            inner: Arc<MockVaultDirectory>,
            broken: VaultRef,
        }
        #[async_trait]
        impl ActivitySource for HalfBrokenSource {
            async fn list_vaults(&self) -> vg_connectors::ConnectorResult<Vec<VaultRef>> {
                let mut vaults = self.inner.list_vaults().await?;
                vaults.push(self.broken.clone());
                Ok(vaults)
            }
            async fn fetch_activity(
                &self,
                vault_id: Uuid,
            ) -> vg_connectors::ConnectorResult<VaultSnapshot> {
                self.inner.fetch_activity(vault_id).await
            }
        }

        let source = Arc::new(HalfBrokenSource {
            inner: h.directory.clone(),
            broken: VaultRef::new("Ghost"),
        });
        let engine = VaultGuardEngine::new(
            EngineConfig::default(),
            source,
            h.dispatch.clone(),
            h.alerts.clone(),
            h.capture.clone(),
        );

        let summary = engine.run_analysis_cycle(false).await.expect("cycle");
        assert_eq!(summary.vaults_analyzed, 1);
    }

    #[tokio::test]
    async fn test_forced_screen_monitoring_closes_all_vaults() {
        let h = harness(vec![quiet_snapshot("Personal"), quiet_snapshot("Work")]).await;
        let summary = h.engine.run_analysis_cycle(true).await.expect("cycle");

        let sm = summary
            .results
            .iter()
            .find(|r| r.classification == Classification::ScreenMonitoring)
            .expect("screen monitoring result");
        assert_eq!(sm.severity, Severity::Critical);
        assert_eq!(sm.affected_entities.len(), 2);

        let executed = h.dispatch.executed.lock().await.clone();
        assert!(executed.contains(&RemediationAction::CloseAllVaults));
        assert!(executed.contains(&RemediationAction::RecordMonitoringContext));
    }

    #[tokio::test]
    async fn test_auto_actions_disabled_only_alerts() {
        let h = harness(vec![brute_force_snapshot("Personal")]).await;
        let engine = VaultGuardEngine::new(
            EngineConfig {
                auto_actions_enabled: false,
                ..EngineConfig::default()
            },
            h.directory.clone(),
            h.dispatch.clone(),
            h.alerts.clone(),
            h.capture.clone(),
        );

        let summary = engine.run_analysis_cycle(false).await.expect("cycle");
        assert!(summary.flows_started.is_empty());
        assert_eq!(engine.active_flow_count().await, 0);
        assert!(h.dispatch.executed.lock().await.is_empty());
        assert!(!h.alerts.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_retire_flow_requires_completion() {
        let h = harness(vec![brute_force_snapshot("Personal")]).await;
        let summary = h.engine.run_analysis_cycle(false).await.expect("cycle");
        let vault_id = summary.results[0].vault_id;

        // Incomplete flow stays registered.
        assert!(
            !h.engine
                .retire_flow(vault_id, Classification::BruteForce)
                .await
        );

        let flow = h
            .engine
            .flow(vault_id, Classification::BruteForce)
            .await
            .expect("flow");
        {
            let mut guard = flow.lock().await;
            while let Some(q) = guard.current_question().map(str::to_string) {
                guard.answer_question(&q, "no").expect("answer");
            }
            for action in guard.remaining_actions().to_vec() {
                guard.skip_action(&action).expect("skip");
            }
            assert!(guard.is_complete());
        }

        assert!(
            h.engine
                .retire_flow(vault_id, Classification::BruteForce)
                .await
        );
        assert_eq!(h.engine.active_flow_count().await, 0);
    }

    #[tokio::test]
    async fn test_capture_poll_rising_edge_triggers_cycle() {
        let h = harness(vec![quiet_snapshot("Personal")]).await;
        let engine = Arc::new(VaultGuardEngine::new(
            EngineConfig {
                analysis_interval: Duration::from_secs(3600),
                capture_poll_interval: Duration::from_millis(10),
                ..EngineConfig::default()
            },
            h.directory.clone(),
            h.dispatch.clone(),
            h.alerts.clone(),
            h.capture.clone(),
        ));
        let mut events = engine.subscribe();
        let handle = Arc::clone(&engine).spawn();

        h.capture.set_captured(true);
        let detected = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Ok(EngineEvent::CaptureDetected { .. }) => break true,
                    Ok(_) => continue,
                    Err(_) => break false,
                }
            }
        })
        .await
        .expect("event within deadline");
        assert!(detected);

        // Holding the flag steady produces no second edge; the flow for
        // screen monitoring exists exactly once.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.active_flow_count().await, 1);

        handle.shutdown().await;
    }
}
