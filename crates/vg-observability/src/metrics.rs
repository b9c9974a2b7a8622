//! Metrics collection for Vault Guard.
//!
//! Uses the `metrics` facade so the host application can install whichever
//! exporter it wants; the collector additionally tracks flow timings for KPI
//! snapshots.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Key performance indicators for the detection and remediation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KPIs {
    /// Mean time from flow creation to completion, in seconds.
    pub mean_time_to_remediate_secs: Option<i64>,
    /// Fraction of completed flows that were fully auto-remediated.
    pub auto_remediation_rate: f64,
    /// Total flows observed.
    pub total_flows: u64,
    /// Findings counted by severity label.
    pub findings_by_severity: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
struct FlowTiming {
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    auto_remediated: bool,
}

/// Metrics collector for the engine.
pub struct MetricsCollector {
    flow_timings: Arc<RwLock<HashMap<Uuid, FlowTiming>>>,
    findings_by_severity: Arc<RwLock<HashMap<String, u64>>>,
}

impl MetricsCollector {
    /// Creates a new collector and registers metric descriptions.
    pub fn new() -> Self {
        Self::register_metrics();
        Self {
            flow_timings: Arc::new(RwLock::new(HashMap::new())),
            findings_by_severity: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn register_metrics() {
        describe_counter!(
            "vg_analysis_cycles_total",
            "Total number of analysis cycles run"
        );
        describe_counter!("vg_findings_total", "Total number of findings emitted");
        describe_counter!(
            "vg_triage_results_total",
            "Total number of triage results produced"
        );
        describe_counter!(
            "vg_actions_executed_total",
            "Total number of remediation actions executed"
        );
        describe_counter!(
            "vg_enhancement_timeouts_total",
            "Total number of enhancement calls that timed out"
        );
        describe_counter!(
            "vg_alerts_dispatched_total",
            "Total number of critical alerts dispatched"
        );
        describe_gauge!("vg_active_flows", "Number of remediation flows in progress");
        describe_histogram!(
            "vg_cycle_duration_seconds",
            "Duration of a full analysis cycle"
        );
        describe_histogram!(
            "vg_action_duration_seconds",
            "Remediation action execution duration"
        );
    }

    /// Records a completed analysis cycle.
    pub fn record_cycle(&self, duration_secs: f64, findings: usize) {
        counter!("vg_analysis_cycles_total").increment(1);
        counter!("vg_findings_total").increment(findings as u64);
        histogram!("vg_cycle_duration_seconds").record(duration_secs);
    }

    /// Records a finding by severity.
    pub async fn record_finding(&self, severity: &str) {
        let mut by_severity = self.findings_by_severity.write().await;
        *by_severity.entry(severity.to_string()).or_insert(0) += 1;
    }

    /// Records a triage result.
    pub fn record_triage_result(&self, classification: &str, severity: &str) {
        counter!("vg_triage_results_total",
            "classification" => classification.to_string(),
            "severity" => severity.to_string())
        .increment(1);
    }

    /// Records a flow creation.
    pub async fn record_flow_started(&self, flow_id: Uuid, auto_started: bool) {
        gauge!("vg_active_flows").increment(1.0);
        let mut timings = self.flow_timings.write().await;
        timings.insert(
            flow_id,
            FlowTiming {
                created_at: Utc::now(),
                completed_at: None,
                auto_remediated: auto_started,
            },
        );
    }

    /// Records a flow completion.
    pub async fn record_flow_completed(&self, flow_id: Uuid) {
        gauge!("vg_active_flows").decrement(1.0);
        let mut timings = self.flow_timings.write().await;
        if let Some(timing) = timings.get_mut(&flow_id) {
            timing.completed_at = Some(Utc::now());
        }
    }

    /// Records a remediation action execution.
    pub fn record_action(&self, action: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "failure" };
        counter!("vg_actions_executed_total", "action" => action.to_string(), "status" => status)
            .increment(1);
        histogram!("vg_action_duration_seconds", "action" => action.to_string())
            .record(duration_secs);
    }

    /// Records an enhancement timeout.
    pub fn record_enhancement_timeout(&self) {
        counter!("vg_enhancement_timeouts_total").increment(1);
    }

    /// Records a dispatched critical alert.
    pub fn record_alert(&self, classification: &str) {
        counter!("vg_alerts_dispatched_total", "classification" => classification.to_string())
            .increment(1);
    }

    /// Calculates current KPIs.
    pub async fn calculate_kpis(&self) -> KPIs {
        let timings = self.flow_timings.read().await;
        let findings = self.findings_by_severity.read().await;

        let remediation_times: Vec<i64> = timings
            .values()
            .filter_map(|t| t.completed_at.map(|c| (c - t.created_at).num_seconds()))
            .collect();

        let mean_time_to_remediate_secs = if remediation_times.is_empty() {
            None
        } else {
            let sum: i64 = remediation_times.iter().sum();
            Some(sum / remediation_times.len() as i64)
        };

        let completed = timings.values().filter(|t| t.completed_at.is_some());
        let (auto, total) = completed.fold((0u64, 0u64), |(auto, total), t| {
            (auto + u64::from(t.auto_remediated), total + 1)
        });
        let auto_remediation_rate = if total > 0 {
            auto as f64 / total as f64
        } else {
            0.0
        };

        KPIs {
            mean_time_to_remediate_secs,
            auto_remediation_rate,
            total_flows: timings.len() as u64,
            findings_by_severity: findings.clone(),
        }
    }

    /// Drops timing entries older than the cutoff.
    pub async fn cleanup(&self, max_age_hours: i64) {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let mut timings = self.flow_timings.write().await;
        timings.retain(|_, t| t.created_at > cutoff);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flow_timing() {
        let collector = MetricsCollector::new();
        let flow_id = Uuid::new_v4();

        collector.record_flow_started(flow_id, true).await;
        collector.record_flow_completed(flow_id).await;

        let kpis = collector.calculate_kpis().await;
        assert!(kpis.mean_time_to_remediate_secs.is_some());
        assert_eq!(kpis.total_flows, 1);
        assert_eq!(kpis.auto_remediation_rate, 1.0);
    }

    #[tokio::test]
    async fn test_auto_remediation_rate() {
        let collector = MetricsCollector::new();
        let auto = Uuid::new_v4();
        let manual = Uuid::new_v4();

        collector.record_flow_started(auto, true).await;
        collector.record_flow_started(manual, false).await;
        collector.record_flow_completed(auto).await;
        collector.record_flow_completed(manual).await;

        let kpis = collector.calculate_kpis().await;
        assert_eq!(kpis.auto_remediation_rate, 0.5);
    }

    #[tokio::test]
    async fn test_findings_by_severity() {
        let collector = MetricsCollector::new();
        collector.record_finding("critical").await;
        collector.record_finding("critical").await;
        collector.record_finding("high").await;

        let kpis = collector.calculate_kpis().await;
        assert_eq!(kpis.findings_by_severity.get("critical"), Some(&2));
        assert_eq!(kpis.findings_by_severity.get("high"), Some(&1));
    }
}
