//! The detector bank.
//!
//! Three detector families run over each vault snapshot per cycle: leak
//! rules, metric-threshold rules over the analysis output, and raw-log
//! pattern rules. Their findings are merged and sorted by severity, then
//! recency. Findings are valid for one cycle only; persistence is the
//! responsibility of remediation flows.

use crate::analysis::ThreatMetrics;
use crate::threat::{
    DataLeak, DataLeakKind, Severity, ThreatItem, ThreatKind, ThreatPattern, ThreatSource,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vg_connectors::{ActivityType, GeoPoint, VaultSnapshot};

/// Tunable thresholds for the detector bank.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Uploads within the mass-upload window to fire the leak rule.
    pub mass_upload_count: usize,
    /// Mass-upload trailing window in hours.
    pub mass_upload_window_hours: i64,
    /// Distinct access locations above which account sharing is suspected.
    pub account_sharing_locations: usize,
    /// Deletions as a fraction of the whole activity log.
    pub mass_deletion_ratio: f64,
    /// Geographic risk component above which an anomaly finding fires.
    pub geo_anomaly_risk: f64,
    /// Exfiltration sub-score above which an exfiltration finding fires.
    pub exfiltration_risk: f64,
    /// Accesses inside the rapid window to fire the rapid-access rule.
    pub rapid_access_count: usize,
    /// Rapid-access window in seconds.
    pub rapid_access_window_secs: i64,
    /// Distance from the running location baseline that is unusual, in km.
    pub unusual_location_km: f64,
    /// How many prior located accesses feed the running baseline.
    pub unusual_location_history: usize,
    /// Consecutive-access jump that is physically implausible, in km.
    pub impossible_travel_km: f64,
    /// Window for the implausible jump, in seconds.
    pub impossible_travel_window_secs: i64,
    /// Failed unlocks inside the brute-force window to fire.
    pub brute_force_failures: usize,
    /// Brute-force window in seconds.
    pub brute_force_window_secs: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mass_upload_count: 20,
            mass_upload_window_hours: 24,
            account_sharing_locations: 5,
            mass_deletion_ratio: 0.3,
            geo_anomaly_risk: 0.7,
            exfiltration_risk: 0.6,
            rapid_access_count: 5,
            rapid_access_window_secs: 30,
            unusual_location_km: 1000.0,
            unusual_location_history: 10,
            impossible_travel_km: 500.0,
            impossible_travel_window_secs: 3600,
            brute_force_failures: 5,
            brute_force_window_secs: 600,
        }
    }
}

/// Runs every detector family over a snapshot and returns the merged,
/// sorted finding list.
pub fn run_all(
    snapshot: &VaultSnapshot,
    metrics: &ThreatMetrics,
    config: &DetectorConfig,
) -> Vec<ThreatItem> {
    let mut findings = detect_pattern_threats(snapshot, config);
    findings.extend(detect_metric_threats(snapshot, metrics, config));
    findings.extend(
        detect_leaks(snapshot, config)
            .iter()
            .map(DataLeak::to_threat_item),
    );
    sort_findings(&mut findings);
    findings
}

/// Sorts findings by severity descending, then timestamp descending.
/// The sort is stable so equal-key findings keep their detector order.
pub fn sort_findings(findings: &mut [ThreatItem]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

/// Data-leak rules: mass upload, account sharing, suspicious content, and
/// mass deletion.
pub fn detect_leaks(snapshot: &VaultSnapshot, config: &DetectorConfig) -> Vec<DataLeak> {
    let mut leaks = Vec::new();
    let vault = &snapshot.vault;

    let uploads = snapshot.count_within(
        ActivityType::Upload,
        Duration::hours(config.mass_upload_window_hours),
    );
    if uploads > config.mass_upload_count {
        leaks.push(leak(
            snapshot,
            DataLeakKind::MassUpload,
            Severity::High,
            "Mass document upload",
            format!(
                "{} documents uploaded to '{}' within {} hours",
                uploads, vault.name, config.mass_upload_window_hours
            ),
            uploads,
        ));
    }

    let distinct = distinct_access_locations(snapshot);
    if distinct > config.account_sharing_locations {
        leaks.push(leak(
            snapshot,
            DataLeakKind::AccountSharing,
            Severity::Medium,
            "Possible account sharing",
            format!(
                "'{}' was accessed from {} distinct locations",
                vault.name, distinct
            ),
            0,
        ));
    }

    let flagged = snapshot
        .documents
        .iter()
        .filter(|doc| {
            doc.tags.iter().any(|tag| {
                let lower = tag.to_lowercase();
                crate::analysis::SUSPICIOUS_TAG_KEYWORDS
                    .iter()
                    .any(|keyword| lower.contains(keyword))
            })
        })
        .count();
    if flagged > 0 {
        leaks.push(leak(
            snapshot,
            DataLeakKind::SuspiciousContent,
            Severity::High,
            "Suspiciously tagged documents",
            format!(
                "{} documents in '{}' carry tags associated with leaked material",
                flagged, vault.name
            ),
            flagged,
        ));
    }

    let deletions = snapshot.records_of(ActivityType::Deletion).count();
    if !snapshot.records.is_empty() {
        let ratio = deletions as f64 / snapshot.records.len() as f64;
        if ratio > config.mass_deletion_ratio {
            leaks.push(leak(
                snapshot,
                DataLeakKind::MassDeletion,
                Severity::Critical,
                "Mass document deletion",
                format!(
                    "{} deletions make up {:.0}% of recent activity in '{}'",
                    deletions,
                    ratio * 100.0,
                    vault.name
                ),
                deletions,
            ));
        }
    }

    leaks
}

/// Threshold rules over the analysis output.
pub fn detect_metric_threats(
    snapshot: &VaultSnapshot,
    metrics: &ThreatMetrics,
    config: &DetectorConfig,
) -> Vec<ThreatItem> {
    let mut findings = Vec::new();
    let now = Utc::now();

    if metrics.geo.risk_score > config.geo_anomaly_risk {
        findings.push(item(
            snapshot,
            ThreatKind::GeographicAnomaly,
            Severity::High,
            "Geographic access anomaly",
            format!(
                "Access to '{}' is spread over {} location clusters (spread {:.2})",
                snapshot.vault.name, metrics.geo.cluster_count, metrics.geo.location_spread
            ),
            now,
            ThreatSource::RiskAnalysis,
            None,
        ));
    }

    if metrics.access.bursts_detected > 0 {
        findings.push(item(
            snapshot,
            ThreatKind::AccessBurst,
            Severity::High,
            "Access burst",
            format!(
                "{} burst(s) of rapid consecutive access to '{}'",
                metrics.access.bursts_detected, snapshot.vault.name
            ),
            now,
            ThreatSource::RiskAnalysis,
            None,
        ));
    }

    if metrics.tags.exfiltration_risk > config.exfiltration_risk {
        findings.push(item(
            snapshot,
            ThreatKind::DataExfiltration,
            Severity::Critical,
            "Possible data exfiltration",
            format!(
                "Upload and sharing volume for '{}' match an exfiltration pattern",
                snapshot.vault.name
            ),
            now,
            ThreatSource::RiskAnalysis,
            None,
        ));
    }

    findings
}

/// Raw-log pattern rules: rapid access, unusual location and implausible
/// travel, deletion spikes, brute force, and denied access.
pub fn detect_pattern_threats(
    snapshot: &VaultSnapshot,
    config: &DetectorConfig,
) -> Vec<ThreatItem> {
    let mut findings = Vec::new();

    if let Some(at) = rapid_access_at(snapshot, config) {
        findings.push(item(
            snapshot,
            ThreatKind::Pattern(ThreatPattern::RapidAccess),
            Severity::High,
            "Rapid repeated access",
            format!(
                "{} accesses to '{}' within {} seconds",
                config.rapid_access_count, snapshot.vault.name, config.rapid_access_window_secs
            ),
            at,
            ThreatSource::PatternMonitor,
            None,
        ));
    }

    if let Some(finding) = unusual_location(snapshot, config) {
        findings.push(finding);
    }

    let deletions = snapshot.records_of(ActivityType::Deletion).count();
    if !snapshot.records.is_empty() {
        let ratio = deletions as f64 / snapshot.records.len() as f64;
        if ratio > config.mass_deletion_ratio {
            findings.push(item(
                snapshot,
                ThreatKind::Pattern(ThreatPattern::SuspiciousDeletion),
                Severity::High,
                "Deletion spike",
                format!(
                    "Deletions dominate recent activity in '{}' ({} of {} events)",
                    snapshot.vault.name,
                    deletions,
                    snapshot.records.len()
                ),
                Utc::now(),
                ThreatSource::PatternMonitor,
                Some(deletions),
            ));
        }
    }

    if let Some(at) = brute_force_at(snapshot, config) {
        findings.push(item(
            snapshot,
            ThreatKind::Pattern(ThreatPattern::BruteForce),
            Severity::Critical,
            "Brute-force unlock attempts",
            format!(
                "{} failed unlock attempts on '{}' within {} minutes",
                config.brute_force_failures,
                snapshot.vault.name,
                config.brute_force_window_secs / 60
            ),
            at,
            ThreatSource::PatternMonitor,
            None,
        ));
    }

    let denied: Vec<_> = snapshot.records_of(ActivityType::AccessDenied).collect();
    if let Some(last) = denied.last() {
        findings.push(item(
            snapshot,
            ThreatKind::Pattern(ThreatPattern::UnauthorizedAccess),
            Severity::Critical,
            "Unauthorized access attempt",
            format!(
                "{} access attempt(s) on '{}' were rejected by policy",
                denied.len(),
                snapshot.vault.name
            ),
            last.timestamp,
            ThreatSource::PatternMonitor,
            None,
        ));
    }

    findings
}

fn leak(
    snapshot: &VaultSnapshot,
    kind: DataLeakKind,
    severity: Severity,
    title: &str,
    description: String,
    affected: usize,
) -> DataLeak {
    DataLeak {
        id: Uuid::new_v4(),
        kind,
        severity,
        title: title.to_string(),
        description,
        vault_id: snapshot.vault.id,
        vault_name: snapshot.vault.name.clone(),
        detected_at: Utc::now(),
        affected_documents: affected,
    }
}

#[allow(clippy::too_many_arguments)]
fn item(
    snapshot: &VaultSnapshot,
    kind: ThreatKind,
    severity: Severity,
    title: &str,
    description: String,
    timestamp: DateTime<Utc>,
    source: ThreatSource,
    affected: Option<usize>,
) -> ThreatItem {
    ThreatItem {
        id: Uuid::new_v4(),
        kind,
        severity,
        title: title.to_string(),
        description,
        vault_id: snapshot.vault.id,
        vault_name: snapshot.vault.name.clone(),
        timestamp,
        source,
        affected_documents: affected,
    }
}

/// Distinct access locations, with coordinates rounded to ~100 m so GPS
/// jitter does not inflate the count.
fn distinct_access_locations(snapshot: &VaultSnapshot) -> usize {
    let mut seen: Vec<(i64, i64)> = Vec::new();
    for record in snapshot.access_records() {
        if let Some(loc) = record.location {
            let key = (
                (loc.latitude * 1000.0).round() as i64,
                (loc.longitude * 1000.0).round() as i64,
            );
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    seen.len()
}

/// Timestamp of the first window holding `rapid_access_count` accesses
/// inside `rapid_access_window_secs`, if any.
fn rapid_access_at(
    snapshot: &VaultSnapshot,
    config: &DetectorConfig,
) -> Option<DateTime<Utc>> {
    let mut timestamps: Vec<DateTime<Utc>> =
        snapshot.access_records().map(|r| r.timestamp).collect();
    if timestamps.len() < config.rapid_access_count {
        return None;
    }
    timestamps.sort_unstable();
    timestamps
        .windows(config.rapid_access_count)
        .find(|w| {
            (w[config.rapid_access_count - 1] - w[0]).num_seconds()
                < config.rapid_access_window_secs
        })
        .map(|w| w[config.rapid_access_count - 1])
}

/// One finding for location anomalies, preferring the implausible-travel
/// variant when both rules fire.
fn unusual_location(snapshot: &VaultSnapshot, config: &DetectorConfig) -> Option<ThreatItem> {
    let located: Vec<(DateTime<Utc>, GeoPoint)> = snapshot
        .access_records()
        .filter_map(|r| r.location.map(|loc| (r.timestamp, loc)))
        .collect();
    if located.len() < 2 {
        return None;
    }

    // Implausible travel: consecutive located accesses too far apart for
    // the elapsed time.
    for pair in located.windows(2) {
        let (t0, p0) = pair[0];
        let (t1, p1) = pair[1];
        let elapsed = (t1 - t0).num_seconds();
        if elapsed <= config.impossible_travel_window_secs
            && p0.distance_km(&p1) > config.impossible_travel_km
        {
            return Some(item(
                snapshot,
                ThreatKind::Pattern(ThreatPattern::UnusualLocation),
                Severity::High,
                "Physically implausible travel",
                format!(
                    "Consecutive accesses to '{}' are {:.0} km apart within {} minutes",
                    snapshot.vault.name,
                    p0.distance_km(&p1),
                    (elapsed / 60).max(1)
                ),
                t1,
                ThreatSource::PatternMonitor,
                None,
            ));
        }
    }

    // Baseline deviation: an access far from the running mean of the
    // preceding located accesses.
    for idx in 1..located.len() {
        let start = idx.saturating_sub(config.unusual_location_history);
        let history = &located[start..idx];
        if history.len() < 3 {
            continue;
        }
        let n = history.len() as f64;
        let baseline = GeoPoint {
            latitude: history.iter().map(|(_, p)| p.latitude).sum::<f64>() / n,
            longitude: history.iter().map(|(_, p)| p.longitude).sum::<f64>() / n,
        };
        let (at, point) = located[idx];
        let distance = baseline.distance_km(&point);
        if distance > config.unusual_location_km {
            return Some(item(
                snapshot,
                ThreatKind::Pattern(ThreatPattern::UnusualLocation),
                Severity::Medium,
                "Access from unusual location",
                format!(
                    "Access to '{}' from {:.0} km outside its usual area",
                    snapshot.vault.name, distance
                ),
                at,
                ThreatSource::PatternMonitor,
                None,
            ));
        }
    }

    None
}

/// Timestamp of the first window holding `brute_force_failures` failed
/// unlocks inside `brute_force_window_secs`, if any.
fn brute_force_at(
    snapshot: &VaultSnapshot,
    config: &DetectorConfig,
) -> Option<DateTime<Utc>> {
    let mut failures: Vec<DateTime<Utc>> = snapshot
        .records_of(ActivityType::LoginFailure)
        .map(|r| r.timestamp)
        .collect();
    if failures.len() < config.brute_force_failures {
        return None;
    }
    failures.sort_unstable();
    failures
        .windows(config.brute_force_failures)
        .find(|w| {
            (w[config.brute_force_failures - 1] - w[0]).num_seconds()
                <= config.brute_force_window_secs
        })
        .map(|w| w[config.brute_force_failures - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_vault, AnalysisConfig};
    use chrono::Duration;
    use vg_connectors::{ActivityRecord, DocumentMeta, VaultRef};

    fn empty_snapshot() -> VaultSnapshot {
        VaultSnapshot::new(VaultRef::new("Personal"))
    }

    fn run(snapshot: &VaultSnapshot) -> Vec<ThreatItem> {
        let config = DetectorConfig::default();
        let metrics = analyze_vault(snapshot, &AnalysisConfig::default());
        run_all(snapshot, &metrics, &config)
    }

    #[test]
    fn test_quiet_vault_has_no_findings() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        for day in 0..5 {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::Access, now - Duration::days(day))
                    .with_location(GeoPoint::new(51.5074, -0.1278)),
            );
        }
        assert!(run(&snapshot).is_empty());
    }

    #[test]
    fn test_mass_upload_fires_alone() {
        // 25 uploads from one place, no deletions: only the mass-upload
        // leak may fire. Uploads are not access events, so no burst, no
        // sharing, no exfiltration-by-ratio.
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        let home = GeoPoint::new(51.5074, -0.1278);
        for i in 0..25 {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::Upload, now - Duration::minutes(i * 3))
                    .with_location(home),
            );
        }

        let findings = run(&snapshot);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, ThreatKind::Leak(DataLeakKind::MassUpload));
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].affected_documents, Some(25));
    }

    #[test]
    fn test_mass_deletion_ratio_uses_whole_log() {
        // 4 deletions out of 10 events is a 40% ratio: both the leak rule
        // and the pattern rule fire, each reporting 4 affected.
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        for i in 0..6 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::Access,
                now - Duration::hours(i + 1),
            ));
        }
        for i in 0..4 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::Deletion,
                now - Duration::minutes(i * 5),
            ));
        }

        let findings = run(&snapshot);
        let leak = findings
            .iter()
            .find(|f| f.kind == ThreatKind::Leak(DataLeakKind::MassDeletion))
            .expect("mass deletion leak");
        assert_eq!(leak.severity, Severity::Critical);
        assert_eq!(leak.affected_documents, Some(4));
        assert!(findings
            .iter()
            .any(|f| f.kind == ThreatKind::Pattern(ThreatPattern::SuspiciousDeletion)));
    }

    #[test]
    fn test_account_sharing_needs_distinct_locations() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        for i in 0..6 {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::Access, now - Duration::hours(i))
                    .with_location(GeoPoint::new(40.0 + i as f64, -70.0)),
            );
        }
        let leaks = detect_leaks(&snapshot, &DetectorConfig::default());
        assert!(leaks.iter().any(|l| l.kind == DataLeakKind::AccountSharing));
    }

    #[test]
    fn test_suspicious_content_counts_documents() {
        let mut snapshot = empty_snapshot();
        snapshot.documents.push(DocumentMeta::new(
            "creds.txt",
            "text/plain",
            vec!["passwords".to_string()],
        ));
        snapshot.documents.push(DocumentMeta::new(
            "notes.txt",
            "text/plain",
            vec!["recipes".to_string()],
        ));
        let leaks = detect_leaks(&snapshot, &DetectorConfig::default());
        let leak = leaks
            .iter()
            .find(|l| l.kind == DataLeakKind::SuspiciousContent)
            .expect("suspicious content leak");
        assert_eq!(leak.affected_documents, 1);
    }

    #[test]
    fn test_brute_force_window() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::LoginFailure,
                now - Duration::minutes(i),
            ));
        }
        let findings = detect_pattern_threats(&snapshot, &DetectorConfig::default());
        let bf = findings
            .iter()
            .find(|f| f.kind == ThreatKind::Pattern(ThreatPattern::BruteForce))
            .expect("brute force finding");
        assert_eq!(bf.severity, Severity::Critical);
    }

    #[test]
    fn test_spread_out_failures_do_not_fire() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::LoginFailure,
                now - Duration::hours(i * 2),
            ));
        }
        let findings = detect_pattern_threats(&snapshot, &DetectorConfig::default());
        assert!(!findings
            .iter()
            .any(|f| f.kind == ThreatKind::Pattern(ThreatPattern::BruteForce)));
    }

    #[test]
    fn test_access_denied_always_fires() {
        let mut snapshot = empty_snapshot();
        snapshot
            .records
            .push(ActivityRecord::new(ActivityType::AccessDenied, Utc::now()));
        let findings = detect_pattern_threats(&snapshot, &DetectorConfig::default());
        let ua = findings
            .iter()
            .find(|f| f.kind == ThreatKind::Pattern(ThreatPattern::UnauthorizedAccess))
            .expect("unauthorized access finding");
        assert_eq!(ua.severity, Severity::Critical);
    }

    #[test]
    fn test_impossible_travel_fires_high() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        snapshot.records.push(
            ActivityRecord::new(ActivityType::Access, now - Duration::minutes(30))
                .with_location(GeoPoint::new(51.5074, -0.1278)), // London
        );
        snapshot.records.push(
            ActivityRecord::new(ActivityType::Access, now)
                .with_location(GeoPoint::new(40.7128, -74.0060)), // New York
        );
        let findings = detect_pattern_threats(&snapshot, &DetectorConfig::default());
        let ul = findings
            .iter()
            .find(|f| f.kind == ThreatKind::Pattern(ThreatPattern::UnusualLocation))
            .expect("travel finding");
        assert_eq!(ul.severity, Severity::High);
    }

    #[test]
    fn test_unusual_location_against_baseline() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        let home = GeoPoint::new(51.5074, -0.1278);
        for day in (1..=5).rev() {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::Access, now - Duration::days(day))
                    .with_location(home),
            );
        }
        // Days later, an access from Tokyo. Too slow to be impossible
        // travel, far enough to deviate from the baseline.
        snapshot.records.push(
            ActivityRecord::new(ActivityType::Access, now)
                .with_location(GeoPoint::new(35.6762, 139.6503)),
        );
        let findings = detect_pattern_threats(&snapshot, &DetectorConfig::default());
        let ul = findings
            .iter()
            .find(|f| f.kind == ThreatKind::Pattern(ThreatPattern::UnusualLocation))
            .expect("unusual location finding");
        assert_eq!(ul.severity, Severity::Medium);
    }

    #[test]
    fn test_findings_sorted_by_severity_then_recency() {
        let mut snapshot = empty_snapshot();
        let now = Utc::now();
        // Brute force (critical) plus rapid access (high).
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::LoginFailure,
                now - Duration::minutes(30) - Duration::seconds(i * 10),
            ));
        }
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::Access,
                now - Duration::seconds(i * 5),
            ));
        }
        let findings = run(&snapshot);
        assert!(findings.len() >= 2);
        for pair in findings.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
            if pair[0].severity == pair[1].severity {
                assert!(pair[0].timestamp >= pair[1].timestamp);
            }
        }
        assert_eq!(findings[0].severity, Severity::Critical);
    }
}
