//! Access-pattern analysis.
//!
//! Works over the access-type records of a snapshot (owner and nominee
//! accesses). Uploads, deletions, and shares are handled by the tag
//! calculator and the detector bank.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use vg_connectors::VaultSnapshot;

/// Tunable thresholds for the access-pattern calculator.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Sliding window for burst detection, in seconds.
    pub burst_window_secs: i64,
    /// Minimum events inside the window to count as a burst.
    pub burst_threshold: usize,
    /// Consecutive gap below this is a temporal anomaly (machine-speed).
    pub rapid_gap_secs: i64,
    /// Consecutive gap above this is a temporal anomaly (dormancy break).
    pub dormancy_gap_days: i64,
    /// Start of the unusual-hours band, inclusive (local-free, UTC hour).
    pub unusual_hour_start: u32,
    /// End of the unusual-hours band, inclusive.
    pub unusual_hour_end: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            burst_window_secs: 60,
            burst_threshold: 5,
            rapid_gap_secs: 10,
            dormancy_gap_days: 30,
            unusual_hour_start: 1,
            unusual_hour_end: 5,
        }
    }
}

/// Derived access-pattern metrics for one vault snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessPatternMetrics {
    /// Access-type events in the snapshot.
    pub total_accesses: usize,
    /// Mean accesses per day over the observed span.
    pub frequency_per_day: f64,
    /// Consecutive-gap anomalies (machine-speed or dormancy-break).
    pub temporal_anomalies: usize,
    /// Accesses during the unusual-hours band.
    pub unusual_time_count: usize,
    /// Distinct bursts of rapid consecutive access.
    pub bursts_detected: usize,
    /// Access risk component in `[0, 1]`.
    pub risk_score: f64,
}

/// Runs the access-pattern calculator over a snapshot.
///
/// A snapshot with no access events yields all-zero metrics.
pub fn analyze(snapshot: &VaultSnapshot, config: &AccessConfig) -> AccessPatternMetrics {
    let mut timestamps: Vec<DateTime<Utc>> =
        snapshot.access_records().map(|r| r.timestamp).collect();
    if timestamps.is_empty() {
        return AccessPatternMetrics::default();
    }
    timestamps.sort_unstable();

    let total = timestamps.len();
    let span_days = span_in_days(&timestamps);
    let frequency = total as f64 / span_days;

    let mut anomalies = 0;
    for pair in timestamps.windows(2) {
        let gap = pair[1] - pair[0];
        if gap.num_seconds() < config.rapid_gap_secs
            || gap.num_days() > config.dormancy_gap_days
        {
            anomalies += 1;
        }
    }

    let unusual = timestamps
        .iter()
        .filter(|t| {
            let hour = t.hour();
            hour >= config.unusual_hour_start && hour <= config.unusual_hour_end
        })
        .count();

    let bursts = count_bursts(&timestamps, config);

    let risk = ((anomalies as f64 * 0.1).min(0.3)
        + (unusual as f64 * 0.05).min(0.3)
        + (bursts as f64 * 0.2).min(0.4))
    .min(1.0);

    AccessPatternMetrics {
        total_accesses: total,
        frequency_per_day: frequency,
        temporal_anomalies: anomalies,
        unusual_time_count: unusual,
        bursts_detected: bursts,
        risk_score: risk,
    }
}

/// Observed span clamped to a one-day minimum so single-day activity does
/// not produce a divide-by-zero or an inflated frequency.
fn span_in_days(sorted: &[DateTime<Utc>]) -> f64 {
    let span = *sorted.last().unwrap_or(&sorted[0]) - sorted[0];
    (span.num_seconds() as f64 / 86_400.0).max(1.0)
}

/// Counts maximal runs of at least `burst_threshold` events inside the
/// burst window. Events are consumed by the run they belong to, so one long
/// run counts once.
fn count_bursts(sorted: &[DateTime<Utc>], config: &AccessConfig) -> usize {
    let mut bursts = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len()
            && (sorted[j + 1] - sorted[i]).num_seconds() <= config.burst_window_secs
        {
            j += 1;
        }
        if j - i + 1 >= config.burst_threshold {
            bursts += 1;
            i = j + 1;
        } else {
            i += 1;
        }
    }
    bursts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vg_connectors::{ActivityRecord, ActivityType, VaultRef, VaultSnapshot};

    fn snapshot_with_accesses(timestamps: Vec<DateTime<Utc>>) -> VaultSnapshot {
        VaultSnapshot {
            vault: VaultRef::new("Personal"),
            records: timestamps
                .into_iter()
                .map(|t| ActivityRecord::new(ActivityType::Access, t))
                .collect(),
            documents: Vec::new(),
            nominees: Vec::new(),
        }
    }

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, min, sec).single().unwrap()
    }

    #[test]
    fn test_empty_snapshot_zero_metrics() {
        let metrics = analyze(&snapshot_with_accesses(Vec::new()), &AccessConfig::default());
        assert_eq!(metrics.total_accesses, 0);
        assert_eq!(metrics.risk_score, 0.0);
    }

    #[test]
    fn test_five_accesses_in_a_minute_is_one_burst() {
        let base = at(14, 0, 0);
        let timestamps = (0..5).map(|i| base + Duration::seconds(i * 12)).collect();
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert_eq!(metrics.bursts_detected, 1);
    }

    #[test]
    fn test_four_accesses_is_no_burst() {
        let base = at(14, 0, 0);
        let timestamps = (0..4).map(|i| base + Duration::seconds(i * 12)).collect();
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert_eq!(metrics.bursts_detected, 0);
    }

    #[test]
    fn test_two_separate_bursts() {
        let mut timestamps = Vec::new();
        for i in 0..5 {
            timestamps.push(at(9, 0, 0) + Duration::seconds(i * 11));
        }
        for i in 0..5 {
            timestamps.push(at(17, 30, 0) + Duration::seconds(i * 11));
        }
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert_eq!(metrics.bursts_detected, 2);
    }

    #[test]
    fn test_unusual_hours_counted() {
        let timestamps = vec![at(2, 15, 0), at(3, 40, 0), at(14, 0, 0)];
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert_eq!(metrics.unusual_time_count, 2);
    }

    #[test]
    fn test_machine_speed_gaps_are_anomalies() {
        let base = at(10, 0, 0);
        // Three gaps of 2 seconds each.
        let timestamps = (0..4).map(|i| base + Duration::seconds(i * 2)).collect();
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert_eq!(metrics.temporal_anomalies, 3);
    }

    #[test]
    fn test_risk_components_are_capped() {
        // A large burst plus many anomalies and night accesses saturates at
        // the per-component caps, not beyond.
        let base = at(2, 0, 0);
        let timestamps: Vec<_> = (0..40).map(|i| base + Duration::seconds(i)).collect();
        let metrics = analyze(&snapshot_with_accesses(timestamps), &AccessConfig::default());
        assert!(metrics.risk_score <= 1.0);
        assert!(metrics.bursts_detected >= 1);
        // 0.3 anomaly cap + 0.3 unusual-hours cap + at least one burst.
        assert!(metrics.risk_score >= 0.3 + 0.3 + 0.2 - 1e-9);
    }
}
