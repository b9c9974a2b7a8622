//! Daily threat-score history.
//!
//! Produces a per-day score series from a snapshot so a caller can chart
//! how risky each recent day looked. The score is a simple weighted count,
//! not the composite risk used for severity.

use chrono::{Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use vg_connectors::{ActivityType, VaultSnapshot};

/// Score for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyThreatScore {
    pub date: NaiveDate,
    /// Weighted activity score, capped at 100.
    pub score: f64,
}

/// Builds the score series for the trailing `days` days, oldest first.
///
/// Per day: each access counts 0.5, each night access (before 06:00 or
/// after 22:00 UTC) counts 5, each deletion counts 10. Capped at 100.
pub fn daily_scores(snapshot: &VaultSnapshot, days: i64) -> Vec<DailyThreatScore> {
    let today = Utc::now().date_naive();
    let mut series = Vec::with_capacity(days.max(0) as usize);

    for offset in (0..days).rev() {
        let date = today - Duration::days(offset);
        let mut accesses = 0usize;
        let mut night_accesses = 0usize;
        let mut deletions = 0usize;

        for record in &snapshot.records {
            if record.timestamp.date_naive() != date {
                continue;
            }
            if record.is_access() {
                accesses += 1;
                let hour = record.timestamp.hour();
                if hour < 6 || hour > 22 {
                    night_accesses += 1;
                }
            } else if record.activity_type == ActivityType::Deletion {
                deletions += 1;
            }
        }

        let score = (accesses as f64 * 0.5
            + night_accesses as f64 * 5.0
            + deletions as f64 * 10.0)
            .min(100.0);
        series.push(DailyThreatScore { date, score });
    }

    series
}
