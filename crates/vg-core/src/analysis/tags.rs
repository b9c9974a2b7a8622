//! Document tag and exfiltration analysis.
//!
//! Scans document tags against a suspicion denylist, tracks content-type
//! spread, and derives an exfiltration risk from upload and share volume.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vg_connectors::{ActivityType, VaultSnapshot};

/// Substrings that make a tag suspicious, matched case-insensitively.
pub const SUSPICIOUS_TAG_KEYWORDS: &[&str] = &[
    "password",
    "secret",
    "confidential",
    "classified",
    "hack",
    "exploit",
    "vulnerability",
    "breach",
    "stolen",
    "leaked",
    "unauthorized",
];

/// Content types common enough that their presence is not notable.
const COMMON_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "text/plain",
];

/// Tunable thresholds for the tag calculator.
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// Uploads in 24 hours above which exfiltration risk is added.
    pub mass_upload_count: usize,
    /// Share-to-upload ratio above which exfiltration risk is added.
    pub share_ratio_threshold: f64,
    /// How many of the most frequent tags to report.
    pub top_tag_count: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            mass_upload_count: 20,
            share_ratio_threshold: 0.8,
            top_tag_count: 5,
        }
    }
}

/// Derived tag and exfiltration metrics for one vault snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagThreatMetrics {
    /// Total tag occurrences across documents.
    pub total_tags: usize,
    /// Distinct tags.
    pub unique_tags: usize,
    /// Most frequent tags, descending.
    pub top_tags: Vec<(String, usize)>,
    /// Tags matching the suspicion denylist.
    pub suspicious_tags: Vec<String>,
    /// Content types outside the common set.
    pub unusual_type_count: usize,
    /// Exfiltration sub-score in `[0, 0.8]`.
    pub exfiltration_risk: f64,
    /// Tag risk component in `[0, 1]`.
    pub risk_score: f64,
}

/// Runs the tag calculator over a snapshot.
///
/// A snapshot with no documents and no upload or share activity yields
/// all-zero metrics.
pub fn analyze(snapshot: &VaultSnapshot, config: &TagConfig) -> TagThreatMetrics {
    let uploads_24h =
        snapshot.count_within(ActivityType::Upload, chrono::Duration::hours(24));
    let uploads_total = snapshot.records_of(ActivityType::Upload).count();
    let shares_total = snapshot.records_of(ActivityType::Share).count();

    if snapshot.documents.is_empty() && uploads_total == 0 && shares_total == 0 {
        return TagThreatMetrics::default();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total_tags = 0;
    for doc in &snapshot.documents {
        for tag in &doc.tags {
            total_tags += 1;
            *counts.entry(tag.to_lowercase()).or_insert(0) += 1;
        }
    }

    let mut suspicious: Vec<String> = counts
        .keys()
        .filter(|tag| {
            SUSPICIOUS_TAG_KEYWORDS
                .iter()
                .any(|keyword| tag.contains(keyword))
        })
        .cloned()
        .collect();
    suspicious.sort();

    let unusual_types = snapshot
        .documents
        .iter()
        .filter(|doc| !COMMON_CONTENT_TYPES.contains(&doc.content_type.as_str()))
        .count();

    let mut top_tags: Vec<(String, usize)> = counts.into_iter().collect();
    top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let unique_tags = top_tags.len();
    top_tags.truncate(config.top_tag_count);

    // Share ratio relates outbound shares to uploads, so a vault that only
    // ingests documents does not look like a sink-and-forward channel.
    let share_ratio = if uploads_total == 0 {
        0.0
    } else {
        shares_total as f64 / uploads_total as f64
    };
    let mut exfiltration = 0.0;
    if uploads_24h > config.mass_upload_count {
        exfiltration += 0.5;
    }
    if share_ratio > config.share_ratio_threshold {
        exfiltration += 0.3;
    }

    let risk = ((suspicious.len() as f64 * 0.2).min(0.4)
        + exfiltration * 0.4
        + (unusual_types as f64 * 0.1).min(0.2))
    .min(1.0);

    TagThreatMetrics {
        total_tags,
        unique_tags,
        top_tags,
        suspicious_tags: suspicious,
        unusual_type_count: unusual_types,
        exfiltration_risk: exfiltration,
        risk_score: risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use vg_connectors::{ActivityRecord, DocumentMeta, VaultRef, VaultSnapshot};

    fn snapshot(documents: Vec<DocumentMeta>, records: Vec<ActivityRecord>) -> VaultSnapshot {
        VaultSnapshot {
            vault: VaultRef::new("Personal"),
            records,
            documents,
            nominees: Vec::new(),
        }
    }

    fn doc(name: &str, content_type: &str, tags: &[&str]) -> DocumentMeta {
        DocumentMeta::new(name, content_type, tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_empty_snapshot_zero_metrics() {
        let metrics = analyze(&snapshot(Vec::new(), Vec::new()), &TagConfig::default());
        assert_eq!(metrics.total_tags, 0);
        assert_eq!(metrics.risk_score, 0.0);
    }

    #[test]
    fn test_denylist_matching_is_case_insensitive_substring() {
        let docs = vec![
            doc("a.pdf", "application/pdf", &["My-Passwords", "taxes"]),
            doc("b.pdf", "application/pdf", &["TOP-SECRET"]),
        ];
        let metrics = analyze(&snapshot(docs, Vec::new()), &TagConfig::default());
        assert_eq!(metrics.suspicious_tags.len(), 2);
        assert!(metrics.suspicious_tags.contains(&"my-passwords".to_string()));
        assert!(metrics.suspicious_tags.contains(&"top-secret".to_string()));
    }

    #[test]
    fn test_mass_upload_raises_exfiltration() {
        let now = Utc::now();
        let records: Vec<_> = (0..25)
            .map(|i| {
                ActivityRecord::new(ActivityType::Upload, now - Duration::minutes(i))
            })
            .collect();
        let metrics = analyze(&snapshot(Vec::new(), records), &TagConfig::default());
        assert!((metrics.exfiltration_risk - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_share_heavy_activity_raises_exfiltration() {
        let now = Utc::now();
        let mut records = Vec::new();
        for i in 0..25 {
            records.push(ActivityRecord::new(
                ActivityType::Upload,
                now - Duration::minutes(i),
            ));
        }
        for i in 0..22 {
            records.push(ActivityRecord::new(
                ActivityType::Share,
                now - Duration::minutes(i),
            ));
        }
        let metrics = analyze(&snapshot(Vec::new(), records), &TagConfig::default());
        // Both the 24-hour volume and the share ratio components fire.
        assert!((metrics.exfiltration_risk - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unusual_content_types_counted() {
        let docs = vec![
            doc("a.pdf", "application/pdf", &[]),
            doc("b.bin", "application/octet-stream", &[]),
            doc("c.db", "application/x-sqlite3", &[]),
        ];
        let metrics = analyze(&snapshot(docs, Vec::new()), &TagConfig::default());
        assert_eq!(metrics.unusual_type_count, 2);
    }

    #[test]
    fn test_top_tags_sorted_by_frequency() {
        let docs = vec![
            doc("a.pdf", "application/pdf", &["taxes", "home"]),
            doc("b.pdf", "application/pdf", &["taxes"]),
            doc("c.pdf", "application/pdf", &["taxes", "home", "car"]),
        ];
        let metrics = analyze(&snapshot(docs, Vec::new()), &TagConfig::default());
        assert_eq!(metrics.top_tags[0], ("taxes".to_string(), 3));
        assert_eq!(metrics.top_tags[1], ("home".to_string(), 2));
        assert_eq!(metrics.total_tags, 6);
        assert_eq!(metrics.unique_tags, 3);
    }
}
