//! Threat and leak finding models.
//!
//! Findings are produced fresh each analysis cycle by the detector bank and
//! consumed read-only by the triage engine. A [`DataLeak`] is structurally
//! parallel to a [`ThreatItem`] and convertible to one for unified handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for findings and triage results.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, routine activity.
    #[default]
    Low,
    /// Worth a look.
    Medium,
    /// Needs prompt attention.
    High,
    /// Needs immediate containment.
    Critical,
}

impl Severity {
    /// Maps a composite risk score in `[0, 1]` to a level.
    ///
    /// This is the single level-classification function shared by the risk
    /// aggregator, the detector bank, and the triage engine.
    pub fn from_risk_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::Critical
        } else if score >= 0.5 {
            Self::High
        } else if score >= 0.25 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Stable lowercase label for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classic raw-log threat patterns surfaced by the pattern monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatPattern {
    RapidAccess,
    UnusualLocation,
    SuspiciousDeletion,
    BruteForce,
    UnauthorizedAccess,
}

/// Data-leak categories detected by the leak rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLeakKind {
    MassUpload,
    AccountSharing,
    SuspiciousContent,
    MassDeletion,
    UnauthorizedAccess,
}

impl DataLeakKind {
    /// Stable wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MassUpload => "mass_upload",
            Self::AccountSharing => "account_sharing",
            Self::SuspiciousContent => "suspicious_content",
            Self::MassDeletion => "mass_deletion",
            Self::UnauthorizedAccess => "unauthorized_access",
        }
    }
}

/// Unified classification tag for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    /// A classic pattern from the raw access log.
    Pattern(ThreatPattern),
    /// Geographic dispersion risk crossed its threshold.
    GeographicAnomaly,
    /// One or more access bursts were detected.
    AccessBurst,
    /// Tag/upload analysis indicates exfiltration.
    DataExfiltration,
    /// A data-leak rule fired.
    Leak(DataLeakKind),
}

impl ThreatKind {
    /// Stable label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pattern(ThreatPattern::RapidAccess) => "rapid_access",
            Self::Pattern(ThreatPattern::UnusualLocation) => "unusual_location",
            Self::Pattern(ThreatPattern::SuspiciousDeletion) => "suspicious_deletion",
            Self::Pattern(ThreatPattern::BruteForce) => "brute_force",
            Self::Pattern(ThreatPattern::UnauthorizedAccess) => "unauthorized_access",
            Self::GeographicAnomaly => "geographic_anomaly",
            Self::AccessBurst => "access_burst",
            Self::DataExfiltration => "data_exfiltration",
            Self::Leak(kind) => kind.as_str(),
        }
    }
}

impl std::fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which detector produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatSource {
    /// The raw-log pattern monitor.
    PatternMonitor,
    /// The metric calculators / risk aggregator.
    RiskAnalysis,
    /// The data-leak rules.
    LeakDetector,
}

/// A single finding for one vault, valid for one analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatItem {
    /// Finding identifier.
    pub id: Uuid,
    /// Classification tag.
    pub kind: ThreatKind,
    /// Severity level.
    pub severity: Severity,
    /// Short human-readable title.
    pub title: String,
    /// What was observed.
    pub description: String,
    /// Owning vault.
    pub vault_id: Uuid,
    /// Owning vault display name.
    pub vault_name: String,
    /// When the triggering activity happened.
    pub timestamp: DateTime<Utc>,
    /// Which detector produced it.
    pub source: ThreatSource,
    /// Number of affected documents, where meaningful.
    pub affected_documents: Option<usize>,
}

/// A detected data leak, parallel to [`ThreatItem`] with a document count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLeak {
    /// Leak identifier.
    pub id: Uuid,
    /// Leak category.
    pub kind: DataLeakKind,
    /// Severity level.
    pub severity: Severity,
    /// Short human-readable title.
    pub title: String,
    /// What was observed.
    pub description: String,
    /// Owning vault.
    pub vault_id: Uuid,
    /// Owning vault display name.
    pub vault_name: String,
    /// When the leak was detected.
    pub detected_at: DateTime<Utc>,
    /// Number of affected documents.
    pub affected_documents: usize,
}

impl DataLeak {
    /// Converts the leak into a [`ThreatItem`] view for unified handling.
    pub fn to_threat_item(&self) -> ThreatItem {
        ThreatItem {
            id: self.id,
            kind: ThreatKind::Leak(self.kind),
            severity: self.severity,
            title: self.title.clone(),
            description: self.description.clone(),
            vault_id: self.vault_id,
            vault_name: self.vault_name.clone(),
            timestamp: self.detected_at,
            source: ThreatSource::LeakDetector,
            affected_documents: Some(self.affected_documents),
        }
    }
}
