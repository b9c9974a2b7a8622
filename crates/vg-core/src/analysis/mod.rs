//! Risk analysis over vault snapshots.
//!
//! Three independent calculators (geographic, access-pattern, tag) each
//! produce a risk component in `[0, 1]`. The aggregator combines them with
//! fixed weights into a composite score and a severity level.

pub mod access;
pub mod geo;
pub mod history;
pub mod tags;

use crate::threat::Severity;
use serde::{Deserialize, Serialize};
use vg_connectors::VaultSnapshot;

pub use access::{AccessConfig, AccessPatternMetrics};
pub use geo::{GeoConfig, GeoThreatMetrics};
pub use history::{daily_scores, DailyThreatScore};
pub use tags::{TagConfig, TagThreatMetrics, SUSPICIOUS_TAG_KEYWORDS};

/// Weights applied to the three risk components.
#[derive(Debug, Clone, Copy)]
pub struct RiskWeights {
    pub geo: f64,
    pub access: f64,
    pub tag: f64,
}

/// The fixed component weights. They sum to 1.0 so the composite stays in
/// `[0, 1]` without renormalization.
pub const RISK_WEIGHTS: RiskWeights = RiskWeights {
    geo: 0.4,
    access: 0.3,
    tag: 0.3,
};

/// Configuration for all three calculators.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub geo: GeoConfig,
    pub access: AccessConfig,
    pub tags: TagConfig,
}

/// Combined analysis output for one vault snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatMetrics {
    pub geo: GeoThreatMetrics,
    pub access: AccessPatternMetrics,
    pub tags: TagThreatMetrics,
    /// Weighted composite of the three components, in `[0, 1]`.
    pub composite_risk: f64,
    /// Severity level derived from the composite.
    pub level: Severity,
}

/// Runs all three calculators and aggregates their scores.
pub fn analyze_vault(snapshot: &VaultSnapshot, config: &AnalysisConfig) -> ThreatMetrics {
    let geo = geo::analyze(snapshot, &config.geo);
    let access = access::analyze(snapshot, &config.access);
    let tags = tags::analyze(snapshot, &config.tags);

    let composite = (RISK_WEIGHTS.geo * geo.risk_score
        + RISK_WEIGHTS.access * access.risk_score
        + RISK_WEIGHTS.tag * tags.risk_score)
        .min(1.0);

    ThreatMetrics {
        geo,
        access,
        tags,
        composite_risk: composite,
        level: Severity::from_risk_score(composite),
    }
}
