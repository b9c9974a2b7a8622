//! # vg-core
//!
//! Threat detection, triage, and guided remediation for a document-vault
//! account.
//!
//! The engine periodically snapshots each vault's activity, runs three risk
//! calculators and a bank of detectors over it, triages the findings into
//! per-classification results, and walks the owner through remediation via
//! question-gated flows. Critical results can auto-start a flow and execute
//! a safe subset of actions immediately.
//!
//! Everything with side effects sits behind the `vg-connectors` traits, so
//! the whole pipeline is testable against in-memory mocks.

pub mod analysis;
pub mod detectors;
pub mod engine;
pub mod enhancement;
pub mod events;
pub mod flow;
pub mod remediation;
pub mod threat;
pub mod triage;

pub use analysis::{
    analyze_vault, AnalysisConfig, ThreatMetrics, RISK_WEIGHTS, SUSPICIOUS_TAG_KEYWORDS,
};
pub use detectors::{run_all, DetectorConfig};
pub use engine::{CycleSummary, EngineConfig, EngineError, EngineHandle, VaultGuardEngine};
pub use enhancement::{quick_steps, StepEnhancer, StepPlan};
pub use events::{EngineEvent, EventBus};
pub use flow::{
    ActionDisposition, ActionFailure, CompletedAction, FlowError, FlowState, RemediationFlow,
};
pub use remediation::{ActionDispatch, ActionOutcome, RemediationAction};
pub use threat::{
    DataLeak, DataLeakKind, Severity, ThreatItem, ThreatKind, ThreatPattern, ThreatSource,
};
pub use triage::{
    classification_for, profile_for, ActionTemplate, Classification, ClassificationProfile,
    RemediationPriority, TriageConfig, TriageEngine, TriageResult, CLASSIFICATION_TABLE,
};
