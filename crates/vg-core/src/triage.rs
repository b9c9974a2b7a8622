//! Threat triage.
//!
//! Findings from the detector bank are grouped per vault into one triage
//! result per classification. Each classification carries a static profile:
//! the verification questions asked before remediation, the recommended
//! action templates, and the subset eligible for automatic execution.
//! Automatic execution additionally requires the final result severity to
//! be critical.

use crate::analysis::ThreatMetrics;
use crate::remediation::RemediationAction;
use crate::threat::{DataLeakKind, Severity, ThreatItem, ThreatKind, ThreatPattern};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;
use vg_connectors::{ActivityType, VaultRef, VaultSnapshot};

/// Keywords in a document name or tag that mark it as containing personal
/// health or financial information.
pub const SENSITIVE_CONTENT_KEYWORDS: &[&str] = &[
    "medical",
    "health",
    "patient",
    "diagnosis",
    "treatment",
    "ssn",
    "social security",
    "credit card",
    "bank account",
];

/// Threat classification a triage result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ScreenMonitoring,
    CompromisedNominee,
    SensitiveDocuments,
    DataLeak,
    BruteForce,
    UnauthorizedAccess,
    SuspiciousActivity,
}

impl Classification {
    /// Stable label for logging, metrics, and alert payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScreenMonitoring => "screen_monitoring",
            Self::CompromisedNominee => "compromised_nominee",
            Self::SensitiveDocuments => "sensitive_documents",
            Self::DataLeak => "data_leak",
            Self::BruteForce => "brute_force",
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::SuspiciousActivity => "suspicious_activity",
        }
    }

    /// Display title for alerts and flow headers.
    pub fn title(&self) -> &'static str {
        match self {
            Self::ScreenMonitoring => "Screen monitoring detected",
            Self::CompromisedNominee => "Possible compromised nominee",
            Self::SensitiveDocuments => "Sensitive documents at risk",
            Self::DataLeak => "Data leak detected",
            Self::BruteForce => "Brute-force attack detected",
            Self::UnauthorizedAccess => "Unauthorized access detected",
            Self::SuspiciousActivity => "Suspicious vault activity",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Urgency of acting on a triage result.
///
/// Ordered so that a larger value is more urgent, matching [`Severity`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RemediationPriority {
    Low,
    Medium,
    High,
    Urgent,
    Immediate,
}

impl RemediationPriority {
    /// Priority implied by a result's severity.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Self::Immediate,
            Severity::High => Self::Urgent,
            Severity::Medium => Self::High,
            Severity::Low => Self::Low,
        }
    }
}

/// An unparameterized action slot in a classification profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTemplate {
    LockVault,
    CloseAllVaults,
    RevokeNominees,
    RevokeAllNominees,
    RevokeAllSessions,
    RedactDocuments,
    RestrictDocumentAccess,
    ChangeVaultPassword,
    ChangeAllPasswords,
    RecordMonitoringContext,
    ReviewAccessLogs,
    ReviewDocumentSharing,
    EnableDualKeyProtection,
    EnableEnhancedMonitoring,
}

/// Parameters available when turning templates into concrete actions.
#[derive(Debug, Clone, Default)]
pub struct TriageContext {
    pub vault_id: Uuid,
    /// Nominees currently holding conditional access.
    pub nominees: Vec<String>,
    /// Documents implicated by the result, if any.
    pub document_ids: Vec<Uuid>,
}

impl ActionTemplate {
    /// Instantiates the template for a context.
    ///
    /// Returns `None` when the context cannot support the action (no
    /// nominees to revoke, no documents to redact), so profiles can list
    /// templates unconditionally.
    pub fn instantiate(&self, ctx: &TriageContext) -> Option<RemediationAction> {
        match self {
            Self::LockVault => Some(RemediationAction::LockVault {
                vault_id: ctx.vault_id,
            }),
            Self::CloseAllVaults => Some(RemediationAction::CloseAllVaults),
            Self::RevokeNominees => {
                if ctx.nominees.is_empty() {
                    None
                } else {
                    Some(RemediationAction::RevokeNominees {
                        vault_id: ctx.vault_id,
                        nominees: ctx.nominees.clone(),
                    })
                }
            }
            Self::RevokeAllNominees => {
                if ctx.nominees.is_empty() {
                    None
                } else {
                    Some(RemediationAction::RevokeAllNominees {
                        vault_id: ctx.vault_id,
                    })
                }
            }
            Self::RevokeAllSessions => Some(RemediationAction::RevokeAllSessions),
            Self::RedactDocuments => {
                if ctx.document_ids.is_empty() {
                    None
                } else {
                    Some(RemediationAction::RedactDocuments {
                        vault_id: ctx.vault_id,
                        document_ids: ctx.document_ids.clone(),
                    })
                }
            }
            Self::RestrictDocumentAccess => {
                if ctx.document_ids.is_empty() {
                    None
                } else {
                    Some(RemediationAction::RestrictDocumentAccess {
                        vault_id: ctx.vault_id,
                        document_ids: ctx.document_ids.clone(),
                    })
                }
            }
            Self::ChangeVaultPassword => Some(RemediationAction::ChangeVaultPassword {
                vault_id: ctx.vault_id,
            }),
            Self::ChangeAllPasswords => Some(RemediationAction::ChangeAllPasswords),
            Self::RecordMonitoringContext => Some(RemediationAction::RecordMonitoringContext),
            Self::ReviewAccessLogs => Some(RemediationAction::ReviewAccessLogs {
                vault_id: ctx.vault_id,
            }),
            Self::ReviewDocumentSharing => Some(RemediationAction::ReviewDocumentSharing {
                vault_id: ctx.vault_id,
            }),
            Self::EnableDualKeyProtection => {
                Some(RemediationAction::EnableDualKeyProtection {
                    vault_id: ctx.vault_id,
                })
            }
            Self::EnableEnhancedMonitoring => {
                Some(RemediationAction::EnableEnhancedMonitoring {
                    vault_id: ctx.vault_id,
                })
            }
        }
    }
}

/// Static per-classification remediation profile.
#[derive(Debug)]
pub struct ClassificationProfile {
    pub classification: Classification,
    /// Severity assigned to results produced by direct rules (finding
    /// groups use the maximum finding severity instead).
    pub base_severity: Severity,
    /// Verification questions, asked in order before any action runs.
    pub questions: &'static [&'static str],
    /// Recommended action templates, in recommended execution order.
    pub actions: &'static [ActionTemplate],
    /// Subset eligible for automatic execution on critical results.
    pub auto_actions: &'static [ActionTemplate],
}

/// The classification table. Every classification has exactly one entry.
pub const CLASSIFICATION_TABLE: &[ClassificationProfile] = &[
    ClassificationProfile {
        classification: Classification::ScreenMonitoring,
        base_severity: Severity::Critical,
        questions: &[
            "Is anyone else able to see your screen right now?",
            "Do you recognize the monitoring or screen-sharing session?",
        ],
        actions: &[
            ActionTemplate::CloseAllVaults,
            ActionTemplate::RecordMonitoringContext,
            ActionTemplate::RevokeAllSessions,
            ActionTemplate::ChangeAllPasswords,
        ],
        auto_actions: &[
            ActionTemplate::CloseAllVaults,
            ActionTemplate::RecordMonitoringContext,
        ],
    },
    ClassificationProfile {
        classification: Classification::CompromisedNominee,
        base_severity: Severity::High,
        questions: &[
            "Do you recognize all recent nominee access locations?",
            "Have you shared nominee credentials with anyone?",
        ],
        actions: &[
            ActionTemplate::RevokeNominees,
            ActionTemplate::ChangeVaultPassword,
            ActionTemplate::EnableDualKeyProtection,
            ActionTemplate::ReviewAccessLogs,
        ],
        auto_actions: &[],
    },
    ClassificationProfile {
        classification: Classification::SensitiveDocuments,
        base_severity: Severity::High,
        questions: &[
            "Do these documents contain medical or financial information?",
            "Were they meant to be shared outside this vault?",
        ],
        actions: &[
            ActionTemplate::RestrictDocumentAccess,
            ActionTemplate::EnableDualKeyProtection,
            ActionTemplate::ReviewDocumentSharing,
        ],
        auto_actions: &[],
    },
    ClassificationProfile {
        classification: Classification::DataLeak,
        base_severity: Severity::High,
        questions: &[
            "Did you authorize the recent uploads or sharing from this vault?",
            "Do you recognize the devices involved?",
        ],
        actions: &[
            ActionTemplate::LockVault,
            ActionTemplate::ReviewDocumentSharing,
            ActionTemplate::ChangeVaultPassword,
            ActionTemplate::ReviewAccessLogs,
        ],
        auto_actions: &[ActionTemplate::LockVault],
    },
    ClassificationProfile {
        classification: Classification::BruteForce,
        base_severity: Severity::Critical,
        questions: &[
            "Did you recently mistype your password several times?",
            "Does anyone else know this vault's password?",
        ],
        actions: &[
            ActionTemplate::LockVault,
            ActionTemplate::RevokeAllSessions,
            ActionTemplate::ChangeVaultPassword,
            ActionTemplate::EnableDualKeyProtection,
        ],
        auto_actions: &[ActionTemplate::LockVault, ActionTemplate::RevokeAllSessions],
    },
    ClassificationProfile {
        classification: Classification::UnauthorizedAccess,
        base_severity: Severity::Critical,
        questions: &[
            "Did you attempt to access this vault from a new device?",
            "Do you recognize the rejected access attempts?",
        ],
        actions: &[
            ActionTemplate::LockVault,
            ActionTemplate::RevokeAllSessions,
            ActionTemplate::ReviewAccessLogs,
            ActionTemplate::ChangeVaultPassword,
        ],
        auto_actions: &[ActionTemplate::LockVault, ActionTemplate::RevokeAllSessions],
    },
    ClassificationProfile {
        classification: Classification::SuspiciousActivity,
        base_severity: Severity::Medium,
        questions: &["Do you recognize the recent activity in this vault?"],
        actions: &[
            ActionTemplate::ReviewAccessLogs,
            ActionTemplate::EnableEnhancedMonitoring,
            ActionTemplate::ChangeVaultPassword,
        ],
        auto_actions: &[],
    },
];

/// Looks up the profile for a classification.
pub fn profile_for(classification: Classification) -> &'static ClassificationProfile {
    // The table is total over the enum; the fallback is unreachable but
    // keeps the lookup panic-free.
    CLASSIFICATION_TABLE
        .iter()
        .find(|p| p.classification == classification)
        .unwrap_or(&CLASSIFICATION_TABLE[0])
}

/// Maps a finding kind to the classification that owns it.
pub fn classification_for(kind: &ThreatKind) -> Classification {
    match kind {
        ThreatKind::DataExfiltration => Classification::DataLeak,
        ThreatKind::Leak(DataLeakKind::UnauthorizedAccess) => {
            Classification::UnauthorizedAccess
        }
        ThreatKind::Leak(_) => Classification::DataLeak,
        ThreatKind::Pattern(ThreatPattern::BruteForce)
        | ThreatKind::Pattern(ThreatPattern::RapidAccess) => Classification::BruteForce,
        ThreatKind::Pattern(ThreatPattern::UnauthorizedAccess) => {
            Classification::UnauthorizedAccess
        }
        ThreatKind::GeographicAnomaly
        | ThreatKind::AccessBurst
        | ThreatKind::Pattern(ThreatPattern::UnusualLocation)
        | ThreatKind::Pattern(ThreatPattern::SuspiciousDeletion) => {
            Classification::SuspiciousActivity
        }
    }
}

/// A triaged, actionable threat for one vault and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageResult {
    pub id: Uuid,
    pub classification: Classification,
    pub severity: Severity,
    pub priority: RemediationPriority,
    pub title: String,
    pub description: String,
    pub vault_id: Uuid,
    pub vault_name: String,
    pub detected_at: DateTime<Utc>,
    /// Implicated parties or documents, by display name.
    pub affected_entities: Vec<String>,
    /// Implicated documents, when the classification is document-scoped.
    pub affected_document_ids: Vec<Uuid>,
    /// Verification questions, in order.
    pub questions: Vec<String>,
    /// Recommended actions, in recommended order.
    pub recommended_actions: Vec<RemediationAction>,
    /// Actions the engine may run without confirmation. Always a subset
    /// of `recommended_actions`; empty unless severity is critical.
    pub auto_actions: Vec<RemediationAction>,
}

/// Tunables for the direct triage rules.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Distinct nominee access locations above which a nominee account is
    /// considered compromised.
    pub nominee_location_limit: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            nominee_location_limit: 3,
        }
    }
}

/// Groups findings into triage results and applies the direct rules.
#[derive(Debug, Clone, Default)]
pub struct TriageEngine {
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    /// Produces the triage results for one vault's cycle output.
    ///
    /// Finding groups take the maximum severity of their members; direct
    /// rules use the profile's base severity.
    pub fn triage_vault(
        &self,
        snapshot: &VaultSnapshot,
        _metrics: &ThreatMetrics,
        findings: &[ThreatItem],
    ) -> Vec<TriageResult> {
        let mut results = Vec::new();

        // One result per classification, preserving first-seen order.
        let mut order: Vec<Classification> = Vec::new();
        for finding in findings {
            let class = classification_for(&finding.kind);
            if !order.contains(&class) {
                order.push(class);
            }
        }
        for class in order {
            let group: Vec<&ThreatItem> = findings
                .iter()
                .filter(|f| classification_for(&f.kind) == class)
                .collect();
            results.push(self.result_from_findings(snapshot, class, &group));
        }

        if let Some(result) = self.compromised_nominee(snapshot) {
            results.push(result);
        }
        if let Some(result) = self.sensitive_documents(snapshot) {
            results.push(result);
        }

        debug!(
            vault = %snapshot.vault.name,
            findings = findings.len(),
            results = results.len(),
            "triage complete"
        );
        results
    }

    /// Builds the account-wide result for a fresh capture detection.
    ///
    /// The result is attached to one vault for flow keying, but its scope
    /// is the whole account: entities list every known vault and the auto
    /// actions close them all.
    pub fn screen_monitoring_result(
        &self,
        vault: &VaultRef,
        all_vault_names: Vec<String>,
    ) -> TriageResult {
        let ctx = TriageContext {
            vault_id: vault.id,
            nominees: Vec::new(),
            document_ids: Vec::new(),
        };
        self.build_result(
            Classification::ScreenMonitoring,
            Severity::Critical,
            "Screen capture or mirroring became active while vaults are reachable"
                .to_string(),
            vault,
            Utc::now(),
            all_vault_names,
            Vec::new(),
            &ctx,
        )
    }

    /// Sorts merged results by severity, then priority, then recency, all
    /// descending. The sort is stable.
    pub fn consolidate(&self, mut results: Vec<TriageResult>) -> Vec<TriageResult> {
        results.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| b.detected_at.cmp(&a.detected_at))
        });
        results
    }

    fn result_from_findings(
        &self,
        snapshot: &VaultSnapshot,
        classification: Classification,
        group: &[&ThreatItem],
    ) -> TriageResult {
        let severity = group
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(profile_for(classification).base_severity);
        let detected_at = group
            .iter()
            .map(|f| f.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        let description = group
            .iter()
            .map(|f| f.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let entities: Vec<String> = group.iter().map(|f| f.title.clone()).collect();

        let ctx = TriageContext {
            vault_id: snapshot.vault.id,
            nominees: snapshot.nominees.clone(),
            document_ids: Vec::new(),
        };
        self.build_result(
            classification,
            severity,
            description,
            &snapshot.vault,
            detected_at,
            entities,
            Vec::new(),
            &ctx,
        )
    }

    /// Direct rule: nominee-attributed access from too many distinct
    /// locations.
    fn compromised_nominee(&self, snapshot: &VaultSnapshot) -> Option<TriageResult> {
        let mut locations: Vec<(i64, i64)> = Vec::new();
        let mut actors: HashSet<String> = HashSet::new();
        for record in snapshot.records_of(ActivityType::NomineeAccess) {
            if let Some(loc) = record.location {
                let key = (
                    (loc.latitude * 1000.0).round() as i64,
                    (loc.longitude * 1000.0).round() as i64,
                );
                if !locations.contains(&key) {
                    locations.push(key);
                }
            }
            if let Some(actor) = &record.actor {
                actors.insert(actor.clone());
            }
        }
        if locations.len() <= self.config.nominee_location_limit {
            return None;
        }

        let mut entities: Vec<String> = actors.into_iter().collect();
        entities.sort();
        let profile = profile_for(Classification::CompromisedNominee);
        let ctx = TriageContext {
            vault_id: snapshot.vault.id,
            nominees: if entities.is_empty() {
                snapshot.nominees.clone()
            } else {
                entities.clone()
            },
            document_ids: Vec::new(),
        };
        Some(self.build_result(
            Classification::CompromisedNominee,
            profile.base_severity,
            format!(
                "Nominee access to '{}' came from {} distinct locations",
                snapshot.vault.name,
                locations.len()
            ),
            &snapshot.vault,
            Utc::now(),
            entities,
            Vec::new(),
            &ctx,
        ))
    }

    /// Direct rule: documents whose name or tags indicate personal health
    /// or financial content.
    fn sensitive_documents(&self, snapshot: &VaultSnapshot) -> Option<TriageResult> {
        let mut names = Vec::new();
        let mut ids = Vec::new();
        for doc in &snapshot.documents {
            let name = doc.name.to_lowercase();
            let hit = SENSITIVE_CONTENT_KEYWORDS.iter().any(|k| {
                name.contains(k) || doc.tags.iter().any(|t| t.to_lowercase().contains(k))
            });
            if hit {
                names.push(doc.name.clone());
                ids.push(doc.id);
            }
        }
        if ids.is_empty() {
            return None;
        }

        let profile = profile_for(Classification::SensitiveDocuments);
        let ctx = TriageContext {
            vault_id: snapshot.vault.id,
            nominees: snapshot.nominees.clone(),
            document_ids: ids.clone(),
        };
        Some(self.build_result(
            Classification::SensitiveDocuments,
            profile.base_severity,
            format!(
                "{} documents in '{}' appear to contain personal health or financial data",
                ids.len(),
                snapshot.vault.name
            ),
            &snapshot.vault,
            Utc::now(),
            names,
            ids,
            &ctx,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_result(
        &self,
        classification: Classification,
        severity: Severity,
        description: String,
        vault: &VaultRef,
        detected_at: DateTime<Utc>,
        affected_entities: Vec<String>,
        affected_document_ids: Vec<Uuid>,
        ctx: &TriageContext,
    ) -> TriageResult {
        let profile = profile_for(classification);
        let recommended: Vec<RemediationAction> = profile
            .actions
            .iter()
            .filter_map(|t| t.instantiate(ctx))
            .collect();
        let auto: Vec<RemediationAction> = if severity == Severity::Critical {
            profile
                .auto_actions
                .iter()
                .filter_map(|t| t.instantiate(ctx))
                .filter(|a| a.is_safe_for_auto())
                .collect()
        } else {
            Vec::new()
        };

        TriageResult {
            id: Uuid::new_v4(),
            classification,
            severity,
            priority: RemediationPriority::from_severity(severity),
            title: profile.classification.title().to_string(),
            description,
            vault_id: vault.id,
            vault_name: vault.name.clone(),
            detected_at,
            affected_entities,
            affected_document_ids,
            questions: profile.questions.iter().map(|q| q.to_string()).collect(),
            recommended_actions: recommended,
            auto_actions: auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_vault, AnalysisConfig};
    use crate::detectors::{run_all, DetectorConfig};
    use chrono::Duration;
    use vg_connectors::{ActivityRecord, DocumentMeta, GeoPoint};

    fn engine() -> TriageEngine {
        TriageEngine::new(TriageConfig::default())
    }

    fn triage(snapshot: &VaultSnapshot) -> Vec<TriageResult> {
        let metrics = analyze_vault(snapshot, &AnalysisConfig::default());
        let findings = run_all(snapshot, &metrics, &DetectorConfig::default());
        engine().triage_vault(snapshot, &metrics, &findings)
    }

    #[test]
    fn test_table_is_total_and_consistent() {
        // Every classification appears exactly once, every auto template
        // is listed among the recommended templates, and every auto
        // template instantiates to an auto-safe action.
        let classes = [
            Classification::ScreenMonitoring,
            Classification::CompromisedNominee,
            Classification::SensitiveDocuments,
            Classification::DataLeak,
            Classification::BruteForce,
            Classification::UnauthorizedAccess,
            Classification::SuspiciousActivity,
        ];
        for class in classes {
            let entries: Vec<_> = CLASSIFICATION_TABLE
                .iter()
                .filter(|p| p.classification == class)
                .collect();
            assert_eq!(entries.len(), 1, "{} must appear once", class);
            let profile = entries[0];
            for auto in profile.auto_actions {
                assert!(
                    profile.actions.contains(auto),
                    "{}: auto template {:?} not recommended",
                    class,
                    auto
                );
                let ctx = TriageContext {
                    vault_id: Uuid::new_v4(),
                    nominees: vec!["Ravi".to_string()],
                    document_ids: vec![Uuid::new_v4()],
                };
                if let Some(action) = auto.instantiate(&ctx) {
                    assert!(
                        action.is_safe_for_auto(),
                        "{}: auto template {:?} is not auto-safe",
                        class,
                        auto
                    );
                }
            }
        }
    }

    #[test]
    fn test_brute_force_findings_become_critical_result() {
        let mut snapshot = VaultSnapshot::new(VaultRef::new("Personal"));
        let now = Utc::now();
        for i in 0..5 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::LoginFailure,
                now - Duration::minutes(i),
            ));
        }

        let results = triage(&snapshot);
        let bf = results
            .iter()
            .find(|r| r.classification == Classification::BruteForce)
            .expect("brute force result");
        assert_eq!(bf.severity, Severity::Critical);
        assert_eq!(bf.priority, RemediationPriority::Immediate);
        assert!(!bf.auto_actions.is_empty());
        for action in &bf.auto_actions {
            assert!(bf.recommended_actions.contains(action));
            assert!(action.is_safe_for_auto());
        }
    }

    #[test]
    fn test_medium_leak_gets_no_auto_actions() {
        // Account sharing alone is a medium data-leak result; auto actions
        // require critical severity.
        let mut snapshot = VaultSnapshot::new(VaultRef::new("Personal"));
        let now = Utc::now();
        for i in 0..6 {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::Access, now - Duration::days(i))
                    .with_location(GeoPoint::new(40.0 + i as f64 * 3.0, -70.0)),
            );
        }

        let results = triage(&snapshot);
        let leak = results
            .iter()
            .find(|r| r.classification == Classification::DataLeak)
            .expect("data leak result");
        assert_eq!(leak.severity, Severity::Medium);
        assert!(leak.auto_actions.is_empty());
        assert!(!leak.recommended_actions.is_empty());
    }

    #[test]
    fn test_findings_of_same_class_merge_into_one_result() {
        // Mass deletion (leak, critical) and the deletion-spike pattern map
        // to different classifications, but two leak kinds merge.
        let mut snapshot = VaultSnapshot::new(VaultRef::new("Personal"));
        let now = Utc::now();
        for i in 0..25 {
            snapshot.records.push(ActivityRecord::new(
                ActivityType::Upload,
                now - Duration::minutes(i),
            ));
        }
        snapshot.documents.push(DocumentMeta::new(
            "dump.txt",
            "text/plain",
            vec!["leaked".to_string()],
        ));

        let results = triage(&snapshot);
        let leaks: Vec<_> = results
            .iter()
            .filter(|r| r.classification == Classification::DataLeak)
            .collect();
        assert_eq!(leaks.len(), 1);
        // Mass upload and suspicious content are both high.
        assert_eq!(leaks[0].severity, Severity::High);
        assert_eq!(leaks[0].affected_entities.len(), 2);
    }

    #[test]
    fn test_compromised_nominee_rule() {
        let mut snapshot = VaultSnapshot::new(VaultRef::new("Family"));
        snapshot.nominees = vec!["Ravi".to_string(), "Mona".to_string()];
        let now = Utc::now();
        for i in 0..4 {
            snapshot.records.push(
                ActivityRecord::new(ActivityType::NomineeAccess, now - Duration::hours(i))
                    .with_location(GeoPoint::new(10.0 + i as f64 * 5.0, 20.0))
                    .with_actor("Ravi"),
            );
        }

        let results = triage(&snapshot);
        let cn = results
            .iter()
            .find(|r| r.classification == Classification::CompromisedNominee)
            .expect("compromised nominee result");
        assert_eq!(cn.severity, Severity::High);
        assert_eq!(cn.affected_entities, vec!["Ravi".to_string()]);
        // Revoke targets the implicated nominee, not the whole roster.
        assert!(cn.recommended_actions.iter().any(|a| matches!(
            a,
            RemediationAction::RevokeNominees { nominees, .. } if nominees == &vec!["Ravi".to_string()]
        )));
    }

    #[test]
    fn test_sensitive_documents_rule_collects_ids() {
        let mut snapshot = VaultSnapshot::new(VaultRef::new("Health"));
        let medical = DocumentMeta::new(
            "MRI diagnosis.pdf",
            "application/pdf",
            vec!["medical".to_string()],
        );
        let medical_id = medical.id;
        snapshot.documents.push(medical);
        snapshot
            .documents
            .push(DocumentMeta::new("car.pdf", "application/pdf", Vec::new()));

        let results = triage(&snapshot);
        let sd = results
            .iter()
            .find(|r| r.classification == Classification::SensitiveDocuments)
            .expect("sensitive documents result");
        assert_eq!(sd.affected_document_ids, vec![medical_id]);
        assert!(sd.recommended_actions.iter().any(|a| matches!(
            a,
            RemediationAction::RestrictDocumentAccess { document_ids, .. }
                if document_ids == &vec![medical_id]
        )));
    }

    #[test]
    fn test_screen_monitoring_result_is_account_wide() {
        let vault = VaultRef::new("Personal");
        let result = engine().screen_monitoring_result(
            &vault,
            vec!["Personal".to_string(), "Family".to_string()],
        );
        assert_eq!(result.classification, Classification::ScreenMonitoring);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.affected_entities.len(), 2);
        assert!(result
            .auto_actions
            .contains(&RemediationAction::CloseAllVaults));
        assert!(result
            .auto_actions
            .contains(&RemediationAction::RecordMonitoringContext));
    }

    #[test]
    fn test_consolidate_orders_by_severity_then_recency() {
        let vault = VaultRef::new("Personal");
        let eng = engine();
        let older_critical = eng.screen_monitoring_result(&vault, Vec::new());
        let mut newer_critical = eng.screen_monitoring_result(&vault, Vec::new());
        newer_critical.detected_at = older_critical.detected_at + Duration::seconds(5);
        let mut medium = eng.screen_monitoring_result(&vault, Vec::new());
        medium.severity = Severity::Medium;
        medium.priority = RemediationPriority::from_severity(Severity::Medium);

        let sorted = eng.consolidate(vec![medium.clone(), older_critical.clone(), newer_critical.clone()]);
        assert_eq!(sorted[0].id, newer_critical.id);
        assert_eq!(sorted[1].id, older_critical.id);
        assert_eq!(sorted[2].id, medium.id);
    }
}
