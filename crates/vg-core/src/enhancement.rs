//! Remediation step guidance.
//!
//! Every triage result gets an immediate rule-based step list. An optional
//! enhancement service can produce richer guidance, but it runs under a
//! hard timeout and can only replace steps the owner has not started
//! acting on. Once acted upon, the quick steps are authoritative and any
//! late enhancement is kept as advisory text.

use crate::threat::Severity;
use crate::triage::{Classification, TriageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vg_connectors::EnhancementService;

/// Bounds on the rule-based step list length.
const MIN_STEPS: usize = 3;
const MAX_STEPS: usize = 8;

/// The step guidance attached to one triage result.
#[derive(Debug, Clone)]
pub struct StepPlan {
    steps: Vec<String>,
    advisory: Option<Vec<String>>,
    acted: bool,
}

impl StepPlan {
    /// Starts a plan from the rule-based quick steps.
    pub fn new(steps: Vec<String>) -> Self {
        Self {
            steps,
            advisory: None,
            acted: false,
        }
    }

    /// The steps currently shown to the owner.
    pub fn active_steps(&self) -> &[String] {
        &self.steps
    }

    /// Late guidance held back because the owner already started acting.
    pub fn advisory(&self) -> Option<&[String]> {
        self.advisory.as_deref()
    }

    /// Marks the plan as acted upon. From here the active steps are
    /// authoritative and offers become advisory.
    pub fn mark_acted(&mut self) {
        self.acted = true;
    }

    /// Offers enhanced guidance. Replaces the active steps unless the
    /// owner already started acting on them.
    pub fn offer(&mut self, steps: Vec<String>) {
        if steps.is_empty() {
            return;
        }
        if self.acted {
            self.advisory = Some(steps);
        } else {
            self.steps = steps;
        }
    }
}

/// Builds the immediate rule-based step list for a result.
///
/// Always returns between three and eight steps, most urgent first.
pub fn quick_steps(result: &TriageResult) -> Vec<String> {
    let mut steps: Vec<String> = Vec::new();
    let urgent = result.severity >= Severity::High;

    if urgent && result.classification != Classification::ScreenMonitoring {
        steps.push(format!(
            "IMMEDIATE: Lock '{}' to stop further access",
            result.vault_name
        ));
    }

    match result.classification {
        Classification::ScreenMonitoring => {
            steps.push("IMMEDIATE: Close all vaults until the session is verified".to_string());
            steps.push("Stop any active screen sharing or mirroring session".to_string());
            steps.push("Record the monitoring source for the investigation".to_string());
        }
        Classification::BruteForce => {
            steps.push("Change this vault's password to a new, unique one".to_string());
            steps.push("Enable dual-key protection for future unlocks".to_string());
        }
        Classification::UnauthorizedAccess => {
            steps.push("Sign out of all active sessions".to_string());
            steps.push("Review the rejected access attempts in the access log".to_string());
        }
        Classification::CompromisedNominee => {
            steps.push("Review recent nominee access locations".to_string());
            steps.push("Revoke access for any nominee you cannot verify".to_string());
        }
        Classification::DataLeak => {
            steps.push("Review recent uploads and sharing activity".to_string());
            steps.push("Restrict access to the most sensitive documents".to_string());
        }
        Classification::SensitiveDocuments => {
            steps.push("Restrict the flagged documents to owner-only access".to_string());
            steps.push("Redact personal data before any further sharing".to_string());
        }
        Classification::SuspiciousActivity => {
            steps.push("Review the vault's recent activity log".to_string());
        }
    }

    steps.push("Enable enhanced threat monitoring for this vault".to_string());
    steps.push(
        "Watch the access logs over the next 24-48 hours for repeat activity".to_string(),
    );
    if result.severity == Severity::Critical {
        steps.push("Contact support if you did not authorize this activity".to_string());
    }

    while steps.len() < MIN_STEPS {
        steps.push("Verify each remediation step completed successfully".to_string());
    }
    steps.truncate(MAX_STEPS);
    steps
}

/// Text block describing a result for the enhancement service.
pub fn enhancement_context(result: &TriageResult) -> String {
    format!(
        "classification: {}\nseverity: {}\nvault: {}\ndetails: {}\naffected: {}",
        result.classification,
        result.severity,
        result.vault_name,
        result.description,
        result.affected_entities.join(", "),
    )
}

/// Wraps the enhancement service with quick-step fallback and a timeout.
pub struct StepEnhancer {
    service: Arc<dyn EnhancementService>,
    timeout: Duration,
}

impl StepEnhancer {
    pub fn new(service: Arc<dyn EnhancementService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Produces the step plan for a result.
    ///
    /// The quick steps are computed first and are the floor of the plan;
    /// if the service responds in time its steps replace them, and on
    /// timeout or error the quick steps stand.
    pub async fn plan(&self, result: &TriageResult) -> StepPlan {
        let mut plan = StepPlan::new(quick_steps(result));
        let context = enhancement_context(result);

        match tokio::time::timeout(self.timeout, self.service.generate_steps(&context)).await {
            Ok(Ok(steps)) => {
                debug!(
                    classification = %result.classification,
                    steps = steps.len(),
                    "enhanced remediation steps"
                );
                plan.offer(steps);
            }
            Ok(Err(error)) => {
                warn!(%error, "step enhancement failed, using quick steps");
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "step enhancement timed out, using quick steps"
                );
                metrics::counter!("vg_enhancement_timeouts_total").increment(1);
            }
        }
        plan
    }
}
