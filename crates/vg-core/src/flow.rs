//! Guided remediation flows.
//!
//! A flow walks the owner through a triage result: verification questions
//! first, in order, then the recommended actions. Answers can append
//! follow-up actions. Failed actions stay pending so they can be retried;
//! the flow completes when every action is completed or skipped.

use crate::remediation::{ActionOutcome, RemediationAction};
use crate::triage::{Classification, TriageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Where a flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    /// Waiting for the answer to question `index`.
    AwaitingQuestion(usize),
    /// All questions answered; actions pending.
    AwaitingAction,
    /// Every action completed or skipped.
    Completed,
}

/// Invalid flow transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("expected question {expected:?}, got {got:?}")]
    QuestionOutOfOrder {
        expected: Option<String>,
        got: String,
    },
    #[error("all questions are already answered")]
    NoQuestionsPending,
    #[error("questions must be answered before actions run")]
    QuestionsPending,
    #[error("action {0} is not part of this flow")]
    UnknownAction(String),
    #[error("flow is already completed")]
    FlowCompleted,
}

/// Whether an action should actually be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDisposition {
    /// Execute it and report back with `complete_action`.
    Ready,
    /// Already done; executing again would be a no-op.
    AlreadyCompleted,
}

/// Record of an action that left the pending set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedAction {
    pub action: RemediationAction,
    /// False only for explicit skips recorded as completed.
    pub success: bool,
    pub message: String,
    pub completed_at: DateTime<Utc>,
}

/// Record of a failed execution attempt. The action itself stays pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFailure {
    pub action_id: String,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// One guided remediation session for a (vault, classification) pair.
#[derive(Debug, Clone)]
pub struct RemediationFlow {
    pub id: Uuid,
    result: TriageResult,
    current_step: usize,
    answers: Vec<(String, String)>,
    remaining_actions: Vec<RemediationAction>,
    completed_actions: Vec<CompletedAction>,
    failures: Vec<ActionFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RemediationFlow {
    /// Opens a flow over a triage result. The pending set starts as the
    /// result's recommended actions, in recommended order.
    pub fn new(result: TriageResult) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            remaining_actions: result.recommended_actions.clone(),
            result,
            current_step: 0,
            answers: Vec::new(),
            completed_actions: Vec::new(),
            failures: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn result(&self) -> &TriageResult {
        &self.result
    }

    pub fn classification(&self) -> Classification {
        self.result.classification
    }

    /// Current position in the flow.
    pub fn state(&self) -> FlowState {
        if self.current_step < self.result.questions.len() {
            FlowState::AwaitingQuestion(self.current_step)
        } else if self.remaining_actions.is_empty() {
            FlowState::Completed
        } else {
            FlowState::AwaitingAction
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == FlowState::Completed
    }

    /// The question awaiting an answer, if any.
    pub fn current_question(&self) -> Option<&str> {
        self.result
            .questions
            .get(self.current_step)
            .map(String::as_str)
    }

    pub fn answers(&self) -> &[(String, String)] {
        &self.answers
    }

    pub fn remaining_actions(&self) -> &[RemediationAction] {
        &self.remaining_actions
    }

    pub fn completed_actions(&self) -> &[CompletedAction] {
        &self.completed_actions
    }

    pub fn failures(&self) -> &[ActionFailure] {
        &self.failures
    }

    /// Answers the current question. Only the question at the current step
    /// is accepted; answering out of order is a hard error, not a skip.
    pub fn answer_question(
        &mut self,
        question: &str,
        answer: &str,
    ) -> Result<FlowState, FlowError> {
        match self.state() {
            FlowState::AwaitingQuestion(step) => {
                let expected = &self.result.questions[step];
                if expected != question {
                    return Err(FlowError::QuestionOutOfOrder {
                        expected: Some(expected.clone()),
                        got: question.to_string(),
                    });
                }
                self.answers.push((question.to_string(), answer.to_string()));
                self.current_step += 1;
                if self.current_step == self.result.questions.len() {
                    self.apply_follow_ups();
                }
                self.touch();
                Ok(self.state())
            }
            _ => Err(FlowError::NoQuestionsPending),
        }
    }

    /// Checks whether an action may execute now.
    ///
    /// Already-completed actions are a no-op signal regardless of state,
    /// so repeated execution requests stay idempotent.
    pub fn begin_action(
        &self,
        action: &RemediationAction,
    ) -> Result<ActionDisposition, FlowError> {
        if self
            .completed_actions
            .iter()
            .any(|c| &c.action == action)
        {
            return Ok(ActionDisposition::AlreadyCompleted);
        }
        if matches!(self.state(), FlowState::AwaitingQuestion(_)) {
            return Err(FlowError::QuestionsPending);
        }
        if !self.remaining_actions.contains(action) {
            if self.remaining_actions.is_empty() {
                return Err(FlowError::FlowCompleted);
            }
            return Err(FlowError::UnknownAction(action.action_id()));
        }
        Ok(ActionDisposition::Ready)
    }

    /// Records an execution outcome. Success moves the action to the
    /// completed set; failure records the attempt and keeps the action
    /// pending for retry.
    pub fn complete_action(
        &mut self,
        action: &RemediationAction,
        outcome: &ActionOutcome,
    ) -> Result<FlowState, FlowError> {
        match self.begin_action(action)? {
            ActionDisposition::AlreadyCompleted => Ok(self.state()),
            ActionDisposition::Ready => {
                self.record_outcome(action, outcome);
                Ok(self.state())
            }
        }
    }

    /// Records an auto-policy execution. Auto actions run at flow start,
    /// before any question is answered, so this path does not require the
    /// question gate. Duplicate recordings are no-ops.
    pub fn complete_auto_action(
        &mut self,
        action: &RemediationAction,
        outcome: &ActionOutcome,
    ) {
        if self
            .completed_actions
            .iter()
            .any(|c| &c.action == action)
        {
            return;
        }
        self.record_outcome(action, outcome);
    }

    /// Marks a pending action as intentionally skipped. Skips count toward
    /// completion.
    pub fn skip_action(&mut self, action: &RemediationAction) -> Result<FlowState, FlowError> {
        match self.begin_action(action)? {
            ActionDisposition::AlreadyCompleted => Ok(self.state()),
            ActionDisposition::Ready => {
                self.remaining_actions.retain(|a| a != action);
                self.completed_actions.push(CompletedAction {
                    action: action.clone(),
                    success: false,
                    message: "skipped by owner".to_string(),
                    completed_at: Utc::now(),
                });
                self.touch();
                Ok(self.state())
            }
        }
    }

    /// Absorbs a re-derived triage result for the same vault and
    /// classification. New recommended actions are appended; answered
    /// questions and completed actions are preserved.
    pub fn update_result(&mut self, result: TriageResult) {
        debug_assert_eq!(result.classification, self.result.classification);
        for action in &result.recommended_actions {
            let known = self.remaining_actions.contains(action)
                || self.completed_actions.iter().any(|c| &c.action == action);
            if !known {
                self.remaining_actions.push(action.clone());
            }
        }
        // Questions already answered stay answered; a longer question list
        // resumes at the current step.
        let questions = self.result.questions.clone();
        self.result = result;
        if self.result.questions != questions {
            self.current_step = self.current_step.min(self.result.questions.len());
        }
        self.touch();
    }

    fn record_outcome(&mut self, action: &RemediationAction, outcome: &ActionOutcome) {
        if outcome.success {
            self.remaining_actions.retain(|a| a != action);
            self.completed_actions.push(CompletedAction {
                action: action.clone(),
                success: true,
                message: outcome.message.clone(),
                completed_at: outcome.executed_at,
            });
        } else {
            self.failures.push(ActionFailure {
                action_id: action.action_id(),
                message: outcome.message.clone(),
                failed_at: outcome.executed_at,
            });
        }
        self.touch();
    }

    /// Appends answer-driven follow-up actions once the last question is
    /// answered.
    fn apply_follow_ups(&mut self) {
        let mut extra: Vec<RemediationAction> = Vec::new();
        match self.result.classification {
            // Unrecognized nominee locations escalate to a full revoke.
            Classification::CompromisedNominee => {
                if self.answer_is_no(0) {
                    extra.push(RemediationAction::RevokeAllNominees {
                        vault_id: self.result.vault_id,
                    });
                }
            }
            // Confirmed personal data gets redaction appended.
            Classification::SensitiveDocuments => {
                if self.answer_is_yes(0) && !self.result.affected_document_ids.is_empty() {
                    extra.push(RemediationAction::RedactDocuments {
                        vault_id: self.result.vault_id,
                        document_ids: self.result.affected_document_ids.clone(),
                    });
                }
            }
            // Unauthorized uploads escalate a leak to a full lock-down.
            Classification::DataLeak => {
                if self.answer_is_no(0) {
                    extra.push(RemediationAction::RevokeAllSessions);
                }
            }
            _ => {}
        }

        for action in extra {
            let known = self.remaining_actions.contains(&action)
                || self.completed_actions.iter().any(|c| c.action == action);
            if !known {
                debug!(flow = %self.id, action = action.name(), "follow-up action added");
                self.remaining_actions.push(action);
            }
        }
    }

    fn answer_is_no(&self, index: usize) -> bool {
        self.answers
            .get(index)
            .map(|(_, a)| {
                let a = a.trim().to_lowercase();
                a == "no" || a.starts_with("no,") || a.starts_with("no ") || a == "n"
            })
            .unwrap_or(false)
    }

    fn answer_is_yes(&self, index: usize) -> bool {
        self.answers
            .get(index)
            .map(|(_, a)| {
                let a = a.trim().to_lowercase();
                a == "yes" || a.starts_with("yes,") || a.starts_with("yes ") || a == "y"
            })
            .unwrap_or(false)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
