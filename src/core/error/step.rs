use crate::core::collaborator::CollaboratorError;
use crate::core::steps::Branch;

/// Failures raised while turning an input step list into a reconciled sequence.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Steps cannot be empty.")]
    EmptyInput,
    #[error("Step at index {index} is missing required key: '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("Step at index {index} is not a JSON object")]
    NotAnObject { index: usize },
    #[error("Step at index {index} is invalid: {reason}")]
    InvalidField { index: usize, reason: String },
    #[error("Collaborator call failed: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("Collaborator reply could not be parsed: {reason}")]
    CollaboratorFormat { reason: String, raw: String },
    #[error("Classifier reported more than one decision for order {order}")]
    DuplicateDecision { order: i64 },
    #[error("Decision at order {order} has invalid branches: {reason}")]
    InvalidBranch { order: i64, reason: String },
    #[error("Decision at order {order} does not match any input step")]
    UnknownDecisionOrder { order: i64 },
    #[error("Decision at order {decision_order} has {branch} = {target}, which matches no input step")]
    UnresolvedTarget {
        decision_order: i64,
        branch: Branch,
        target: i64,
    },
}

impl StepError {
    pub fn format<R: Into<String>, T: Into<String>>(reason: R, raw: T) -> Self {
        StepError::CollaboratorFormat {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Stable machine-readable code surfaced at the service boundary.
    pub fn code(&self) -> &'static str {
        match self {
            StepError::EmptyInput => "STEP-EMPTY-001",
            StepError::MissingField { .. } => "STEP-FIELD-001",
            StepError::NotAnObject { .. } => "STEP-FIELD-002",
            StepError::InvalidField { .. } => "STEP-FIELD-003",
            StepError::Collaborator(_) => "COLLAB-CALL-001",
            StepError::CollaboratorFormat { .. } => "COLLAB-FORMAT-001",
            StepError::DuplicateDecision { .. } => "DECISION-DUP-001",
            StepError::InvalidBranch { .. } => "DECISION-BRANCH-001",
            StepError::UnknownDecisionOrder { .. } => "DECISION-ORDER-001",
            StepError::UnresolvedTarget { .. } => "DECISION-REF-001",
        }
    }
}
