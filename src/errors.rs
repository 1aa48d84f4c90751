use thiserror::Error;

use crate::graph::Direction;
use crate::store::FieldPathError;

/// Errors raised by the wizard engine itself.
///
/// Validation failures are not represented here; they are ordinary
/// [`Transition::Blocked`](crate::wizard::Transition::Blocked) values.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Ambiguous branch rules from step `{step}` ({direction}): {detail}")]
    ConfigurationAmbiguity {
        step: String,
        direction: Direction,
        detail: String,
    },
    #[error("Invalid wizard configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown step: {0}")]
    UnknownStep(String),
    #[error("A submission is already in flight")]
    SubmissionInFlight,
    #[error("No submission is pending")]
    NoSubmissionPending,
    #[error("Wizard is closed")]
    Closed,
    #[error("Loop `{0}` has no items to edit")]
    EmptyLoop(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reading or writing the field store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] FieldPathError),
    #[error("Field `{path}` is not {expected}")]
    TypeMismatch { path: String, expected: &'static str },
    #[error("Index {index} is out of range for `{path}` (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Failures reported by the external persistence collaborator.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Submission rejected: {0}")]
    Rejected(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
