use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::SubmissionError;

pub type RecordId = Uuid;

/// External persistence collaborator handed the field store snapshot once
/// the terminal step is passed.
pub trait SubmissionTrigger {
    fn submit(&mut self, snapshot: &Value) -> Result<RecordId, SubmissionError>;
}

impl<F> SubmissionTrigger for F
where
    F: FnMut(&Value) -> Result<RecordId, SubmissionError>,
{
    fn submit(&mut self, snapshot: &Value) -> Result<RecordId, SubmissionError> {
        self(snapshot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub record_id: RecordId,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_id,
            submitted_at: Utc::now(),
        }
    }
}

/// How a settled submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SubmissionReceipt),
    Failed(String),
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_))
    }
}
