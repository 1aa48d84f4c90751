use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::SubmissionError;
use crate::wizard::{RecordId, SubmissionTrigger};

/// Writes each submitted snapshot to `<dir>/<record id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSubmission {
    dir: PathBuf,
    flow: String,
    last_written: Option<PathBuf>,
}

#[derive(Serialize)]
struct SubmittedRecord<'a> {
    record_id: RecordId,
    flow: &'a str,
    submitted_at: String,
    fields: &'a Value,
}

impl JsonFileSubmission {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            flow: String::new(),
            last_written: None,
        }
    }

    pub fn set_flow(&mut self, flow: impl Into<String>) {
        self.flow = flow.into();
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

impl SubmissionTrigger for JsonFileSubmission {
    fn submit(&mut self, snapshot: &Value) -> Result<RecordId, SubmissionError> {
        fs::create_dir_all(&self.dir)?;
        let record_id = Uuid::new_v4();
        let record = SubmittedRecord {
            record_id,
            flow: &self.flow,
            submitted_at: Utc::now().to_rfc3339(),
            fields: snapshot,
        };
        let json = serde_json::to_string_pretty(&record)?;

        let path = self.dir.join(format!("{record_id}.json"));
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), "submission written");
        self.last_written = Some(path);
        Ok(record_id)
    }
}
