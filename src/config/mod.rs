//! Engine configuration: action labels, log filter and where wizard
//! definitions live on disk.

pub mod error;
pub mod manager;

pub use error::ConfigError;
pub use manager::ConfigManager;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Captions for the primary action button.
///
/// `advance` is shown on every step except the terminal one, which shows
/// `submit` ("Publish" for listings, "Finish" for searches).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLabels {
    #[serde(default = "ActionLabels::default_advance")]
    pub advance: String,
    #[serde(default = "ActionLabels::default_submit")]
    pub submit: String,
}

impl ActionLabels {
    pub fn new(advance: impl Into<String>, submit: impl Into<String>) -> Self {
        Self {
            advance: advance.into(),
            submit: submit.into(),
        }
    }

    pub fn default_advance() -> String {
        "Next".into()
    }

    pub fn default_submit() -> String {
        "Publish".into()
    }
}

impl Default for ActionLabels {
    fn default() -> Self {
        Self {
            advance: Self::default_advance(),
            submit: Self::default_submit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_log_filter")]
    pub log_filter: String,
    /// Fallback labels for definitions that do not set their own.
    #[serde(default)]
    pub labels: ActionLabels,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional directory holding `<name>.json` wizard definitions.
    pub definitions_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn default_log_filter() -> String {
        "wizard_core=info".into()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: Self::default_log_filter(),
            labels: ActionLabels::default(),
            definitions_dir: None,
        }
    }
}
