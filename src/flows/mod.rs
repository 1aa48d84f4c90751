//! The two concrete wizards: publishing a listing and entering search
//! criteria.

pub mod listing;
pub mod search;

use std::sync::Arc;

use crate::config::ConfigError;
use crate::errors::WizardError;
use crate::graph::StepGraph;

pub const FLOW_NAMES: [&str; 2] = [listing::NAME, search::NAME];

/// Compiles a built-in flow by name.
pub fn by_name(name: &str) -> Result<Arc<StepGraph>, ConfigError> {
    match name {
        listing::NAME => listing::graph(),
        search::NAME => search::graph(),
        other => Err(WizardError::InvalidConfig(format!(
            "unknown flow `{}` (expected one of: {})",
            other,
            FLOW_NAMES.join(", ")
        ))
        .into()),
    }
}
