//! Search-criteria wizard. The roommates step only applies to colocation
//! searches.

use std::sync::Arc;

use serde_json::json;

use crate::config::ConfigError;
use crate::definition::WizardDefinition;
use crate::graph::StepGraph;

pub const NAME: &str = "search";

pub fn definition() -> Result<WizardDefinition, ConfigError> {
    WizardDefinition::from_value(json!({
        "name": NAME,
        "labels": {"advance": "Next", "submit": "Finish"},
        "steps": [
            {"key": "city", "title": "City", "requires": [
                {"path": "city", "label": "City", "check": "non_empty"}
            ]},
            {"key": "budget", "title": "Budget", "requires": [
                {"path": "max_rent", "label": "Maximum rent", "check": "positive_number"}
            ]},
            {"key": "lease_type", "title": "Lease type", "requires": [
                {"path": "lease_type", "label": "Lease type",
                 "check": {"one_of": ["EMPTY", "FURNISHED", "COLOCATION"]}}
            ]},
            {"key": "roommates", "title": "Roommates", "requires": [
                {"path": "roommates", "label": "Roommates", "check": "positive_number"}
            ]},
            {"key": "move_in", "title": "Move-in date", "requires": [
                {"path": "move_in", "label": "Move-in date"}
            ]},
            {"key": "summary", "title": "Summary"}
        ],
        "rules": [
            {"from": "lease_type", "direction": "forward",
             "when": {"when": "not_equals", "path": "lease_type", "value": "COLOCATION"},
             "to": "move_in"},
            {"from": "move_in", "direction": "backward",
             "when": {"when": "not_equals", "path": "lease_type", "value": "COLOCATION"},
             "to": "lease_type"}
        ]
    }))
}

pub fn graph() -> Result<Arc<StepGraph>, ConfigError> {
    Ok(Arc::new(definition()?.compile()?))
}
