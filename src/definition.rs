//! Declarative wizard tables.
//!
//! A [`WizardDefinition`] is the serialisable form of a step graph: steps
//! are referenced by key, rules carry declarative [`Condition`]s and loop
//! regions name the collection they repeat over. [`WizardDefinition::compile`]
//! resolves the keys and hands the result to [`StepGraphBuilder`] for
//! validation.

use serde::{Deserialize, Serialize};

use crate::config::{ActionLabels, ConfigError};
use crate::errors::WizardError;
use crate::graph::{BranchRule, Condition, Direction, StepGraph, StepGraphBuilder, StepId};
use crate::looping::{DerivedField, LoopRegion};
use crate::store::FieldPath;
use crate::validation::{Requirement, StepGate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<ActionLabels>,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub loops: Vec<LoopDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub requires: Vec<Requirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub from: String,
    pub direction: Direction,
    #[serde(default)]
    pub when: Condition,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopDefinition {
    pub name: String,
    pub from: String,
    pub to: String,
    pub collection: FieldPath,
    #[serde(default)]
    pub derive: Vec<DerivedField>,
}

impl WizardDefinition {
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(data).map_err(|err| ConfigError::Serde(err.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|err| ConfigError::Serde(err.to_string()))
    }

    pub fn compile(&self) -> Result<StepGraph, WizardError> {
        let mut builder = StepGraphBuilder::new(self.name.clone());
        for step in &self.steps {
            let gate = StepGate {
                requirements: step.requires.clone(),
            };
            let title = step.title.clone().unwrap_or_else(|| step.key.clone());
            builder.titled_step(step.key.clone(), title, gate);
        }

        for rule in &self.rules {
            builder.rule(BranchRule {
                from: self.lookup(&rule.from)?,
                direction: rule.direction,
                condition: rule.when.clone(),
                target: self.lookup(&rule.to)?,
            });
        }

        for region in &self.loops {
            let mut compiled = LoopRegion::new(
                region.name.clone(),
                self.lookup(&region.from)?,
                self.lookup(&region.to)?,
                region.collection.clone(),
            );
            compiled.derived = region.derive.clone();
            builder.region(compiled);
        }

        if let Some(labels) = &self.labels {
            builder.labels(labels.clone());
        }
        builder.build()
    }

    fn lookup(&self, key: &str) -> Result<StepId, WizardError> {
        self.steps
            .iter()
            .position(|step| step.key == key)
            .map(StepId)
            .ok_or_else(|| WizardError::UnknownStep(format!("`{}` in wizard `{}`", key, self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> WizardDefinition {
        WizardDefinition::from_value(json!({
            "name": "rooms",
            "labels": {"submit": "Finish"},
            "steps": [
                {"key": "intro", "title": "Welcome"},
                {"key": "surface", "requires": [{"path": "surface", "label": "Surface", "check": "positive_number"}]},
                {"key": "done"}
            ],
            "rules": [
                {"from": "intro", "direction": "forward",
                 "when": {"when": "absent", "path": "rooms"}, "to": "done"}
            ],
            "loops": [
                {"name": "rooms", "from": "surface", "to": "surface", "collection": "rooms",
                 "derive": [{"field": "name", "template": "Room {n}"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn compiles_keys_into_ordinals() {
        let graph = definition().compile().unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.steps()[0].title, "Welcome");
        assert_eq!(graph.steps()[2].title, "done");
        assert_eq!(graph.rules()[0].target, StepId(2));
        assert_eq!(graph.regions()[0].start, StepId(1));
        assert_eq!(graph.regions()[0].derived.len(), 1);
        assert_eq!(graph.labels().submit, "Finish");
        assert_eq!(graph.labels().advance, "Next");
    }

    #[test]
    fn unknown_rule_target_is_reported() {
        let mut definition = definition();
        definition.rules[0].to = "missing".into();
        let err = definition.compile().unwrap_err();
        assert!(matches!(err, WizardError::UnknownStep(message) if message.contains("missing")));
    }

    #[test]
    fn rule_without_condition_defaults_to_always() {
        let rule: RuleDefinition =
            serde_json::from_value(json!({"from": "a", "direction": "backward", "to": "b"}))
                .unwrap();
        assert_eq!(rule.when, Condition::Always);
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        assert!(matches!(
            WizardDefinition::from_json("{\"name\": 3}"),
            Err(ConfigError::Serde(_))
        ));
    }
}
