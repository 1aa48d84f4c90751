//! Validation gate evaluated on the current step before moving forward.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{StoreError, WizardError};
use crate::graph::{StepGraph, StepId};
use crate::store::{is_filled, FieldPath, FieldStore, JsonFieldStore};

type CheckCallback = dyn Fn(&Value) -> Result<(), String> + Send + Sync;
pub type SharedCheck = Arc<CheckCallback>;

/// Built-in field checks.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    #[default]
    Required,
    NonEmpty,
    PositiveNumber,
    OneOf(Vec<Value>),
    MinItems(usize),
    #[serde(skip)]
    Custom(SharedCheck),
}

impl Check {
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Check::Custom(Arc::new(check))
    }

    /// `Ok(Some(value))` asks for the stored answer to be replaced by its
    /// canonical spelling.
    fn validate(&self, label: &str, value: Option<&Value>) -> Result<Option<Value>, String> {
        let Some(value) = value.filter(|value| is_filled(value)) else {
            return match self {
                Check::MinItems(min) => Err(format!("{label} needs at least {min} item(s)")),
                _ => Err(format!("{label} is required")),
            };
        };

        match self {
            Check::Required => Ok(None),
            Check::NonEmpty => match value {
                Value::String(text) if !text.trim().is_empty() => Ok(None),
                _ => Err(format!("{label} cannot be empty")),
            },
            Check::PositiveNumber => {
                let number = match value {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => text.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match number {
                    Some(number) if number > 0.0 => Ok(None),
                    Some(_) => Err(format!("{label} must be greater than zero")),
                    None => Err(format!("{label} must be a number")),
                }
            }
            Check::OneOf(options) => {
                let matched = options.iter().find(|option| match (option, value) {
                    (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b.trim()),
                    (a, b) => *a == b,
                });
                match matched {
                    Some(option) if option == value => Ok(None),
                    Some(option) => Ok(Some(option.clone())),
                    None => {
                        let listed: Vec<String> =
                            options.iter().map(crate::store::display_value).collect();
                        Err(format!("{label} must be one of: {}", listed.join(", ")))
                    }
                }
            }
            Check::MinItems(min) => match value {
                Value::Array(items) if items.len() >= *min => Ok(None),
                _ => Err(format!("{label} needs at least {min} item(s)")),
            },
            Check::Custom(check) => check(value)
                .map(|()| None)
                .map_err(|reason| format!("{label}: {reason}")),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Required => f.write_str("Required"),
            Check::NonEmpty => f.write_str("NonEmpty"),
            Check::PositiveNumber => f.write_str("PositiveNumber"),
            Check::OneOf(options) => f.debug_tuple("OneOf").field(options).finish(),
            Check::MinItems(min) => f.debug_tuple("MinItems").field(min).finish(),
            Check::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One field a step needs before the user may leave it forward.
///
/// Inside a loop region, `path` is relative to the current item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub path: FieldPath,
    pub label: String,
    #[serde(default)]
    pub check: Check,
}

impl Requirement {
    pub fn new(path: FieldPath, label: impl Into<String>, check: Check) -> Self {
        Self {
            path,
            label: label.into(),
            check,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepGate {
    pub requirements: Vec<Requirement>,
}

impl StepGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, path: FieldPath, label: impl Into<String>, check: Check) -> Self {
        self.requirements.push(Requirement::new(path, label, check));
        self
    }

    /// First failing requirement, with paths resolved under `base`.
    ///
    /// On success, returns the canonical rewrites of the checked answers
    /// with paths relative to `base`.
    pub fn evaluate(
        &self,
        store: &dyn FieldStore,
        base: Option<&FieldPath>,
    ) -> Result<Vec<FieldWrite>, (String, String)> {
        let mut writes = Vec::new();
        for requirement in &self.requirements {
            let path = match base {
                Some(base) => base.join(&requirement.path),
                None => requirement.path.clone(),
            };
            let canonical = requirement
                .check
                .validate(&requirement.label, store.get(&path))
                .map_err(|message| (path.to_string(), message))?;
            if let Some(value) = canonical {
                writes.push(FieldWrite::new(requirement.path.clone(), value));
            }
        }
        Ok(writes)
    }
}

/// A value the gate wants stored once the user moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub path: FieldPath,
    pub value: Value,
}

impl FieldWrite {
    pub fn new(path: FieldPath, value: Value) -> Self {
        Self { path, value }
    }

    fn under(self, base: &FieldPath) -> Self {
        Self {
            path: base.join(&self.path),
            value: self.value,
        }
    }
}

/// Writes every entry of `writes` in order.
pub fn apply(store: &mut dyn FieldStore, writes: &[FieldWrite]) -> Result<(), StoreError> {
    for write in writes {
        store.set(&write.path, write.value.clone())?;
    }
    Ok(())
}

/// Why the gate refused to let the user move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub step: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Carries the writes to [`apply`] before leaving the step.
    Pass(Vec<FieldWrite>),
    Fail(ValidationError),
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationResult::Pass(_))
    }
}

/// Runs the gate of `step` without touching the store.
///
/// Steps inside a loop region are checked against item `loop_index`. A pass
/// lists the canonical spellings of the checked answers and, when `step` is
/// the region's last step, the region's derived fields for that item. The
/// caller decides when to [`apply`] them.
pub fn check(
    graph: &StepGraph,
    step: StepId,
    store: &dyn FieldStore,
    loop_index: usize,
) -> Result<ValidationResult, WizardError> {
    let descriptor = graph
        .step(step)
        .ok_or_else(|| WizardError::UnknownStep(step.to_string()))?;

    let Some((_, region)) = graph.region_of(step) else {
        return Ok(match descriptor.gate.evaluate(store, None) {
            Ok(writes) => ValidationResult::Pass(writes),
            Err((field, message)) => fail(&descriptor.key, field, message),
        });
    };

    let count = region.item_count(store);
    if count == 0 {
        return Ok(fail(
            &descriptor.key,
            region.collection.to_string(),
            format!("`{}` has no items", region.name),
        ));
    }
    let index = region.clamp(loop_index, count);
    let item_path = region.item_path(index);

    let mut writes = match descriptor.gate.evaluate(store, Some(&item_path)) {
        Ok(writes) => writes,
        Err((field, message)) => return Ok(fail(&descriptor.key, field, message)),
    };

    if step == region.end && !region.derived.is_empty() {
        let item = canonical_item(store.get(&item_path), &writes)?;
        for derived in &region.derived {
            let value = derived.render(&item, index + 1);
            debug!(region = %region.name, index, field = %derived.field, %value, "derived field");
            writes.push(FieldWrite::new(derived.field.clone(), Value::String(value)));
        }
    }

    Ok(ValidationResult::Pass(
        writes.into_iter().map(|write| write.under(&item_path)).collect(),
    ))
}

/// The loop item as it will read once `writes` (relative to it) land.
fn canonical_item(item: Option<&Value>, writes: &[FieldWrite]) -> Result<Value, WizardError> {
    let item = item.cloned().unwrap_or(Value::Null);
    if writes.is_empty() {
        return Ok(item);
    }
    let mut scratch = JsonFieldStore::from_value(item)?;
    apply(&mut scratch, writes)?;
    Ok(scratch.into_value())
}

fn fail(step: &str, field: String, message: String) -> ValidationResult {
    debug!(step, %field, %message, "validation failed");
    ValidationResult::Fail(ValidationError {
        step: step.to_string(),
        field,
        message,
    })
}
