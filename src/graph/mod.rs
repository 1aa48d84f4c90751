//! Step graph: ordered steps plus the branch rules that override the
//! default "adjacent step" on a next or previous request.

pub mod condition;

pub use condition::{Condition, SharedPredicate};

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ActionLabels;
use crate::errors::WizardError;
use crate::looping::LoopRegion;
use crate::store::FieldStore;
use crate::validation::StepGate;

/// Ordinal position of a step, `0..N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub usize);

impl StepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// Outcome of resolving a next/previous request against the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Step(StepId),
    /// Moving forward past the last step: ready to submit.
    Terminal,
    /// Moving backward before the first step.
    AtStart,
}

/// Conditional override of the default adjacent step.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRule {
    pub from: StepId,
    pub direction: Direction,
    pub condition: Condition,
    pub target: StepId,
}

impl BranchRule {
    pub fn forward(from: StepId, condition: Condition, target: StepId) -> Self {
        Self {
            from,
            direction: Direction::Forward,
            condition,
            target,
        }
    }

    pub fn backward(from: StepId, condition: Condition, target: StepId) -> Self {
        Self {
            from,
            direction: Direction::Backward,
            condition,
            target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub id: StepId,
    pub key: String,
    pub title: String,
    pub gate: StepGate,
}

/// Immutable, validated wizard configuration.
#[derive(Debug, Clone)]
pub struct StepGraph {
    name: String,
    steps: Vec<StepDescriptor>,
    rules: Vec<BranchRule>,
    regions: Vec<LoopRegion>,
    labels: ActionLabels,
}

impl StepGraph {
    pub fn builder(name: impl Into<String>) -> StepGraphBuilder {
        StepGraphBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn rules(&self) -> &[BranchRule] {
        &self.rules
    }

    pub fn regions(&self) -> &[LoopRegion] {
        &self.regions
    }

    pub fn labels(&self) -> &ActionLabels {
        &self.labels
    }

    pub fn step(&self, id: StepId) -> Option<&StepDescriptor> {
        self.steps.get(id.index())
    }

    pub fn find(&self, key: &str) -> Option<StepId> {
        self.steps
            .iter()
            .find(|step| step.key == key)
            .map(|step| step.id)
    }

    /// Key of `id`, or its ordinal when it is out of range.
    pub fn key(&self, id: StepId) -> String {
        self.step(id)
            .map(|step| step.key.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn first(&self) -> StepId {
        StepId(0)
    }

    pub fn last(&self) -> StepId {
        StepId(self.steps.len().saturating_sub(1))
    }

    /// The loop region containing `step`, with its position in [`Self::regions`].
    pub fn region_of(&self, step: StepId) -> Option<(usize, &LoopRegion)> {
        self.regions
            .iter()
            .enumerate()
            .find(|(_, region)| region.contains(step))
    }

    /// The neighbour of `step` in `direction`, ignoring branch rules.
    pub fn adjacent(&self, step: StepId, direction: Direction) -> Resolution {
        match direction {
            Direction::Forward if step.index() + 1 < self.steps.len() => {
                Resolution::Step(StepId(step.index() + 1))
            }
            Direction::Forward => Resolution::Terminal,
            Direction::Backward if step.index() > 0 => Resolution::Step(StepId(step.index() - 1)),
            Direction::Backward => Resolution::AtStart,
        }
    }

    /// Default adjacent step, overridden by the single matching branch rule.
    ///
    /// Two rules matching at once is reported as
    /// [`WizardError::ConfigurationAmbiguity`]; neither is picked.
    pub fn resolve(
        &self,
        step: StepId,
        direction: Direction,
        store: &dyn FieldStore,
    ) -> Result<Resolution, WizardError> {
        let mut matched: Option<&BranchRule> = None;
        for rule in self
            .rules
            .iter()
            .filter(|rule| rule.from == step && rule.direction == direction)
        {
            if !rule.condition.evaluate(store) {
                continue;
            }
            if let Some(previous) = matched {
                error!(
                    graph = %self.name,
                    step = %self.key(step),
                    %direction,
                    "two branch rules matched"
                );
                return Err(WizardError::ConfigurationAmbiguity {
                    step: self.key(step),
                    direction,
                    detail: format!(
                        "rules to `{}` and `{}` both match",
                        self.key(previous.target),
                        self.key(rule.target)
                    ),
                });
            }
            matched = Some(rule);
        }

        let resolution = match matched {
            Some(rule) => Resolution::Step(rule.target),
            None => self.adjacent(step, direction),
        };
        debug!(
            graph = %self.name,
            step = %self.key(step),
            %direction,
            branched = matched.is_some(),
            ?resolution,
            "resolved step"
        );
        Ok(resolution)
    }
}

/// Collects steps, rules and regions, then validates them in [`Self::build`].
#[derive(Debug)]
pub struct StepGraphBuilder {
    name: String,
    steps: Vec<StepDescriptor>,
    rules: Vec<BranchRule>,
    regions: Vec<LoopRegion>,
    labels: ActionLabels,
}

impl StepGraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            rules: Vec::new(),
            regions: Vec::new(),
            labels: ActionLabels::default(),
        }
    }

    /// Appends a step and returns its ordinal.
    pub fn step(&mut self, key: impl Into<String>, gate: StepGate) -> StepId {
        let key = key.into();
        self.titled_step(key.clone(), key, gate)
    }

    pub fn titled_step(
        &mut self,
        key: impl Into<String>,
        title: impl Into<String>,
        gate: StepGate,
    ) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(StepDescriptor {
            id,
            key: key.into(),
            title: title.into(),
            gate,
        });
        id
    }

    pub fn rule(&mut self, rule: BranchRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn region(&mut self, region: LoopRegion) -> &mut Self {
        self.regions.push(region);
        self
    }

    pub fn labels(&mut self, labels: ActionLabels) -> &mut Self {
        self.labels = labels;
        self
    }

    pub fn build(self) -> Result<StepGraph, WizardError> {
        if self.steps.is_empty() {
            return Err(WizardError::InvalidConfig(format!(
                "wizard `{}` has no steps",
                self.name
            )));
        }

        let mut keys = HashSet::new();
        for step in &self.steps {
            if !keys.insert(step.key.as_str()) {
                return Err(WizardError::InvalidConfig(format!(
                    "duplicate step key `{}`",
                    step.key
                )));
            }
        }

        let len = self.steps.len();
        let graph = StepGraph {
            name: self.name,
            steps: self.steps,
            rules: self.rules,
            regions: self.regions,
            labels: self.labels,
        };

        for rule in &graph.rules {
            if rule.from.index() >= len || rule.target.index() >= len {
                return Err(WizardError::InvalidConfig(format!(
                    "rule {} -> {} points outside the {len} declared steps",
                    rule.from, rule.target
                )));
            }
            if rule.from == rule.target {
                return Err(WizardError::InvalidConfig(format!(
                    "rule on `{}` targets itself",
                    graph.key(rule.from)
                )));
            }
        }

        check_regions(&graph)?;
        check_exclusive_rules(&graph)?;
        Ok(graph)
    }
}

fn check_regions(graph: &StepGraph) -> Result<(), WizardError> {
    let len = graph.len();
    for (idx, region) in graph.regions.iter().enumerate() {
        if region.start > region.end || region.end.index() >= len {
            return Err(WizardError::InvalidConfig(format!(
                "loop `{}` spans {}..{} outside the {len} declared steps",
                region.name, region.start, region.end
            )));
        }
        if region.collection.is_empty() {
            return Err(WizardError::InvalidConfig(format!(
                "loop `{}` has no collection path",
                region.name
            )));
        }
        for other in &graph.regions[idx + 1..] {
            if region.start <= other.end && other.start <= region.end {
                return Err(WizardError::InvalidConfig(format!(
                    "loops `{}` and `{}` overlap",
                    region.name, other.name
                )));
            }
        }
    }
    Ok(())
}

/// Rejects rule pairs on the same (step, direction) that could both match.
///
/// Pairs whose conditions are fully declarative must be provably disjoint.
/// Pairs involving a [`Condition::Custom`] cannot be analysed here and are
/// caught when they match together at runtime.
fn check_exclusive_rules(graph: &StepGraph) -> Result<(), WizardError> {
    for (idx, rule) in graph.rules.iter().enumerate() {
        for other in &graph.rules[idx + 1..] {
            if rule.from != other.from || rule.direction != other.direction {
                continue;
            }
            if rule.condition.is_opaque() || other.condition.is_opaque() {
                continue;
            }
            if !rule.condition.is_disjoint(&other.condition) {
                return Err(WizardError::ConfigurationAmbiguity {
                    step: graph.key(rule.from),
                    direction: rule.direction,
                    detail: format!(
                        "{:?} and {:?} are not mutually exclusive",
                        rule.condition, other.condition
                    ),
                });
            }
        }
    }
    Ok(())
}
