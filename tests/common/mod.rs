#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use wizard_core::graph::{StepGraph, StepId};
use wizard_core::looping::LoopRegion;
use wizard_core::store::{FieldPath, JsonFieldStore};
use wizard_core::validation::{Check, StepGate};
use wizard_core::wizard::{Transition, Wizard};

pub fn path(raw: &str) -> FieldPath {
    FieldPath::parse(raw).expect("valid field path")
}

pub fn store(value: Value) -> JsonFieldStore {
    JsonFieldStore::from_value(value).expect("object store")
}

/// `count` steps named `s0..`, no rules, no gates.
pub fn linear_graph(count: usize) -> Arc<StepGraph> {
    let mut builder = StepGraph::builder("linear");
    for idx in 0..count {
        builder.step(format!("s{idx}"), StepGate::default());
    }
    Arc::new(builder.build().expect("linear graph"))
}

/// intro, [r1, r2, r3] repeated per `items` entry, outro.
///
/// Every region step requires the item's `name`.
pub fn looped_graph() -> Arc<StepGraph> {
    let mut builder = StepGraph::builder("looped");
    builder.step("intro", StepGate::default());
    let named = || StepGate::new().require(path("name"), "Name", Check::Required);
    let first = builder.step("r1", named());
    builder.step("r2", named());
    let last = builder.step("r3", named());
    builder.step("outro", StepGate::default());
    builder.region(LoopRegion::new("items", first, last, path("items")));
    Arc::new(builder.build().expect("looped graph"))
}

pub fn named_items(count: usize) -> Value {
    let items: Vec<Value> = (0..count).map(|idx| json!({"name": format!("item {idx}")})).collect();
    json!({ "items": items })
}

pub fn moved_to(transition: &Transition) -> Option<StepId> {
    match transition {
        Transition::Moved { to, .. } => Some(*to),
        _ => None,
    }
}

/// Visited steps as `key` or `key[index]`, one per line.
pub fn trace<S: wizard_core::store::FieldStore>(wizard: &Wizard<S>) -> String {
    wizard
        .history()
        .iter()
        .map(|visit| {
            let key = wizard.graph().key(visit.step);
            match visit.loop_index {
                Some(index) => format!("{key}[{index}]"),
                None => key,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
