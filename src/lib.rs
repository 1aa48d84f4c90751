#![doc(test(attr(deny(warnings))))]

//! Wizard Core drives multi-step form wizards: an ordered step graph with
//! conditional branch rules, loop regions replayed once per collection
//! item, per-step validation gates and a guarded submission lifecycle.
//!
//! The engine never owns form values; it reads and writes them through a
//! [`store::FieldStore`].

pub mod cli;
pub mod config;
pub mod definition;
pub mod errors;
pub mod flows;
pub mod graph;
pub mod looping;
pub mod store;
pub mod utils;
pub mod validation;
pub mod wizard;

pub use errors::{StoreError, SubmissionError, WizardError};
pub use graph::{BranchRule, Condition, Direction, StepGraph, StepId};
pub use store::{FieldPath, FieldStore, JsonFieldStore};
pub use wizard::{Transition, Wizard, WizardPhase};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    init_with(utils::DEFAULT_LOG_DIRECTIVE);
}

/// Like [`init`], with a custom filter directive such as `wizard_core=debug`.
pub fn init_with(directive: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing_with(directive);
        tracing::info!("Wizard Core tracing initialized.");
    });
}
