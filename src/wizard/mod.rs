//! Wizard controller: owns the current step and loop indices, runs the
//! validation gate before moving forward and drives the submission
//! lifecycle once the terminal step is passed.

pub mod submission;

pub use submission::{RecordId, SubmissionReceipt, SubmissionTrigger, SubmitOutcome};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{SubmissionError, WizardError};
use crate::graph::{Direction, Resolution, StepGraph, StepId};
use crate::looping::{LoopBackward, LoopForward};
use crate::store::{FieldStore, JsonFieldStore};
use crate::validation::{self, ValidationError, ValidationResult};

/// Mutable navigation state: the current step plus one item index per loop
/// region of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    pub current: StepId,
    pub loop_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardPhase {
    Editing,
    /// Terminal step passed; the snapshot is taken. `in_flight` is set once
    /// it has been handed to the persistence collaborator.
    SubmitPending { in_flight: bool },
    /// Persistence failed; the user is still on the terminal step.
    SubmitFailed { reason: String },
    Submitted(SubmissionReceipt),
    Cancelled,
}

impl WizardPhase {
    pub fn is_closed(&self) -> bool {
        matches!(self, WizardPhase::Submitted(_) | WizardPhase::Cancelled)
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: StepId,
        to: StepId,
        loop_index: Option<usize>,
    },
    /// The current step's gate failed; nothing changed.
    Blocked(ValidationError),
    /// Moved into submit-pending; call [`Wizard::take_submission`] or
    /// [`Wizard::submit_with`].
    ReadyToSubmit,
    /// A submission is pending; nothing changed.
    Busy,
    /// Backward request on the first step.
    Stayed,
}

/// 1-based position of the current step among the graph's distinct steps.
///
/// Loop repeats do not count twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
}

/// Where a navigation request lands, worked out before anything changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    Settle {
        to: StepId,
        /// Region slot and item index to select on arrival.
        item: Option<(usize, usize)>,
    },
    Submit,
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub step: StepId,
    pub loop_index: Option<usize>,
}

/// How the flow opens, e.g. resuming an edit on a later step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WizardContext {
    pub start: Option<StepId>,
    pub item: usize,
}

impl WizardContext {
    pub fn starting_at(step: StepId) -> Self {
        Self {
            start: Some(step),
            item: 0,
        }
    }

    pub fn with_item(mut self, item: usize) -> Self {
        self.item = item;
        self
    }
}

pub struct Wizard<S: FieldStore> {
    graph: Arc<StepGraph>,
    store: S,
    state: WizardState,
    phase: WizardPhase,
    pending: Option<Value>,
    history: Vec<Visit>,
}

impl<S: FieldStore> Wizard<S> {
    pub fn new(graph: Arc<StepGraph>, store: S) -> Self {
        let state = WizardState {
            current: graph.first(),
            loop_indices: vec![0; graph.regions().len()],
        };
        let mut wizard = Self {
            graph,
            store,
            state,
            phase: WizardPhase::Editing,
            pending: None,
            history: Vec::new(),
        };
        wizard.record_visit();
        wizard
    }

    pub fn with_context(
        graph: Arc<StepGraph>,
        store: S,
        context: WizardContext,
    ) -> Result<Self, WizardError> {
        let mut wizard = Self::new(graph, store);
        if let Some(start) = context.start {
            let graph = Arc::clone(&wizard.graph);
            if graph.step(start).is_none() {
                return Err(WizardError::UnknownStep(start.to_string()));
            }
            if let Some((slot, region)) = graph.region_of(start) {
                let count = region.item_count(&wizard.store);
                if count == 0 {
                    return Err(WizardError::EmptyLoop(region.name.clone()));
                }
                wizard.state.loop_indices[slot] = region.clamp(context.item, count);
            }
            wizard.state.current = start;
            wizard.history.clear();
            wizard.record_visit();
        }
        Ok(wizard)
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.phase
    }

    pub fn current_step(&self) -> StepId {
        self.state.current
    }

    pub fn current_key(&self) -> &str {
        self.graph
            .step(self.state.current)
            .map(|step| step.key.as_str())
            .unwrap_or_default()
    }

    /// Item index for the current step, clamped to the live collection.
    /// `None` outside loop regions.
    pub fn loop_index(&self) -> Option<usize> {
        let (slot, region) = self.graph.region_of(self.state.current)?;
        let count = region.item_count(&self.store);
        Some(region.clamp(self.state.loop_indices[slot], count))
    }

    pub fn progress(&self) -> Progress {
        Progress {
            position: self.state.current.index() + 1,
            total: self.graph.len(),
        }
    }

    /// Whether passing the current step with the answers stored right now
    /// ends the flow.
    pub fn is_terminal_step(&self) -> bool {
        let current = self.state.current;
        if let Some((_, region)) = self.graph.region_of(current) {
            let index = self.loop_index().unwrap_or_default();
            if region.end == current
                && matches!(
                    region.on_forward_from_tail(&self.store, index),
                    LoopForward::AdvanceIndex { .. }
                )
            {
                return false;
            }
        }
        matches!(
            self.route(current, Direction::Forward, &self.store),
            Ok(Arrival::Submit)
        )
    }

    pub fn can_submit(&self) -> bool {
        matches!(
            self.phase,
            WizardPhase::Editing | WizardPhase::SubmitFailed { .. }
        ) && self.is_terminal_step()
    }

    pub fn action_label(&self) -> &str {
        let labels = self.graph.labels();
        if self.is_terminal_step() {
            &labels.submit
        } else {
            &labels.advance
        }
    }

    /// Visited `(step, loop index)` trail, oldest first.
    pub fn history(&self) -> &[Visit] {
        &self.history
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Snapshot taken when submit-pending was entered.
    pub fn pending_snapshot(&self) -> Option<&Value> {
        self.pending.as_ref()
    }

    /// Validates the current step, then moves forward.
    ///
    /// From the last item of a loop region's tail the flow leaves the
    /// region; from any earlier item it replays the region for the next
    /// item. Passing the terminal step enters submit-pending. From
    /// [`WizardPhase::SubmitFailed`] this retries the submission.
    ///
    /// Branch rules see the gate's canonical answers and derived fields, but
    /// those are stored only once the destination is settled: an error
    /// leaves the store untouched.
    pub fn next(&mut self) -> Result<Transition, WizardError> {
        if let Some(blocked) = self.guard_navigation()? {
            return Ok(blocked);
        }

        let graph = Arc::clone(&self.graph);
        let current = self.state.current;
        let region = graph.region_of(current);
        let index = match region {
            Some((slot, region)) => {
                region.clamp(self.state.loop_indices[slot], region.item_count(&self.store))
            }
            None => 0,
        };

        let writes = match validation::check(&graph, current, &self.store, index)? {
            ValidationResult::Fail(err) => return Ok(Transition::Blocked(err)),
            ValidationResult::Pass(writes) => writes,
        };

        let preview;
        let view: &dyn FieldStore = if writes.is_empty() {
            &self.store
        } else {
            let mut scratch = JsonFieldStore::from_value(self.store.snapshot())?;
            validation::apply(&mut scratch, &writes)?;
            preview = scratch;
            &preview
        };
        let arrival = match region {
            Some((slot, region)) if region.end == current => {
                match region.on_forward_from_tail(view, index) {
                    LoopForward::AdvanceIndex { index } => Arrival::Settle {
                        to: region.start,
                        item: Some((slot, index)),
                    },
                    LoopForward::ExitRegion => self.route(current, Direction::Forward, view)?,
                }
            }
            _ => self.route(current, Direction::Forward, view)?,
        };

        validation::apply(&mut self.store, &writes)?;
        if let Some((slot, _)) = region {
            self.state.loop_indices[slot] = index;
        }
        Ok(self.commit(current, arrival))
    }

    /// Moves backward without validation.
    pub fn previous(&mut self) -> Result<Transition, WizardError> {
        if let Some(blocked) = self.guard_navigation()? {
            return Ok(blocked);
        }

        let graph = Arc::clone(&self.graph);
        let current = self.state.current;
        let arrival = match graph.region_of(current) {
            Some((slot, region)) => {
                let index =
                    region.clamp(self.state.loop_indices[slot], region.item_count(&self.store));
                self.state.loop_indices[slot] = index;
                if region.start != current {
                    self.route(current, Direction::Backward, &self.store)?
                } else {
                    match region.on_backward_from_head(&self.store, index) {
                        LoopBackward::RetreatIndex { index } => Arrival::Settle {
                            to: region.end,
                            item: Some((slot, index)),
                        },
                        LoopBackward::ExitRegionBackward => {
                            self.route(current, Direction::Backward, &self.store)?
                        }
                    }
                }
            }
            None => self.route(current, Direction::Backward, &self.store)?,
        };
        Ok(self.commit(current, arrival))
    }

    /// Unconditional move used by "edit this answer" affordances.
    ///
    /// Branch rules and validation are bypassed. For a step inside a loop
    /// region, `item` selects the item to edit (clamped to the live
    /// collection); `None` keeps the region's current index.
    pub fn jump_to(&mut self, step: StepId, item: Option<usize>) -> Result<Transition, WizardError> {
        if let Some(blocked) = self.guard_navigation()? {
            return Ok(blocked);
        }

        let graph = Arc::clone(&self.graph);
        if graph.step(step).is_none() {
            return Err(WizardError::UnknownStep(step.to_string()));
        }
        if let Some((slot, region)) = graph.region_of(step) {
            let count = region.item_count(&self.store);
            if count == 0 {
                return Err(WizardError::EmptyLoop(region.name.clone()));
            }
            let wanted = item.unwrap_or(self.state.loop_indices[slot]);
            self.state.loop_indices[slot] = region.clamp(wanted, count);
        }
        let from = self.state.current;
        Ok(self.settle(from, step))
    }

    pub fn jump_to_key(&mut self, key: &str, item: Option<usize>) -> Result<Transition, WizardError> {
        let step = self
            .graph
            .find(key)
            .ok_or_else(|| WizardError::UnknownStep(key.to_string()))?;
        self.jump_to(step, item)
    }

    /// Back to the first step with every loop index reset.
    pub fn restart(&mut self) -> Result<Transition, WizardError> {
        match self.phase {
            WizardPhase::SubmitPending { .. } => return Ok(Transition::Busy),
            WizardPhase::Submitted(_) | WizardPhase::Cancelled => return Err(WizardError::Closed),
            _ => {}
        }
        let from = self.state.current;
        self.state.loop_indices.iter_mut().for_each(|index| *index = 0);
        self.history.clear();
        info!(graph = %self.graph.name(), "wizard restarted");
        Ok(self.settle(from, self.graph.first()))
    }

    /// Closes the flow without persisting anything.
    pub fn cancel(&mut self) -> Result<(), WizardError> {
        match self.phase {
            WizardPhase::SubmitPending { .. } => Err(WizardError::SubmissionInFlight),
            WizardPhase::Submitted(_) | WizardPhase::Cancelled => Err(WizardError::Closed),
            _ => {
                info!(graph = %self.graph.name(), step = %self.current_key(), "wizard cancelled");
                self.phase = WizardPhase::Cancelled;
                self.pending = None;
                Ok(())
            }
        }
    }

    /// Hands out the pending snapshot exactly once.
    pub fn take_submission(&mut self) -> Result<Value, WizardError> {
        match self.phase {
            WizardPhase::SubmitPending { in_flight: false } => {
                let snapshot = self.pending.clone().ok_or(WizardError::NoSubmissionPending)?;
                self.phase = WizardPhase::SubmitPending { in_flight: true };
                info!(graph = %self.graph.name(), "submission started");
                Ok(snapshot)
            }
            WizardPhase::SubmitPending { in_flight: true } => Err(WizardError::SubmissionInFlight),
            _ => Err(WizardError::NoSubmissionPending),
        }
    }

    /// Settles the in-flight submission with the collaborator's answer.
    pub fn finish_submission(
        &mut self,
        result: Result<RecordId, SubmissionError>,
    ) -> Result<SubmitOutcome, WizardError> {
        if self.phase != (WizardPhase::SubmitPending { in_flight: true }) {
            return Err(WizardError::NoSubmissionPending);
        }
        self.pending = None;
        match result {
            Ok(record_id) => {
                let receipt = SubmissionReceipt::new(record_id);
                info!(graph = %self.graph.name(), %record_id, "submission succeeded");
                self.phase = WizardPhase::Submitted(receipt.clone());
                Ok(SubmitOutcome::Submitted(receipt))
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(graph = %self.graph.name(), %reason, "submission failed");
                self.phase = WizardPhase::SubmitFailed {
                    reason: reason.clone(),
                };
                Ok(SubmitOutcome::Failed(reason))
            }
        }
    }

    /// Takes the snapshot, runs `trigger` and settles the result.
    pub fn submit_with<T>(&mut self, trigger: &mut T) -> Result<SubmitOutcome, WizardError>
    where
        T: SubmissionTrigger + ?Sized,
    {
        let snapshot = self.take_submission()?;
        let result = trigger.submit(&snapshot);
        self.finish_submission(result)
    }

    /// Re-validates the terminal step and re-enters submit-pending.
    pub fn retry_submission(&mut self) -> Result<Transition, WizardError> {
        if !matches!(self.phase, WizardPhase::SubmitFailed { .. }) {
            return Err(WizardError::NoSubmissionPending);
        }
        self.next()
    }

    /// Leaves a failed submission and keeps editing the current step.
    pub fn resume_editing(&mut self) -> Result<(), WizardError> {
        if !matches!(self.phase, WizardPhase::SubmitFailed { .. }) {
            return Err(WizardError::NoSubmissionPending);
        }
        self.phase = WizardPhase::Editing;
        Ok(())
    }

    fn guard_navigation(&self) -> Result<Option<Transition>, WizardError> {
        match self.phase {
            WizardPhase::SubmitPending { .. } => {
                debug!(graph = %self.graph.name(), "navigation refused while submitting");
                Ok(Some(Transition::Busy))
            }
            WizardPhase::Submitted(_) | WizardPhase::Cancelled => Err(WizardError::Closed),
            WizardPhase::Editing | WizardPhase::SubmitFailed { .. } => Ok(None),
        }
    }

    /// Resolves a request from `from` against `store` and follows it past
    /// loop regions whose collection is empty. Changes nothing.
    fn route(
        &self,
        from: StepId,
        direction: Direction,
        store: &dyn FieldStore,
    ) -> Result<Arrival, WizardError> {
        let mut origin = from;
        let mut resolution = self.graph.resolve(from, direction, store)?;

        for _ in 0..=self.graph.len() {
            let target = match resolution {
                Resolution::Terminal => return Ok(Arrival::Submit),
                Resolution::AtStart => return Ok(Arrival::Stay),
                Resolution::Step(target) => target,
            };

            let Some((slot, region)) = self.graph.region_of(target) else {
                return Ok(Arrival::Settle {
                    to: target,
                    item: None,
                });
            };
            let count = region.item_count(store);
            if region.contains(origin) {
                let index = region.clamp(self.state.loop_indices[slot], count);
                return Ok(Arrival::Settle {
                    to: target,
                    item: Some((slot, index)),
                });
            }
            if count > 0 {
                let index = match direction {
                    Direction::Forward => 0,
                    Direction::Backward => count - 1,
                };
                return Ok(Arrival::Settle {
                    to: target,
                    item: Some((slot, index)),
                });
            }

            debug!(region = %region.name, %direction, "skipping loop with no items");
            origin = match direction {
                Direction::Forward => region.end,
                Direction::Backward => region.start,
            };
            resolution = self.graph.resolve(origin, direction, store)?;
        }

        Err(WizardError::InvalidConfig(format!(
            "skipping empty loops from `{}` never reaches a step",
            self.graph.key(from)
        )))
    }

    fn commit(&mut self, from: StepId, arrival: Arrival) -> Transition {
        match arrival {
            Arrival::Submit => self.enter_submit_pending(),
            Arrival::Stay => Transition::Stayed,
            Arrival::Settle { to, item } => {
                if let Some((slot, index)) = item {
                    self.state.loop_indices[slot] = index;
                }
                self.settle(from, to)
            }
        }
    }

    fn enter_submit_pending(&mut self) -> Transition {
        self.pending = Some(self.store.snapshot());
        self.phase = WizardPhase::SubmitPending { in_flight: false };
        info!(graph = %self.graph.name(), step = %self.current_key(), "ready to submit");
        Transition::ReadyToSubmit
    }

    fn settle(&mut self, from: StepId, to: StepId) -> Transition {
        self.state.current = to;
        self.phase = WizardPhase::Editing;
        self.record_visit();
        let loop_index = self.loop_index();
        debug!(
            graph = %self.graph.name(),
            from = %self.graph.key(from),
            to = %self.graph.key(to),
            ?loop_index,
            "moved"
        );
        Transition::Moved {
            from,
            to,
            loop_index,
        }
    }

    fn record_visit(&mut self) {
        let visit = Visit {
            step: self.state.current,
            loop_index: self.loop_index(),
        };
        self.history.push(visit);
    }
}
