mod common;

use std::sync::Arc;

use common::{linear_graph, looped_graph, moved_to, named_items, path, store};
use serde_json::{json, Value};
use uuid::Uuid;
use wizard_core::errors::{SubmissionError, WizardError};
use wizard_core::graph::{BranchRule, Condition, StepGraph, StepId};
use wizard_core::store::{FieldStore, JsonFieldStore};
use wizard_core::validation::{Check, StepGate};
use wizard_core::wizard::{
    Progress, SubmitOutcome, Transition, Wizard, WizardContext, WizardPhase,
};

#[test]
fn linear_graph_walks_to_terminal_and_back() {
    let mut wizard = Wizard::new(linear_graph(5), JsonFieldStore::new());

    for expected in 1..5 {
        assert_eq!(moved_to(&wizard.next().unwrap()), Some(StepId(expected)));
    }
    assert!(wizard.is_terminal_step());
    assert_eq!(wizard.progress(), Progress { position: 5, total: 5 });

    for expected in (0..4).rev() {
        assert_eq!(moved_to(&wizard.previous().unwrap()), Some(StepId(expected)));
    }
    assert_eq!(wizard.previous().unwrap(), Transition::Stayed);
    assert_eq!(wizard.current_step(), StepId(0));

    for _ in 0..4 {
        wizard.next().unwrap();
    }
    assert_eq!(wizard.next().unwrap(), Transition::ReadyToSubmit);
    assert_eq!(wizard.phase(), &WizardPhase::SubmitPending { in_flight: false });
}

#[test]
fn exclusive_branches_route_deterministically() {
    let mut builder = StepGraph::builder("branches");
    let start = builder.step("start", StepGate::default());
    builder.step("default", StepGate::default());
    let first = builder.step("first", StepGate::default());
    let second = builder.step("second", StepGate::default());
    builder
        .rule(BranchRule::forward(
            start,
            Condition::equals(path("kind"), "A"),
            first,
        ))
        .rule(BranchRule::forward(
            start,
            Condition::equals(path("kind"), "B"),
            second,
        ));
    let mut wizard = Wizard::new(Arc::new(builder.build().unwrap()), JsonFieldStore::new());

    for kind in ["A", "B", "A", "C", "B", "B"] {
        wizard.store_mut().put("kind", kind).unwrap();
        let expected = match kind {
            "A" => first,
            "B" => second,
            _ => StepId(1),
        };
        assert_eq!(moved_to(&wizard.next().unwrap()), Some(expected), "kind {kind}");
        wizard.jump_to(start, None).unwrap();
    }
}

#[test]
fn loop_region_visits_every_step_for_every_item() {
    let items = 4;
    let mut wizard = Wizard::new(looped_graph(), store(named_items(items)));

    while wizard.current_key() != "outro" {
        assert!(matches!(wizard.next().unwrap(), Transition::Moved { .. }));
    }

    let region_visits: Vec<(String, usize)> = wizard
        .history()
        .iter()
        .filter_map(|visit| {
            visit
                .loop_index
                .map(|index| (wizard.graph().key(visit.step), index))
        })
        .collect();
    assert_eq!(region_visits.len(), 3 * items);

    let indices: Vec<usize> = region_visits.iter().map(|(_, index)| *index).collect();
    let expected: Vec<usize> = (0..items).flat_map(|index| [index; 3]).collect();
    assert_eq!(indices, expected);
    assert_eq!(region_visits[3].0, "r1");
    assert_eq!(wizard.progress(), Progress { position: 5, total: 5 });
}

#[test]
fn shrinking_collection_clamps_the_index() {
    let mut wizard = Wizard::new(looped_graph(), store(named_items(5)));
    wizard.jump_to_key("r3", Some(4)).unwrap();
    assert_eq!(wizard.loop_index(), Some(4));

    wizard.store_mut().put("items", named_items(3)["items"].clone()).unwrap();
    assert_eq!(wizard.loop_index(), Some(2));
    assert_eq!(moved_to(&wizard.next().unwrap()), Some(StepId(4)));

    // Re-entering backward resumes the last live item.
    wizard.previous().unwrap();
    assert_eq!(wizard.current_key(), "r3");
    assert_eq!(wizard.loop_index(), Some(2));
}

#[test]
fn shrinking_collection_clamps_before_retreating() {
    let mut wizard = Wizard::new(looped_graph(), store(named_items(5)));
    wizard.jump_to_key("r1", Some(4)).unwrap();
    wizard.store_mut().put("items", named_items(3)["items"].clone()).unwrap();

    assert_eq!(
        wizard.previous().unwrap(),
        Transition::Moved {
            from: StepId(1),
            to: StepId(3),
            loop_index: Some(1)
        }
    );
}

#[test]
fn failing_gate_never_moves_or_writes() {
    let mut builder = StepGraph::builder("gated");
    builder.step(
        "title",
        StepGate::new().require(path("title"), "Title", Check::NonEmpty),
    );
    builder.step("done", StepGate::default());
    let mut wizard = Wizard::new(Arc::new(builder.build().unwrap()), JsonFieldStore::new());
    wizard.store_mut().put("title", "   ").unwrap();

    let state = wizard.state().clone();
    let fields = wizard.store().snapshot();
    for _ in 0..5 {
        let Transition::Blocked(err) = wizard.next().unwrap() else {
            panic!("blank title must block");
        };
        assert_eq!(err.field, "title");
        assert_eq!(wizard.state(), &state);
        assert_eq!(wizard.store().snapshot(), fields);
    }
}

#[test]
fn failing_gate_inside_loop_keeps_item_index() {
    let mut items = named_items(3);
    items["items"][1]["name"] = Value::Null;
    let mut wizard = Wizard::new(looped_graph(), store(items));
    wizard.jump_to_key("r2", Some(1)).unwrap();

    let state = wizard.state().clone();
    for _ in 0..3 {
        let Transition::Blocked(err) = wizard.next().unwrap() else {
            panic!("missing name must block");
        };
        assert_eq!(err.field, "items[1].name");
    }
    assert_eq!(wizard.state(), &state);
}

/// Ordinals mirror the rental flow: RentalType = 3, Price = 4, RoomIntro = 5.
fn asymmetric_graph() -> Arc<StepGraph> {
    let mut builder = StepGraph::builder("asymmetric");
    for key in ["kind", "location", "details"] {
        builder.step(key, StepGate::default());
    }
    let rental = builder.step("rental_type", StepGate::default());
    builder.step("price", StepGate::default());
    let rooms = builder.step("room_intro", StepGate::default());
    builder.step("availability", StepGate::default());
    builder
        .rule(BranchRule::forward(
            rental,
            Condition::equals(path("lease_type"), "COLOCATION"),
            rooms,
        ))
        .rule(BranchRule::backward(rooms, Condition::Always, rental));
    Arc::new(builder.build().unwrap())
}

#[test]
fn backward_rules_are_independent_of_forward_rules() {
    let mut wizard = Wizard::with_context(
        asymmetric_graph(),
        store(json!({"lease_type": "COLOCATION"})),
        WizardContext::starting_at(StepId(3)),
    )
    .unwrap();

    assert_eq!(moved_to(&wizard.next().unwrap()), Some(StepId(5)));
    assert_eq!(moved_to(&wizard.previous().unwrap()), Some(StepId(3)));

    assert_eq!(moved_to(&wizard.next().unwrap()), Some(StepId(5)));
    wizard.store_mut().put("lease_type", "EMPTY").unwrap();
    assert_eq!(wizard.current_step(), StepId(5));
    assert_eq!(moved_to(&wizard.previous().unwrap()), Some(StepId(3)));

    let visited: Vec<usize> = wizard.history().iter().map(|visit| visit.step.index()).collect();
    assert_eq!(visited, vec![3, 5, 3, 5, 3]);
}

#[test]
fn pending_submission_rejects_navigation() {
    let mut wizard = Wizard::with_context(
        linear_graph(3),
        JsonFieldStore::new(),
        WizardContext::starting_at(StepId(2)),
    )
    .unwrap();
    wizard.store_mut().put("title", "Loft").unwrap();
    assert_eq!(wizard.next().unwrap(), Transition::ReadyToSubmit);
    assert!(!wizard.can_submit());

    // Edits after this point are not part of the submission.
    wizard.store_mut().put("title", "Changed").unwrap();
    let snapshot = wizard.take_submission().unwrap();
    assert_eq!(snapshot["title"], "Loft");

    let state = wizard.state().clone();
    assert_eq!(wizard.next().unwrap(), Transition::Busy);
    assert_eq!(wizard.previous().unwrap(), Transition::Busy);
    assert_eq!(wizard.jump_to(StepId(0), None).unwrap(), Transition::Busy);
    assert_eq!(wizard.restart().unwrap(), Transition::Busy);
    assert!(matches!(wizard.cancel(), Err(WizardError::SubmissionInFlight)));
    assert_eq!(wizard.state(), &state);

    let outcome = wizard
        .finish_submission(Err(SubmissionError::Rejected("timeout".into())))
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Failed("Submission rejected: timeout".into()));
    assert_eq!(wizard.current_step(), StepId(2));

    assert_eq!(moved_to(&wizard.previous().unwrap()), Some(StepId(1)));
    assert_eq!(wizard.phase(), &WizardPhase::Editing);
}

#[test]
fn settled_submission_closes_the_wizard() {
    let mut wizard = Wizard::with_context(
        linear_graph(2),
        JsonFieldStore::new(),
        WizardContext::starting_at(StepId(1)),
    )
    .unwrap();
    assert!(wizard.can_submit());
    wizard.next().unwrap();

    let record = Uuid::new_v4();
    let mut calls = 0;
    let outcome = wizard
        .submit_with(&mut |_: &Value| -> Result<Uuid, SubmissionError> {
            calls += 1;
            Ok(record)
        })
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(receipt) if receipt.record_id == record));
    assert_eq!(calls, 1);

    assert!(matches!(wizard.take_submission(), Err(WizardError::NoSubmissionPending)));
    assert!(matches!(wizard.next(), Err(WizardError::Closed)));
    assert!(matches!(wizard.jump_to(StepId(0), None), Err(WizardError::Closed)));
}

#[test]
fn jump_into_loop_then_back_resumes_previous_item() {
    let mut wizard = Wizard::new(looped_graph(), store(named_items(5)));
    wizard.jump_to_key("outro", None).unwrap();

    assert_eq!(
        wizard.jump_to_key("r1", Some(2)).unwrap(),
        Transition::Moved {
            from: StepId(4),
            to: StepId(1),
            loop_index: Some(2)
        }
    );
    assert_eq!(
        wizard.previous().unwrap(),
        Transition::Moved {
            from: StepId(1),
            to: StepId(3),
            loop_index: Some(1)
        }
    );
}

#[test]
fn jump_bypasses_rules_and_validation() {
    let mut builder = StepGraph::builder("jumps");
    builder.step(
        "gated",
        StepGate::new().require(path("title"), "Title", Check::Required),
    );
    builder.step("middle", StepGate::default());
    builder.step("recap", StepGate::default());
    let mut wizard = Wizard::new(Arc::new(builder.build().unwrap()), JsonFieldStore::new());

    assert_eq!(moved_to(&wizard.jump_to_key("recap", None).unwrap()), Some(StepId(2)));
    assert!(matches!(
        wizard.jump_to(StepId(9), None),
        Err(WizardError::UnknownStep(_))
    ));
    assert!(matches!(
        wizard.jump_to_key("missing", None),
        Err(WizardError::UnknownStep(_))
    ));
}

#[test]
fn restart_resets_position_and_loop_indices() {
    let mut wizard = Wizard::new(looped_graph(), store(named_items(3)));
    wizard.jump_to_key("r2", Some(2)).unwrap();
    wizard.restart().unwrap();
    assert_eq!(wizard.current_step(), StepId(0));
    assert_eq!(wizard.state().loop_indices, vec![0]);
    assert_eq!(wizard.history().len(), 1);

    wizard.next().unwrap();
    assert_eq!(wizard.loop_index(), Some(0));
}

#[test]
fn action_label_switches_on_the_last_loop_item() {
    let mut builder = StepGraph::builder("tail_loop");
    builder.step("intro", StepGate::default());
    let room = builder.step("room", StepGate::default());
    builder.region(wizard_core::looping::LoopRegion::new(
        "rooms",
        room,
        room,
        path("rooms"),
    ));
    let graph = Arc::new(builder.build().unwrap());
    let mut wizard = Wizard::new(graph, store(json!({"rooms": [{}, {}]})));

    wizard.next().unwrap();
    assert_eq!(wizard.action_label(), "Next");
    wizard.next().unwrap();
    assert_eq!(wizard.loop_index(), Some(1));
    assert_eq!(wizard.action_label(), "Publish");
    assert_eq!(wizard.next().unwrap(), Transition::ReadyToSubmit);
}
