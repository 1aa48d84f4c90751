mod common;

use common::{moved_to, trace};
use insta::assert_snapshot;
use serde_json::{json, Value};
use uuid::Uuid;
use wizard_core::errors::SubmissionError;
use wizard_core::flows::listing;
use wizard_core::store::JsonFieldStore;
use wizard_core::wizard::{Progress, SubmitOutcome, Transition, Wizard};

fn listing_wizard() -> Wizard<JsonFieldStore> {
    Wizard::new(listing::graph().unwrap(), JsonFieldStore::new())
}

fn put(wizard: &mut Wizard<JsonFieldStore>, path: &str, value: impl Into<Value>) {
    wizard.store_mut().put(path, value).unwrap();
}

fn advance(wizard: &mut Wizard<JsonFieldStore>) -> Transition {
    let transition = wizard.next().unwrap();
    assert!(
        !matches!(transition, Transition::Blocked(_)),
        "blocked on `{}`: {:?}",
        wizard.current_key(),
        transition
    );
    transition
}

/// Fills the steps shared by every lease type, up to the rental type.
fn fill_until_rental_type(wizard: &mut Wizard<JsonFieldStore>, lease_type: &str) {
    put(wizard, "property_kind", "APARTMENT");
    advance(wizard);
    put(wizard, "location.city", "Lyon");
    put(wizard, "location.address", "3 rue Mercière");
    advance(wizard);
    assert_eq!(wizard.current_key(), "rental_type");
    put(wizard, "lease_type", lease_type);
}

#[test]
fn colocation_listing_configures_each_room() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "COLOCATION");
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "room_intro");

    let Transition::Blocked(err) = wizard.next().unwrap() else {
        panic!("room intro needs rooms");
    };
    assert_eq!(err.message, "Rooms needs at least 1 item(s)");

    put(
        &mut wizard,
        "rooms",
        json!([{"surface": 12, "rent": 420}, {"surface": 9, "rent": 380}]),
    );
    while wizard.current_key() != "availability" {
        advance(&mut wizard);
    }
    put(&mut wizard, "available_from", "2024-09-01");
    advance(&mut wizard);
    put(&mut wizard, "title", "Sunny flat share");
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "recap");
    assert_eq!(wizard.action_label(), "Publish");

    assert_snapshot!(trace(&wizard), @r###"
property_kind
location
rental_type
room_intro
room_details[0]
room_price[0]
room_details[1]
room_price[1]
availability
description
recap
"###);

    assert_eq!(advance(&mut wizard), Transition::ReadyToSubmit);
    let snapshot = wizard.take_submission().unwrap();
    assert_eq!(snapshot["rooms"][0]["name"], "Room 1");
    assert_eq!(snapshot["rooms"][1]["name"], "Room 2");
    assert!(snapshot.get("rent").is_none());
}

#[test]
fn colocation_back_navigation_reopens_rooms_in_reverse() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "COLOCATION");
    put(
        &mut wizard,
        "rooms",
        json!([{"surface": 12, "rent": 420}, {"surface": 9, "rent": 380}]),
    );
    while wizard.current_key() != "availability" {
        advance(&mut wizard);
    }

    let mut visited = Vec::new();
    while wizard.current_key() != "rental_type" {
        wizard.previous().unwrap();
        visited.push((wizard.current_key().to_string(), wizard.loop_index()));
    }
    let expected = [
        ("room_price", Some(1)),
        ("room_details", Some(1)),
        ("room_price", Some(0)),
        ("room_details", Some(0)),
        ("room_intro", None),
        ("rental_type", None),
    ];
    let expected: Vec<(String, Option<usize>)> = expected
        .iter()
        .map(|(key, index)| (key.to_string(), *index))
        .collect();
    assert_eq!(visited, expected);
}

#[test]
fn lowercase_lease_type_is_stored_canonically_and_branches() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, " colocation");
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "room_intro");
    assert_eq!(wizard.store().value("lease_type"), Some(&json!("COLOCATION")));

    put(&mut wizard, "rooms", json!([{"surface": 12, "rent": 420}]));
    while wizard.current_key() != "availability" {
        advance(&mut wizard);
    }
    wizard.previous().unwrap();
    assert_eq!(wizard.current_key(), "room_price");
}

#[test]
fn other_lease_types_skip_the_room_block_both_ways() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "FURNISHED");
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "price");
    assert_eq!(wizard.progress(), Progress { position: 4, total: 10 });

    put(&mut wizard, "rent", 950);
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "availability");

    wizard.previous().unwrap();
    assert_eq!(wizard.current_key(), "price");
    wizard.previous().unwrap();
    assert_eq!(wizard.current_key(), "rental_type");
}

#[test]
fn known_property_skips_location() {
    let mut wizard = listing_wizard();
    put(&mut wizard, "context.property_id", "prop-42");
    put(&mut wizard, "property_kind", "HOUSE");

    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "rental_type");
    wizard.previous().unwrap();
    assert_eq!(wizard.current_key(), "property_kind");
}

#[test]
fn recap_jump_edits_one_room() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "COLOCATION");
    put(
        &mut wizard,
        "rooms",
        json!([
            {"surface": 12, "rent": 420},
            {"surface": 9, "rent": 380},
            {"surface": 15, "rent": 500}
        ]),
    );
    put(&mut wizard, "available_from", "2024-09-01");
    put(&mut wizard, "title", "Three rooms");
    while wizard.current_key() != "recap" {
        advance(&mut wizard);
    }

    let transition = wizard.jump_to_key("room_price", Some(1)).unwrap();
    assert_eq!(moved_to(&transition).map(|step| step.index()), Some(6));
    assert_eq!(wizard.loop_index(), Some(1));
    assert_eq!(wizard.progress(), Progress { position: 7, total: 10 });

    put(&mut wizard, "rooms[1].rent", 395);
    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "room_details");
    assert_eq!(wizard.loop_index(), Some(2));
}

#[test]
fn removing_the_current_room_clamps_to_the_new_last_room() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "COLOCATION");
    put(
        &mut wizard,
        "rooms",
        json!([
            {"surface": 12, "rent": 420},
            {"surface": 9, "rent": 380},
            {"surface": 15, "rent": 500}
        ]),
    );
    wizard.jump_to_key("room_price", Some(2)).unwrap();

    let removed = wizard
        .store_mut()
        .remove(&common::path("rooms[2]"))
        .unwrap();
    assert_eq!(removed["surface"], 15);

    advance(&mut wizard);
    assert_eq!(wizard.current_key(), "availability");
    assert_eq!(wizard.store().value("rooms[1].name"), Some(&json!("Room 2")));
}

#[test]
fn failed_publish_keeps_the_recap_step() {
    let mut wizard = listing_wizard();
    fill_until_rental_type(&mut wizard, "EMPTY");
    put(&mut wizard, "rent", 700);
    put(&mut wizard, "available_from", "2024-10-01");
    put(&mut wizard, "title", "Quiet studio");
    while wizard.current_key() != "recap" {
        advance(&mut wizard);
    }
    advance(&mut wizard);

    let outcome = wizard
        .submit_with(&mut |_: &Value| -> Result<Uuid, SubmissionError> {
            Err(SubmissionError::Rejected("503".into()))
        })
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(wizard.current_key(), "recap");
    assert!(wizard.can_submit());

    wizard.resume_editing().unwrap();
    assert_eq!(wizard.current_key(), "recap");
    assert_eq!(advance(&mut wizard), Transition::ReadyToSubmit);
}
