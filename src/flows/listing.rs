//! Publish-a-listing wizard.
//!
//! Colocation listings skip the price step and configure one rent per room
//! instead; other lease types skip the room block entirely. The location
//! step is skipped both ways when the flow is opened for an existing
//! property (`context.property_id` pre-seeded).

use std::sync::Arc;

use serde_json::json;

use crate::config::ConfigError;
use crate::definition::WizardDefinition;
use crate::graph::StepGraph;

pub const NAME: &str = "listing";
pub const PROPERTY_CONTEXT: &str = "context.property_id";
pub const COLOCATION: &str = "COLOCATION";

pub fn definition() -> Result<WizardDefinition, ConfigError> {
    WizardDefinition::from_value(json!({
        "name": NAME,
        "labels": {"advance": "Next", "submit": "Publish"},
        "steps": [
            {"key": "property_kind", "title": "Property type", "requires": [
                {"path": "property_kind", "label": "Property type",
                 "check": {"one_of": ["APARTMENT", "HOUSE", "STUDIO"]}}
            ]},
            {"key": "location", "title": "Location", "requires": [
                {"path": "location.city", "label": "City", "check": "non_empty"},
                {"path": "location.address", "label": "Address", "check": "non_empty"}
            ]},
            {"key": "rental_type", "title": "Rental type", "requires": [
                {"path": "lease_type", "label": "Lease type",
                 "check": {"one_of": ["EMPTY", "FURNISHED", COLOCATION]}}
            ]},
            {"key": "price", "title": "Price", "requires": [
                {"path": "rent", "label": "Rent", "check": "positive_number"}
            ]},
            {"key": "room_intro", "title": "Rooms", "requires": [
                {"path": "rooms", "label": "Rooms", "check": {"min_items": 1}}
            ]},
            {"key": "room_details", "title": "Room details", "requires": [
                {"path": "surface", "label": "Surface", "check": "positive_number"}
            ]},
            {"key": "room_price", "title": "Room price", "requires": [
                {"path": "rent", "label": "Rent", "check": "positive_number"}
            ]},
            {"key": "availability", "title": "Availability", "requires": [
                {"path": "available_from", "label": "Available from"}
            ]},
            {"key": "description", "title": "Description", "requires": [
                {"path": "title", "label": "Title", "check": "non_empty"}
            ]},
            {"key": "recap", "title": "Recap"}
        ],
        "rules": [
            {"from": "property_kind", "direction": "forward",
             "when": {"when": "present", "path": PROPERTY_CONTEXT}, "to": "rental_type"},
            {"from": "rental_type", "direction": "backward",
             "when": {"when": "present", "path": PROPERTY_CONTEXT}, "to": "property_kind"},
            {"from": "rental_type", "direction": "forward",
             "when": {"when": "equals", "path": "lease_type", "value": COLOCATION},
             "to": "room_intro"},
            {"from": "price", "direction": "forward", "to": "availability"},
            {"from": "room_intro", "direction": "backward", "to": "rental_type"},
            {"from": "availability", "direction": "backward",
             "when": {"when": "not_equals", "path": "lease_type", "value": COLOCATION},
             "to": "price"}
        ],
        "loops": [
            {"name": "rooms", "from": "room_details", "to": "room_price", "collection": "rooms",
             "derive": [{"field": "name", "template": "Room {n}"}]}
        ]
    }))
}

pub fn graph() -> Result<Arc<StepGraph>, ConfigError> {
    Ok(Arc::new(definition()?.compile()?))
}
