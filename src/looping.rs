//! Loop controller: replays a contiguous block of steps once per item of a
//! collection whose length is read live from the field store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::graph::StepId;
use crate::store::{display_value, lookup, FieldPath, FieldStore};

/// Field written on the current item when the region's last step passes
/// validation, e.g. a generated room name.
///
/// Templates accept `{n}` for the 1-based item position and `{field}` for
/// any item field, e.g. `"{kind} {n}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedField {
    pub field: FieldPath,
    pub template: String,
}

impl DerivedField {
    pub fn new(field: FieldPath, template: impl Into<String>) -> Self {
        Self {
            field,
            template: template.into(),
        }
    }

    pub fn render(&self, item: &Value, position: usize) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = after[..close].trim();
            if name == "n" {
                out.push_str(&position.to_string());
            } else if let Some(value) = FieldPath::parse(name)
                .ok()
                .and_then(|path| lookup(item, &path))
            {
                out.push_str(&display_value(value));
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopRegion {
    pub name: String,
    pub start: StepId,
    pub end: StepId,
    pub collection: FieldPath,
    pub derived: Vec<DerivedField>,
}

/// What a forward request from the region's last step turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopForward {
    /// Replay the region from its first step for item `index`.
    AdvanceIndex { index: usize },
    /// Last item done; leave past the region's last step.
    ExitRegion,
}

/// What a backward request from the region's first step turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopBackward {
    /// Re-open item `index` at the region's last step.
    RetreatIndex { index: usize },
    /// First item; leave before the region's first step.
    ExitRegionBackward,
}

impl LoopRegion {
    pub fn new(name: impl Into<String>, start: StepId, end: StepId, collection: FieldPath) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            collection,
            derived: Vec::new(),
        }
    }

    pub fn with_derived(mut self, derived: DerivedField) -> Self {
        self.derived.push(derived);
        self
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.start <= step && step <= self.end
    }

    pub fn span(&self) -> usize {
        self.end.index() - self.start.index() + 1
    }

    pub fn item_count(&self, store: &dyn FieldStore) -> usize {
        store.collection(&self.collection).len()
    }

    /// Path of item `index` inside the collection.
    pub fn item_path(&self, index: usize) -> FieldPath {
        self.collection.index(index)
    }

    /// Keeps `index` inside `0..count`; an empty collection clamps to 0.
    pub fn clamp(&self, index: usize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        if index >= count {
            warn!(
                region = %self.name,
                index,
                count,
                "loop index past collection end, clamping"
            );
            return count - 1;
        }
        index
    }

    pub fn on_forward_from_tail(&self, store: &dyn FieldStore, loop_index: usize) -> LoopForward {
        let count = self.item_count(store);
        let index = self.clamp(loop_index, count);
        if index + 1 < count {
            LoopForward::AdvanceIndex { index: index + 1 }
        } else {
            LoopForward::ExitRegion
        }
    }

    pub fn on_backward_from_head(&self, store: &dyn FieldStore, loop_index: usize) -> LoopBackward {
        let index = self.clamp(loop_index, self.item_count(store));
        if index > 0 {
            LoopBackward::RetreatIndex { index: index - 1 }
        } else {
            LoopBackward::ExitRegionBackward
        }
    }
}
