use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{is_filled, FieldPath, FieldStore};

pub type SharedPredicate = Arc<dyn Fn(&dyn FieldStore) -> bool + Send + Sync>;

/// Predicate over the field store that decides whether a branch rule fires.
///
/// Every variant except [`Condition::Custom`] is declarative, serialisable,
/// and visible to the exclusivity analysis run when a graph is built.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Equals { path: FieldPath, value: Value },
    NotEquals { path: FieldPath, value: Value },
    Present { path: FieldPath },
    Absent { path: FieldPath },
    All { of: Vec<Condition> },
    Any { of: Vec<Condition> },
    Not { of: Box<Condition> },
    #[serde(skip)]
    Custom(SharedPredicate),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Always
    }
}

impl Condition {
    pub fn equals(path: FieldPath, value: impl Into<Value>) -> Self {
        Condition::Equals {
            path,
            value: value.into(),
        }
    }

    pub fn not_equals(path: FieldPath, value: impl Into<Value>) -> Self {
        Condition::NotEquals {
            path,
            value: value.into(),
        }
    }

    pub fn present(path: FieldPath) -> Self {
        Condition::Present { path }
    }

    pub fn absent(path: FieldPath) -> Self {
        Condition::Absent { path }
    }

    pub fn negate(inner: Condition) -> Self {
        Condition::Not {
            of: Box::new(inner),
        }
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&dyn FieldStore) -> bool + Send + Sync + 'static,
    {
        Condition::Custom(Arc::new(predicate))
    }

    pub fn evaluate(&self, store: &dyn FieldStore) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equals { path, value } => store.get(path).unwrap_or(&Value::Null) == value,
            Condition::NotEquals { path, value } => {
                store.get(path).unwrap_or(&Value::Null) != value
            }
            Condition::Present { path } => store.validate_required(path),
            Condition::Absent { path } => !store.validate_required(path),
            Condition::All { of } => of.iter().all(|condition| condition.evaluate(store)),
            Condition::Any { of } => of.iter().any(|condition| condition.evaluate(store)),
            Condition::Not { of } => !of.evaluate(store),
            Condition::Custom(predicate) => predicate(store),
        }
    }

    /// True when this condition contains an opaque closure somewhere.
    pub fn is_opaque(&self) -> bool {
        match self {
            Condition::Custom(_) => true,
            Condition::All { of } | Condition::Any { of } => of.iter().any(Condition::is_opaque),
            Condition::Not { of } => of.is_opaque(),
            _ => false,
        }
    }

    /// Proves that `self` and `other` can never hold at the same time.
    ///
    /// The analysis is conservative: `false` means "not provably disjoint".
    pub fn is_disjoint(&self, other: &Condition) -> bool {
        self.disjoint_one_way(other) || other.disjoint_one_way(self)
    }

    fn disjoint_one_way(&self, other: &Condition) -> bool {
        match (self, other) {
            (Condition::Not { of }, _) => of.as_ref() == other,
            (Condition::All { of }, _) => of.iter().any(|member| member.is_disjoint(other)),
            (Condition::Any { of }, _) => {
                !of.is_empty() && of.iter().all(|member| member.is_disjoint(other))
            }
            (
                Condition::Equals { path: a, value: x },
                Condition::Equals { path: b, value: y },
            ) => a == b && x != y,
            (
                Condition::Equals { path: a, value: x },
                Condition::NotEquals { path: b, value: y },
            ) => a == b && x == y,
            (Condition::Equals { path: a, value }, Condition::Absent { path: b }) => {
                a == b && is_filled(value)
            }
            (Condition::Present { path: a }, Condition::Absent { path: b }) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Condition::Always, Condition::Always) => true,
            (
                Condition::Equals { path: a, value: x },
                Condition::Equals { path: b, value: y },
            )
            | (
                Condition::NotEquals { path: a, value: x },
                Condition::NotEquals { path: b, value: y },
            ) => a == b && x == y,
            (Condition::Present { path: a }, Condition::Present { path: b })
            | (Condition::Absent { path: a }, Condition::Absent { path: b }) => a == b,
            (Condition::All { of: a }, Condition::All { of: b })
            | (Condition::Any { of: a }, Condition::Any { of: b }) => a == b,
            (Condition::Not { of: a }, Condition::Not { of: b }) => a == b,
            (Condition::Custom(a), Condition::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("Always"),
            Condition::Equals { path, value } => write!(f, "{path} == {value}"),
            Condition::NotEquals { path, value } => write!(f, "{path} != {value}"),
            Condition::Present { path } => write!(f, "present({path})"),
            Condition::Absent { path } => write!(f, "absent({path})"),
            Condition::All { of } => f.debug_tuple("All").field(of).finish(),
            Condition::Any { of } => f.debug_tuple("Any").field(of).finish(),
            Condition::Not { of } => f.debug_tuple("Not").field(of).finish(),
            Condition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
