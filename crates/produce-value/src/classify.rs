//! Value classification: which values can be drafted.

use std::fmt;

use crate::Value;

/// What a value is, from the point of view of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Record,
    Sequence,
    OrderedMap,
    OrderedSet,
    /// Primitives and opaque objects. Never drafted, passed through by reference.
    Leaf,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Record => "record",
            Kind::Sequence => "sequence",
            Kind::OrderedMap => "map",
            Kind::OrderedSet => "set",
            Kind::Leaf => "leaf",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Kind::Leaf)
    }

    /// Maps and sets.
    pub fn is_collection(&self) -> bool {
        matches!(self, Kind::OrderedMap | Kind::OrderedSet)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a value by its runtime container kind.
///
/// Empty containers classify like any other container of their kind.
///
/// ```
/// use produce_value::{classify, Kind, Value};
///
/// assert_eq!(classify(&Value::seq(Vec::<Value>::new())), Kind::Sequence);
/// assert_eq!(classify(&Value::from("text")), Kind::Leaf);
/// ```
pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Record(_) => Kind::Record,
        Value::Seq(_) => Kind::Sequence,
        Value::Map(_) => Kind::OrderedMap,
        Value::Set(_) => Kind::OrderedSet,
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_)
        | Value::Opaque(_) => Kind::Leaf,
    }
}

/// Returns `true` for values a producer can draft.
pub fn is_draftable(value: &Value) -> bool {
    classify(value).is_container()
}
