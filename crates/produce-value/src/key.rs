//! Path steps.

use std::borrow::Cow;
use std::fmt;

use crate::Value;

/// One step of a path from a root value to a position inside it.
///
/// Records are addressed by [`Key::Field`], sequences and set positions by
/// [`Key::Index`], ordered-map entries by [`Key::Entry`]. Keys that arrive
/// from outside (decoded patches, for example) are coerced to whatever the
/// container at that position needs, so `Field("3")` addresses index 3 of a
/// sequence and `Index(3)` addresses field `"3"` of a record.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Field(String),
    Entry(Value),
}

/// A path from a root value.
pub type Path = Vec<Key>;

impl Key {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Field(s) => s.parse().ok(),
            Key::Entry(Value::Int(i)) => usize::try_from(*i).ok(),
            Key::Entry(Value::Str(s)) => s.parse().ok(),
            Key::Entry(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<Cow<'_, str>> {
        match self {
            Key::Field(s) => Some(Cow::Borrowed(s.as_str())),
            Key::Index(i) => Some(Cow::Owned(i.to_string())),
            Key::Entry(Value::Str(s)) => Some(Cow::Borrowed(&**s)),
            Key::Entry(Value::Int(i)) => Some(Cow::Owned(i.to_string())),
            Key::Entry(_) => None,
        }
    }

    /// The key as an ordered-map key.
    pub fn to_map_key(&self) -> Value {
        match self {
            Key::Entry(v) => v.clone(),
            Key::Field(s) => Value::from(s.as_str()),
            Key::Index(i) => Value::from(*i),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// Negative integers can only name ordered-map entries.
impl From<i32> for Key {
    fn from(i: i32) -> Self {
        match usize::try_from(i) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Entry(Value::from(i)),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Field(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Field(s)
    }
}

impl From<Value> for Key {
    fn from(v: Value) -> Self {
        Key::Entry(v)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Field(s) => write!(f, "{s:?}"),
            Key::Entry(v) => write!(f, "<{v:?}>"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Field(s) => f.write_str(s),
            Key::Entry(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_coercion() {
        assert_eq!(Key::from("12").as_index(), Some(12));
        assert_eq!(Key::from("x").as_index(), None);
        assert_eq!(Key::Entry(Value::from(-1)).as_index(), None);
    }

    #[test]
    fn field_coercion() {
        assert_eq!(Key::Index(4).as_field().as_deref(), Some("4"));
        assert_eq!(Key::Entry(Value::from(true)).as_field(), None);
    }

    #[test]
    fn negative_literals_are_entries() {
        assert_eq!(Key::from(3), Key::Index(3));
        assert_eq!(Key::from(-3), Key::Entry(Value::from(-3)));
    }

    #[test]
    fn map_key_coercion() {
        assert_eq!(Key::from("a").to_map_key(), Value::from("a"));
        assert_eq!(Key::Index(2).to_map_key(), Value::from(2));
    }
}
