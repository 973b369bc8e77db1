//! The closed value type.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::container::Container;
use crate::{Key, Kind, ValueError};

pub type Record = Container<IndexMap<String, Value>>;
pub type Sequence = Container<Vec<Value>>;
pub type OrderedMap = Container<IndexMap<Value, Value>>;
pub type OrderedSet = Container<IndexSet<Value>>;

// ── Opaque ────────────────────────────────────────────────────────────────

/// A value with externally defined identity and behavior.
///
/// Opaque values are leaves: producers never draft them and two opaque values
/// are equal only if they are the same allocation.
#[derive(Clone)]
pub struct Opaque {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

/// An immutable value: a primitive, an opaque object, or one of the four
/// container kinds.
///
/// Containers are reference counted. Cloning a `Value` never copies a
/// container, it hands out another reference to the same one, so structural
/// sharing between two values is observable through [`Value::same`].
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Record(Arc<Record>),
    Seq(Arc<Sequence>),
    Map(Arc<OrderedMap>),
    Set(Arc<OrderedSet>),
    Opaque(Opaque),
}

impl Value {
    // ── Construction ──────────────────────────────────────────────────────

    pub fn record<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::from(map)
    }

    pub fn seq<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        Value::Seq(Arc::new(Container::new(items)))
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let map: IndexMap<Value, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::from(map)
    }

    pub fn set<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        let set: IndexSet<Value> = items.into_iter().map(Into::into).collect();
        Value::from(set)
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Opaque::new(value))
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn kind(&self) -> Kind {
        crate::classify(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(r) => Some(r.data()),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s.data().as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(m.data()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&IndexSet<Value>> {
        match self {
            Value::Set(s) => Some(s.data()),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Number of entries of a container, `None` for leaves.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(r.len()),
            Value::Seq(s) => Some(s.len()),
            Value::Map(m) => Some(m.len()),
            Value::Set(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Looks up one path step. Set members are addressed by position.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match self {
            Value::Record(r) => r.get(&*key.as_field()?),
            Value::Seq(s) => s.get(key.as_index()?),
            Value::Map(m) => m.get(&key.to_map_key()),
            Value::Set(s) => s.get_index(key.as_index()?),
            _ => None,
        }
    }

    /// Follows `path` from this value.
    pub fn at(&self, path: &[Key]) -> Option<&Value> {
        path.iter().try_fold(self, |cur, key| cur.get(key))
    }

    // ── Identity ──────────────────────────────────────────────────────────

    /// Address of the container allocation, `None` for leaves.
    ///
    /// Two values with the same address are the same container.
    pub fn addr(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(Arc::as_ptr(r) as usize),
            Value::Seq(s) => Some(Arc::as_ptr(s) as usize),
            Value::Map(m) => Some(Arc::as_ptr(m) as usize),
            Value::Set(s) => Some(Arc::as_ptr(s) as usize),
            _ => None,
        }
    }

    /// `true` if both values are the same container allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.addr(), other.addr()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Reference identity for containers and opaque values, equality for
    /// primitives.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ if self.kind().is_container() || other.kind().is_container() => self.ptr_eq(other),
            _ => self == other,
        }
    }

    // ── Freezing ──────────────────────────────────────────────────────────

    /// Leaves are always frozen.
    pub fn is_frozen(&self) -> bool {
        match self {
            Value::Record(r) => r.is_frozen(),
            Value::Seq(s) => s.is_frozen(),
            Value::Map(m) => m.is_frozen(),
            Value::Set(s) => s.is_frozen(),
            _ => true,
        }
    }

    /// Marks this container immutable in place, visible through every handle.
    ///
    /// With `deep`, descends into children. Descent stops at containers that
    /// were already frozen.
    pub fn freeze(&self, deep: bool) {
        match self {
            Value::Record(r) => {
                if r.freeze() && deep {
                    r.values().for_each(|v| v.freeze(true));
                }
            }
            Value::Seq(s) => {
                if s.freeze() && deep {
                    s.iter().for_each(|v| v.freeze(true));
                }
            }
            Value::Map(m) => {
                if m.freeze() && deep {
                    for (k, v) in m.iter() {
                        k.freeze(true);
                        v.freeze(true);
                    }
                }
            }
            Value::Set(s) => {
                if s.freeze() && deep {
                    s.iter().for_each(|v| v.freeze(true));
                }
            }
            _ => {}
        }
    }

    // ── Direct mutation ───────────────────────────────────────────────────
    //
    // These bypass the draft protocol. They copy the container first when it
    // is shared, so other holders never observe the write, and they refuse
    // to touch frozen containers.

    pub fn record_mut(&mut self) -> Result<&mut IndexMap<String, Value>, ValueError> {
        match self {
            Value::Record(r) => make_mut(r, Kind::Record),
            other => Err(mismatch(Kind::Record, other)),
        }
    }

    pub fn seq_mut(&mut self) -> Result<&mut Vec<Value>, ValueError> {
        match self {
            Value::Seq(s) => make_mut(s, Kind::Sequence),
            other => Err(mismatch(Kind::Sequence, other)),
        }
    }

    pub fn map_mut(&mut self) -> Result<&mut IndexMap<Value, Value>, ValueError> {
        match self {
            Value::Map(m) => make_mut(m, Kind::OrderedMap),
            other => Err(mismatch(Kind::OrderedMap, other)),
        }
    }

    pub fn set_mut(&mut self) -> Result<&mut IndexSet<Value>, ValueError> {
        match self {
            Value::Set(s) => make_mut(s, Kind::OrderedSet),
            other => Err(mismatch(Kind::OrderedSet, other)),
        }
    }
}

fn make_mut<T: Clone>(c: &mut Arc<Container<T>>, kind: Kind) -> Result<&mut T, ValueError> {
    if c.is_frozen() {
        return Err(ValueError::Frozen(kind));
    }
    Ok(Arc::make_mut(c).data_mut())
}

fn mismatch(expected: Kind, found: &Value) -> ValueError {
    ValueError::KindMismatch {
        expected,
        found: found.kind(),
    }
}

// ── Equality & hashing ────────────────────────────────────────────────────

// Structural equality. Records, maps and sets ignore entry order; floats
// compare by bit pattern so that `Eq` holds.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Seq(a), Value::Seq(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Seq(s) => s.iter().for_each(|v| v.hash(state)),
            // Order-insensitive equality, so only the size takes part.
            Value::Record(r) => r.len().hash(state),
            Value::Map(m) => m.len().hash(state),
            Value::Set(s) => s.len().hash(state),
            Value::Opaque(o) => o.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Record(r) => f.debug_map().entries(r.iter()).finish(),
            Value::Seq(s) => f.debug_list().entries(s.iter()).finish(),
            Value::Map(m) => {
                f.write_str("Map")?;
                f.debug_map().entries(m.iter()).finish()
            }
            Value::Set(s) => {
                f.write_str("Set")?;
                f.debug_set().entries(s.iter()).finish()
            }
            Value::Opaque(o) => o.fmt(f),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::seq(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Record(Arc::new(Container::new(map)))
    }
}

impl From<IndexMap<Value, Value>> for Value {
    fn from(map: IndexMap<Value, Value>) -> Self {
        Value::Map(Arc::new(Container::new(map)))
    }
}

impl From<IndexSet<Value>> for Value {
    fn from(set: IndexSet<Value>) -> Self {
        Value::Set(Arc::new(Container::new(set)))
    }
}
