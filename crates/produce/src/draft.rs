//! Draft cursors handed to recipes.
//!
//! A [`DraftMut`] is a position in the draft tree of one invocation. It
//! borrows the store mutably, so at most one cursor is live at a time;
//! descending with [`DraftMut::child`] reborrows, and [`DraftHandle`]s let a
//! recipe come back to a node it saw earlier.
//!
//! The per-kind views ([`RecordDraft`], [`SeqDraft`], [`MapDraft`],
//! [`SetDraft`]) dereference to `DraftMut` and add the operations that only
//! make sense for that container kind.

use std::ops::{Deref, DerefMut};

use produce_value::{Key, Kind, Value};

use crate::error::ProduceError;
use crate::patch::Patch;
use crate::store::{DraftStore, NodeId, ROOT};

/// A `Copy` reference to a drafted node, valid for the invocation that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftHandle {
    session: u64,
    node: NodeId,
}

/// Mutable cursor at one drafted container.
#[derive(Debug)]
pub struct DraftMut<'a> {
    store: &'a mut DraftStore,
    node: NodeId,
}

impl<'a> DraftMut<'a> {
    pub(crate) fn root(store: &'a mut DraftStore) -> Self {
        Self { store, node: ROOT }
    }

    pub fn kind(&self) -> Kind {
        self.store.kind(self.node)
    }

    pub fn len(&self) -> usize {
        self.store.len(self.node)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in order: fields, indices or map keys. Sets list member positions.
    pub fn keys(&self) -> Vec<Key> {
        self.store.keys(self.node)
    }

    /// Current value at `key`. Drafted positions are snapshotted.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.store.get(self.node, &key.into())
    }

    /// Current values in order.
    pub fn values(&self) -> Vec<Value> {
        self.keys()
            .iter()
            .filter_map(|k| self.store.get(self.node, k))
            .collect()
    }

    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.store.get(self.node, &k).map(|v| (k, v)))
            .collect()
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match self.store.normalize(self.node, &key) {
            Ok(Key::Index(i)) => i < self.len(),
            Ok(k) => self.store.get(self.node, &k).is_some(),
            Err(_) => false,
        }
    }

    /// Writes a field, a map entry or a sequence element. Writing at a
    /// sequence's length appends.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ProduceError> {
        self.store.set(self.node, &key.into(), value.into())
    }

    /// Removes the entry at `key` and returns its current value. Missing
    /// entries are not an error.
    pub fn delete(&mut self, key: impl Into<Key>) -> Result<Option<Value>, ProduceError> {
        self.store.delete(self.node, &key.into())
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<(), ProduceError> {
        self.store.clear(self.node)
    }

    /// Drafts the container at `key`.
    pub fn child(&mut self, key: impl Into<Key>) -> Result<DraftMut<'_>, ProduceError> {
        let node = self.store.child(self.node, &key.into())?;
        Ok(DraftMut { store: &mut *self.store, node })
    }

    /// Like [`DraftMut::child`], consuming this cursor.
    pub fn into_child(self, key: impl Into<Key>) -> Result<DraftMut<'a>, ProduceError> {
        let node = self.store.child(self.node, &key.into())?;
        Ok(DraftMut { store: self.store, node })
    }

    /// Follows `path`, drafting every container on the way.
    pub fn descend(self, path: &[Key]) -> Result<DraftMut<'a>, ProduceError> {
        path.iter().try_fold(self, |cur, key| cur.into_child(key.clone()))
    }

    pub fn reborrow(&mut self) -> DraftMut<'_> {
        DraftMut { store: &mut *self.store, node: self.node }
    }

    pub fn handle(&self) -> DraftHandle {
        DraftHandle { session: self.store.session(), node: self.node }
    }

    /// Moves to a node previously seen in this invocation.
    pub fn at(&mut self, handle: DraftHandle) -> Result<DraftMut<'_>, ProduceError> {
        let node = resolve(self.store, handle)?;
        Ok(DraftMut { store: &mut *self.store, node })
    }

    /// `true` once this node or anything below it was written.
    pub fn is_modified(&self) -> bool {
        self.store.is_modified(self.node)
    }

    /// The container this draft was created from.
    pub fn original(&self) -> Value {
        self.store.original(self.node)
    }

    /// An independent value equal to this draft now. Not frozen.
    pub fn current(&self) -> Value {
        self.store.snapshot(self.node)
    }

    /// Pre-mutation value at `key` if that position is drafted, `None`
    /// for a plain value.
    pub fn original_at(&self, key: impl Into<Key>) -> Option<Value> {
        self.store.original_at(self.node, &key.into())
    }

    /// Same as [`DraftMut::get`]: a snapshot at drafted positions, the
    /// stored value elsewhere.
    pub fn current_at(&self, key: impl Into<Key>) -> Option<Value> {
        self.get(key)
    }

    fn expect_kind(&self, kind: Kind) -> Result<(), ProduceError> {
        match self.kind() {
            k if k == kind => Ok(()),
            found => Err(ProduceError::invalid(format!("expected a {kind}, found a {found}"))),
        }
    }

    pub fn as_record(&mut self) -> Result<RecordDraft<'_>, ProduceError> {
        self.reborrow().into_record()
    }

    pub fn as_seq(&mut self) -> Result<SeqDraft<'_>, ProduceError> {
        self.reborrow().into_seq()
    }

    pub fn as_map(&mut self) -> Result<MapDraft<'_>, ProduceError> {
        self.reborrow().into_map()
    }

    pub fn as_set(&mut self) -> Result<SetDraft<'_>, ProduceError> {
        self.reborrow().into_set()
    }

    pub fn into_record(self) -> Result<RecordDraft<'a>, ProduceError> {
        self.expect_kind(Kind::Record)?;
        Ok(RecordDraft(self))
    }

    pub fn into_seq(self) -> Result<SeqDraft<'a>, ProduceError> {
        self.expect_kind(Kind::Sequence)?;
        Ok(SeqDraft(self))
    }

    pub fn into_map(self) -> Result<MapDraft<'a>, ProduceError> {
        self.expect_kind(Kind::OrderedMap)?;
        Ok(MapDraft(self))
    }

    pub fn into_set(self) -> Result<SetDraft<'a>, ProduceError> {
        self.expect_kind(Kind::OrderedSet)?;
        Ok(SetDraft(self))
    }

    pub fn record_at(&mut self, key: impl Into<Key>) -> Result<RecordDraft<'_>, ProduceError> {
        self.child(key)?.into_record()
    }

    pub fn seq_at(&mut self, key: impl Into<Key>) -> Result<SeqDraft<'_>, ProduceError> {
        self.child(key)?.into_seq()
    }

    pub fn map_at(&mut self, key: impl Into<Key>) -> Result<MapDraft<'_>, ProduceError> {
        self.child(key)?.into_map()
    }

    pub fn set_at(&mut self, key: impl Into<Key>) -> Result<SetDraft<'_>, ProduceError> {
        self.child(key)?.into_set()
    }
}

fn resolve(store: &DraftStore, handle: DraftHandle) -> Result<NodeId, ProduceError> {
    if handle.session != store.session() || !store.contains(handle.node) {
        return Err(ProduceError::StaleDraft);
    }
    Ok(handle.node)
}

macro_rules! view {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'a>(DraftMut<'a>);

        impl<'a> Deref for $name<'a> {
            type Target = DraftMut<'a>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<'a> DerefMut for $name<'a> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl<'a> From<$name<'a>> for DraftMut<'a> {
            fn from(view: $name<'a>) -> Self {
                view.0
            }
        }
    };
}

view!(
    /// Draft of a record.
    RecordDraft
);
view!(
    /// Draft of a sequence.
    SeqDraft
);
view!(
    /// Draft of an ordered map. Keys may be any value.
    MapDraft
);
view!(
    /// Draft of an ordered set. Members are plain values and are never
    /// drafted themselves.
    SetDraft
);

impl RecordDraft<'_> {
    /// Applies `f` to the current value of `field` and stores the result.
    pub fn update<F>(&mut self, field: &str, f: F) -> Result<(), ProduceError>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let next = f(self.get(field));
        self.set(field, next)
    }
}

impl SeqDraft<'_> {
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), ProduceError> {
        let (node, len) = (self.0.node, self.len());
        self.0.store.seq_insert(node, len, value.into())
    }

    pub fn pop(&mut self) -> Result<Option<Value>, ProduceError> {
        match self.len() {
            0 => Ok(None),
            len => self.remove(len - 1).map(Some),
        }
    }

    /// Inserts before `index`, shifting later elements.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), ProduceError> {
        self.0.store.seq_insert(self.0.node, index, value.into())
    }

    /// Removes the element at `index`, shifting later elements back.
    pub fn remove(&mut self, index: usize) -> Result<Value, ProduceError> {
        self.0.store.seq_remove(self.0.node, index)
    }

    pub fn truncate(&mut self, len: usize) -> Result<(), ProduceError> {
        self.0.store.seq_truncate(self.0.node, len)
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), ProduceError> {
        self.0.store.seq_swap(self.0.node, a, b)
    }

    /// Moves the element at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ProduceError> {
        self.0.store.seq_move(self.0.node, from, to)
    }

    /// Index of the first element equal to `value`.
    pub fn position(&self, value: &Value) -> Option<usize> {
        self.values().iter().position(|v| v == value)
    }
}

impl MapDraft<'_> {
    /// Inserts or overwrites an entry. New keys go last.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<(), ProduceError> {
        self.set(Key::Entry(key.into()), value)
    }

    pub fn remove(&mut self, key: impl Into<Value>) -> Result<Option<Value>, ProduceError> {
        self.delete(Key::Entry(key.into()))
    }

    pub fn entry(&mut self, key: impl Into<Value>) -> Result<DraftMut<'_>, ProduceError> {
        self.child(Key::Entry(key.into()))
    }
}

impl SetDraft<'_> {
    pub fn contains(&self, member: impl Into<Value>) -> bool {
        self.0.store.set_contains(self.0.node, &member.into())
    }

    /// Adds `member` at the end. Returns `false` if it was already present.
    pub fn add(&mut self, member: impl Into<Value>) -> Result<bool, ProduceError> {
        self.0.store.set_add(self.0.node, member.into())
    }

    /// Inserts `member` at `index`. Returns `false` if it was already present.
    pub fn insert(&mut self, index: usize, member: impl Into<Value>) -> Result<bool, ProduceError> {
        self.0.store.set_insert(self.0.node, index, member.into())
    }

    /// Returns `false` if `member` was absent.
    pub fn remove(&mut self, member: impl Into<Value>) -> Result<bool, ProduceError> {
        self.0.store.set_remove(self.0.node, &member.into())
    }
}

// ── Manual lifecycle ──────────────────────────────────────────────────────

/// A draft whose lifetime the caller controls, from
/// [`create_draft`](crate::create_draft) until [`Draft::finish`].
///
/// Once finished, every access reports [`ProduceError::StaleDraft`].
#[derive(Debug)]
pub struct Draft {
    store: Option<DraftStore>,
}

impl Draft {
    pub(crate) fn new(store: DraftStore) -> Self {
        Self { store: Some(store) }
    }

    fn store(&mut self) -> Result<&mut DraftStore, ProduceError> {
        self.store.as_mut().ok_or(ProduceError::StaleDraft)
    }

    /// Cursor at the root container.
    pub fn root(&mut self) -> Result<DraftMut<'_>, ProduceError> {
        self.store().map(DraftMut::root)
    }

    pub fn at(&mut self, handle: DraftHandle) -> Result<DraftMut<'_>, ProduceError> {
        let store = self.store()?;
        let node = resolve(store, handle)?;
        Ok(DraftMut { store, node })
    }

    pub fn original(&mut self, handle: DraftHandle) -> Result<Value, ProduceError> {
        Ok(self.at(handle)?.original())
    }

    pub fn current(&mut self, handle: DraftHandle) -> Result<Value, ProduceError> {
        Ok(self.at(handle)?.current())
    }

    pub fn is_finished(&self) -> bool {
        self.store.is_none()
    }

    /// Builds the result and disposes of the draft.
    pub fn finish(&mut self) -> Result<Value, ProduceError> {
        self.finish_with_patches().map(|(value, _, _)| value)
    }

    /// Builds the result with the patches recorded since creation. Patch
    /// lists are empty unless the draft came from
    /// [`Engine::create_draft_with_patches`](crate::Engine::create_draft_with_patches).
    pub fn finish_with_patches(&mut self) -> Result<(Value, Vec<Patch>, Vec<Patch>), ProduceError> {
        let store = self.store.take().ok_or(ProduceError::StaleDraft)?;
        let done = store.finalize();
        Ok((done.value, done.patches, done.inverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn draft(doc: serde_json::Value) -> Draft {
        Draft::new(DraftStore::new(&Value::from(doc), Config::default(), true).unwrap())
    }

    #[test]
    fn views_check_kind() {
        let mut d = draft(json!({"list": [1], "obj": {}}));
        let mut root = d.root().unwrap();
        assert!(root.seq_at("list").is_ok());
        assert!(matches!(root.seq_at("obj"), Err(ProduceError::InvalidMutation(_))));
        assert!(root.as_record().is_ok());
    }

    #[test]
    fn handles_come_back_to_the_same_node() {
        let mut d = draft(json!({"a": {"b": {"c": 1}}}));
        let mut root = d.root().unwrap();
        let handle = root.child("a").unwrap().child("b").unwrap().handle();
        root.at(handle).unwrap().set("c", 2).unwrap();
        assert_eq!(root.current(), Value::from(json!({"a": {"b": {"c": 2}}})));
    }

    #[test]
    fn handle_from_another_draft_is_stale() {
        let mut first = draft(json!({"a": {}}));
        let mut second = draft(json!({"a": {}}));
        let handle = first.root().unwrap().child("a").unwrap().handle();
        assert_eq!(second.at(handle).unwrap_err(), ProduceError::StaleDraft);
    }

    #[test]
    fn finished_draft_is_stale() {
        let mut d = draft(json!({"a": 1}));
        let handle = d.root().unwrap().handle();
        d.root().unwrap().set("a", 2).unwrap();
        assert_eq!(d.finish().unwrap(), Value::from(json!({"a": 2})));
        assert!(d.is_finished());
        assert_eq!(d.finish().unwrap_err(), ProduceError::StaleDraft);
        assert_eq!(d.root().unwrap_err(), ProduceError::StaleDraft);
        assert_eq!(d.original(handle).unwrap_err(), ProduceError::StaleDraft);
    }

    #[test]
    fn sequence_operations() {
        let mut d = draft(json!([1, 2, 3]));
        let mut seq = d.root().unwrap().into_seq().unwrap();
        seq.push(4).unwrap();
        assert_eq!(seq.pop().unwrap(), Some(Value::from(4)));
        seq.insert(0, 0).unwrap();
        seq.swap(0, 3).unwrap();
        seq.move_item(0, 1).unwrap();
        assert_eq!(seq.remove(0).unwrap(), Value::from(1));
        assert_eq!(seq.position(&Value::from(0)), Some(2));
        assert!(seq.insert(9, 1).is_err());
        seq.truncate(1).unwrap();
        assert_eq!(seq.current(), Value::from(json!([3])));
    }

    #[test]
    fn original_and_current_at() {
        let mut d = draft(json!({"user": {"name": "a"}, "n": 1}));
        let mut root = d.root().unwrap();
        root.record_at("user").unwrap().set("name", "b").unwrap();
        assert_eq!(root.original_at("user"), Some(Value::from(json!({"name": "a"}))));
        assert_eq!(root.current_at("user"), Some(Value::from(json!({"name": "b"}))));
        assert_eq!(root.original_at("n"), None);
        assert_eq!(root.current_at("n"), Some(Value::from(1)));
        assert_eq!(root.current_at("missing"), None);
    }

    #[test]
    fn record_update() {
        let mut d = draft(json!({"count": 1}));
        let mut rec = d.root().unwrap().into_record().unwrap();
        rec.update("count", |v| Value::from(v.and_then(|v| v.as_i64()).unwrap_or(0) + 1)).unwrap();
        assert_eq!(rec.get("count"), Some(Value::from(2)));
    }
}
