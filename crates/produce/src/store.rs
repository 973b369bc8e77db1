//! Draft state store: the arena behind one producer invocation.
//!
//! Every drafted container is a [`Node`] in a flat arena, addressed by its
//! index. Parent links are `(index, key)` pairs rather than pointers, and a
//! node may have several of them when the same base container is reachable
//! from more than one position.
//!
//! A node's working copy is created lazily from its base container, holding
//! either raw values (shared with the base) or the index of a child node.
//! Finalization walks the arena from the root and rebuilds only the nodes
//! that were modified or have a modified descendant.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use produce_value::{Key, Kind, Path, Value};
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::ProduceError;
use crate::patch::{Patch, PatchRecorder};

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Draft(NodeId),
}

impl Slot {
    fn draft(&self) -> Option<NodeId> {
        match self {
            Slot::Draft(c) => Some(*c),
            Slot::Value(_) => None,
        }
    }
}

#[derive(Debug)]
enum Working {
    Record(IndexMap<String, Slot>),
    Seq(Vec<Slot>),
    Map(IndexMap<Value, Slot>),
    Set(IndexSet<Value>),
}

impl Working {
    fn from_base(base: &Value) -> Working {
        match base {
            Value::Seq(s) => Working::Seq(s.iter().cloned().map(Slot::Value).collect()),
            Value::Map(m) => Working::Map(m.iter().map(|(k, v)| (k.clone(), Slot::Value(v.clone()))).collect()),
            Value::Set(s) => Working::Set(s.data().clone()),
            Value::Record(r) => Working::Record(r.iter().map(|(k, v)| (k.clone(), Slot::Value(v.clone()))).collect()),
            // Leaves are never wrapped.
            _ => Working::Record(IndexMap::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Working::Record(m) => m.len(),
            Working::Seq(v) => v.len(),
            Working::Map(m) => m.len(),
            Working::Set(s) => s.len(),
        }
    }

    /// Slot at a normalized key.
    fn slot(&self, key: &Key) -> Option<Slot> {
        match (self, key) {
            (Working::Record(m), Key::Field(f)) => m.get(f).cloned(),
            (Working::Seq(v), Key::Index(i)) => v.get(*i).cloned(),
            (Working::Map(m), Key::Entry(k)) => m.get(k).cloned(),
            (Working::Set(s), Key::Index(i)) => s.get_index(*i).cloned().map(Slot::Value),
            _ => None,
        }
    }

    fn drafts(&self) -> Vec<NodeId> {
        match self {
            Working::Record(m) => m.values().filter_map(Slot::draft).collect(),
            Working::Seq(v) => v.iter().filter_map(Slot::draft).collect(),
            Working::Map(m) => m.values().filter_map(Slot::draft).collect(),
            Working::Set(_) => Vec::new(),
        }
    }

    /// Overwrites an existing slot without moving it.
    fn put(&mut self, key: &Key, slot: Slot) {
        let target = match (self, key) {
            (Working::Record(m), Key::Field(f)) => m.get_mut(f),
            (Working::Seq(v), Key::Index(i)) => v.get_mut(*i),
            (Working::Map(m), Key::Entry(k)) => m.get_mut(k),
            _ => None,
        };
        if let Some(target) = target {
            *target = slot;
        }
    }
}

#[derive(Debug)]
struct Node {
    base: Value,
    kind: Kind,
    copy: Option<Working>,
    /// Written to directly.
    modified: bool,
    /// A descendant was written to.
    touched: bool,
    parents: Vec<(NodeId, Key)>,
}

impl Node {
    fn new(base: Value, kind: Kind, parent: Option<(NodeId, Key)>) -> Self {
        Self {
            base,
            kind,
            copy: None,
            modified: false,
            touched: false,
            parents: parent.into_iter().collect(),
        }
    }

    fn changed(&self) -> bool {
        self.modified || self.touched
    }
}

/// Arena of draft nodes for one producer invocation.
#[derive(Debug)]
pub(crate) struct DraftStore {
    session: u64,
    config: Config,
    nodes: Vec<Node>,
    /// Draft of each base container, when drafts are shared.
    by_base: Option<HashMap<usize, NodeId>>,
    recorder: PatchRecorder,
}

/// Result of finalizing a store.
pub(crate) struct Finished {
    pub(crate) value: Value,
    pub(crate) patches: Vec<Patch>,
    pub(crate) inverse: Vec<Patch>,
}

impl DraftStore {
    pub(crate) fn new(base: &Value, config: Config, record_patches: bool) -> Result<Self, ProduceError> {
        let kind = config.classify(base);
        if !kind.is_container() {
            return Err(ProduceError::invalid(format!(
                "cannot draft a {} value",
                describe(base, &config)
            )));
        }
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let by_base = base.addr().map(|addr| HashMap::from([(addr, ROOT)]));
        trace!(session, %kind, "draft session opened");
        Ok(Self {
            session,
            config,
            nodes: vec![Node::new(base.clone(), kind, None)],
            by_base,
            recorder: PatchRecorder::new(record_patches),
        })
    }

    /// Drafts every position separately, even where the base holds the
    /// same container twice. Patch replay addresses positions, not containers.
    pub(crate) fn unshared(mut self) -> Self {
        self.by_base = None;
        self
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub(crate) fn kind(&self, id: NodeId) -> Kind {
        self.nodes[id].kind
    }

    pub(crate) fn is_modified(&self, id: NodeId) -> bool {
        self.nodes[id].changed()
    }

    pub(crate) fn original(&self, id: NodeId) -> Value {
        self.nodes[id].base.clone()
    }

    pub(crate) fn len(&self, id: NodeId) -> usize {
        let node = &self.nodes[id];
        match &node.copy {
            Some(w) => w.len(),
            None => node.base.len().unwrap_or(0),
        }
    }

    /// Every addressable key, in order.
    pub(crate) fn keys(&self, id: NodeId) -> Vec<Key> {
        let node = &self.nodes[id];
        match (&node.copy, &node.base) {
            (Some(Working::Record(m)), _) => m.keys().cloned().map(Key::Field).collect(),
            (Some(Working::Map(m)), _) => m.keys().cloned().map(Key::Entry).collect(),
            (Some(w), _) => (0..w.len()).map(Key::Index).collect(),
            (None, Value::Record(r)) => r.keys().cloned().map(Key::Field).collect(),
            (None, Value::Map(m)) => m.keys().cloned().map(Key::Entry).collect(),
            (None, base) => (0..base.len().unwrap_or(0)).map(Key::Index).collect(),
        }
    }

    /// Rewrites `key` into the form the container at `id` is addressed by.
    pub(crate) fn normalize(&self, id: NodeId, key: &Key) -> Result<Key, ProduceError> {
        let kind = self.kind(id);
        let normalized = match kind {
            Kind::Record => key.as_field().map(|f| Key::Field(f.into_owned())),
            Kind::Sequence | Kind::OrderedSet => key.as_index().map(Key::Index),
            Kind::OrderedMap => Some(Key::Entry(key.to_map_key())),
            Kind::Leaf => None,
        };
        normalized.ok_or_else(|| ProduceError::invalid(format!("{key:?} does not address a {kind}")))
    }

    fn slot(&self, id: NodeId, key: &Key) -> Option<Slot> {
        let node = &self.nodes[id];
        match &node.copy {
            Some(w) => w.slot(key),
            None => node.base.get(key).cloned().map(Slot::Value),
        }
    }

    /// Value at a slot as the patch stream has it. A position that still
    /// holds a drafted container keeps the base until it is linked.
    fn resolve(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Value(v) => v.clone(),
            Slot::Draft(c) => self.recorded(*c),
        }
    }

    /// Value at a slot of `id` as the recipe sees it. A position holding the
    /// base of a changed draft shows that draft.
    fn read(&self, id: NodeId, slot: &Slot) -> Value {
        match slot {
            Slot::Draft(c) => self.snapshot(*c),
            Slot::Value(v) => match self.alias(v) {
                Some(d) if !self.reaches(d, id) => self.snapshot(d),
                _ => v.clone(),
            },
        }
    }

    /// Current value at a position; drafts are snapshotted.
    pub(crate) fn get(&self, id: NodeId, key: &Key) -> Option<Value> {
        let key = self.normalize(id, key).ok()?;
        self.slot(id, &key).map(|s| self.read(id, &s))
    }

    /// Pre-mutation value at a position, only if that position is drafted.
    pub(crate) fn original_at(&self, id: NodeId, key: &Key) -> Option<Value> {
        let key = self.normalize(id, key).ok()?;
        match self.slot(id, &key)? {
            Slot::Draft(c) => Some(self.original(c)),
            Slot::Value(_) => None,
        }
    }

    fn working(&mut self, id: NodeId) -> &mut Working {
        let node = &mut self.nodes[id];
        node.copy.get_or_insert_with(|| Working::from_base(&node.base))
    }

    fn seq_slots(&mut self, id: NodeId) -> Result<&mut Vec<Slot>, ProduceError> {
        match self.working(id) {
            Working::Seq(v) => Ok(v),
            _ => Err(ProduceError::invalid("not a sequence")),
        }
    }

    fn set_members(&mut self, id: NodeId) -> Result<&mut IndexSet<Value>, ProduceError> {
        match self.working(id) {
            Working::Set(s) => Ok(s),
            _ => Err(ProduceError::invalid("not a set")),
        }
    }

    // ── Wrapping ──────────────────────────────────────────────────────────

    /// Drafts the container at `key`, reusing the existing draft if there is one.
    pub(crate) fn child(&mut self, id: NodeId, key: &Key) -> Result<NodeId, ProduceError> {
        let key = self.normalize(id, key)?;
        if self.kind(id) == Kind::OrderedSet {
            return Err(ProduceError::invalid("set members are values and cannot be drafted"));
        }
        let slot = self
            .working(id)
            .slot(&key)
            .ok_or_else(|| ProduceError::invalid(format!("nothing to draft at {key:?}")))?;
        match slot {
            Slot::Draft(c) => Ok(c),
            Slot::Value(value) => {
                if !self.config.classify(&value).is_container() {
                    return Err(ProduceError::invalid(format!(
                        "value at {key:?} is a {} and cannot be drafted",
                        describe(&value, &self.config)
                    )));
                }
                let c = self.wrap(value, id, key.clone());
                self.working(id).put(&key, Slot::Draft(c));
                Ok(c)
            }
        }
    }

    fn wrap(&mut self, base: Value, parent: NodeId, key: Key) -> NodeId {
        let addr = base.addr();
        let shared = match (&self.by_base, addr) {
            (Some(by_base), Some(addr)) => by_base.get(&addr).copied(),
            _ => None,
        };
        if let Some(existing) = shared {
            // Sharing a draft with one of its own ancestors would make the tree cyclic.
            if !self.reaches(existing, parent) {
                self.link(existing, parent, key);
                return existing;
            }
        }
        let id = self.nodes.len();
        let kind = self.config.classify(&base);
        self.nodes.push(Node::new(base, kind, Some((parent, key))));
        if let (Some(by_base), Some(addr)) = (&mut self.by_base, addr) {
            by_base.entry(addr).or_insert(id);
        }
        trace!(session = self.session, node = id, parent, %kind, "drafted container");
        id
    }

    /// `true` if `from` is `to` or one of its ancestors.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![to];
        while let Some(n) = stack.pop() {
            if n == from {
                return true;
            }
            stack.extend(self.nodes[n].parents.iter().map(|(p, _)| *p));
        }
        false
    }

    fn link(&mut self, id: NodeId, parent: NodeId, key: Key) {
        let link = (parent, key);
        if self.nodes[id].parents.contains(&link) {
            return;
        }
        let (parent, key) = link;
        self.nodes[id].parents.push((parent, key.clone()));
        if !self.nodes[id].changed() {
            return;
        }
        self.mark_touched(parent);
        if self.recorder.is_active() {
            // The new position still shows the base in the patch stream.
            let snapshot = self.recorded(id);
            let base = self.original(id);
            self.emit(parent, &key, |path| {
                (
                    Patch::Replace { path: path.clone(), value: snapshot.clone() },
                    Patch::Replace { path, value: base.clone() },
                )
            });
        }
    }

    fn detach(&mut self, slot: &Slot, parent: NodeId, key: &Key) {
        if let Slot::Draft(c) = slot {
            self.nodes[*c].parents.retain(|(p, k)| !(*p == parent && k == key));
        }
    }

    /// Re-keys the draft children of a sequence after the elements from
    /// `from` onward shifted. Positions before `from` keep their links.
    fn reindex(&mut self, id: NodeId, from: usize) {
        let children: Vec<(usize, NodeId)> = match &self.nodes[id].copy {
            Some(Working::Seq(v)) => v
                .get(from..)
                .unwrap_or_default()
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.draft().map(|c| (from + i, c)))
                .collect(),
            _ => return,
        };
        let shifted = |(p, k): &(NodeId, Key)| *p == id && k.as_index().is_some_and(|i| i >= from);
        for (_, c) in &children {
            self.nodes[*c].parents.retain(|link| !shifted(link));
        }
        for (i, c) in children {
            self.nodes[c].parents.push((id, Key::Index(i)));
        }
    }

    // ── Change tracking ───────────────────────────────────────────────────

    fn mark_changed(&mut self, id: NodeId) {
        self.nodes[id].modified = true;
        let parents: Vec<NodeId> = self.nodes[id].parents.iter().map(|(p, _)| *p).collect();
        parents.into_iter().for_each(|p| self.mark_touched(p));
    }

    fn mark_touched(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = &mut self.nodes[n];
            if node.touched {
                continue;
            }
            node.touched = true;
            stack.extend(node.parents.iter().map(|(p, _)| *p));
        }
    }

    /// Every path from the root to `id`. Detached drafts have none.
    fn paths(&self, id: NodeId) -> Vec<Path> {
        if id == ROOT {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for (parent, key) in &self.nodes[id].parents {
            for mut path in self.paths(*parent) {
                path.push(key.clone());
                out.push(path);
            }
        }
        out
    }

    /// Records one forward/inverse pair per path leading to `key` under `id`.
    fn emit(&mut self, id: NodeId, key: &Key, patch: impl Fn(Path) -> (Patch, Patch)) {
        if !self.recorder.is_active() {
            return;
        }
        for mut path in self.paths(id) {
            path.push(key.clone());
            let (forward, inverse) = patch(path);
            self.recorder.record(forward, inverse);
        }
    }

    // ── Records and maps ──────────────────────────────────────────────────

    /// Writes a record field, map entry or sequence element.
    pub(crate) fn set(&mut self, id: NodeId, key: &Key, value: Value) -> Result<(), ProduceError> {
        let key = self.normalize(id, key)?;
        match (self.kind(id), key) {
            (Kind::Sequence, Key::Index(i)) => self.seq_set(id, i, value),
            (Kind::Record | Kind::OrderedMap, key) => self.assign(id, key, value),
            (kind, _) => Err(ProduceError::invalid(format!("cannot assign by key in a {kind}"))),
        }
    }

    fn assign(&mut self, id: NodeId, key: Key, value: Value) -> Result<(), ProduceError> {
        let prev = self.working(id).slot(&key);
        if let Some(prev) = &prev {
            if self.is_same(prev, &value) {
                return Ok(());
            }
        }
        let previous = match (&prev, self.recorder.is_active()) {
            (Some(slot), true) => Some(self.resolve(slot)),
            _ => None,
        };
        if let Some(prev) = &prev {
            self.detach(prev, id, &key);
        }
        match (self.working(id), &key) {
            (Working::Record(m), Key::Field(f)) => {
                m.insert(f.clone(), Slot::Value(value.clone()));
            }
            (Working::Map(m), Key::Entry(k)) => {
                m.insert(k.clone(), Slot::Value(value.clone()));
            }
            _ => return Err(ProduceError::invalid(format!("{key:?} is not assignable"))),
        }
        self.mark_changed(id);
        self.emit(id, &key, |path| match &previous {
            Some(old) => (
                Patch::Replace { path: path.clone(), value: value.clone() },
                Patch::Replace { path, value: old.clone() },
            ),
            None => (
                Patch::Add { path: path.clone(), value: value.clone() },
                Patch::Remove { path, value: None },
            ),
        });
        Ok(())
    }

    /// Deletes a record field, map entry, sequence element or set member.
    pub(crate) fn delete(&mut self, id: NodeId, key: &Key) -> Result<Option<Value>, ProduceError> {
        if let (Kind::OrderedSet, Key::Entry(member)) = (self.kind(id), key) {
            let member = member.clone();
            return Ok(self.set_remove(id, &member)?.then_some(member));
        }
        let key = self.normalize(id, key)?;
        match (self.kind(id), key) {
            (Kind::Sequence, Key::Index(i)) => {
                if i >= self.len(id) {
                    return Ok(None);
                }
                self.seq_remove(id, i).map(Some)
            }
            (Kind::OrderedSet, key) => match self.slot(id, &key) {
                Some(Slot::Value(member)) => {
                    self.set_remove(id, &member)?;
                    Ok(Some(member))
                }
                _ => Ok(None),
            },
            (_, key) => self.unassign(id, key),
        }
    }

    fn unassign(&mut self, id: NodeId, key: Key) -> Result<Option<Value>, ProduceError> {
        let Some(prev) = self.working(id).slot(&key) else {
            return Ok(None);
        };
        let shown = self.read(id, &prev);
        let old = self.recorder.is_active().then(|| self.resolve(&prev));
        self.detach(&prev, id, &key);
        match (self.working(id), &key) {
            (Working::Record(m), Key::Field(f)) => {
                m.shift_remove(f);
            }
            (Working::Map(m), Key::Entry(k)) => {
                m.shift_remove(k);
            }
            _ => return Err(ProduceError::invalid(format!("{key:?} is not removable"))),
        }
        self.mark_changed(id);
        self.emit(id, &key, |path| {
            (
                Patch::Remove { path: path.clone(), value: None },
                Patch::Add { path, value: old.clone().unwrap_or(Value::Null) },
            )
        });
        Ok(Some(shown))
    }

    /// Removes every entry of a record, map, sequence or set, front to back.
    pub(crate) fn clear(&mut self, id: NodeId) -> Result<(), ProduceError> {
        match self.kind(id) {
            Kind::Sequence => self.seq_truncate(id, 0),
            Kind::OrderedSet => {
                while let Some(member) = self.set_members(id)?.first().cloned() {
                    self.set_remove(id, &member)?;
                }
                Ok(())
            }
            _ => {
                for key in self.keys(id) {
                    self.unassign(id, key)?;
                }
                Ok(())
            }
        }
    }

    fn is_same(&self, slot: &Slot, value: &Value) -> bool {
        match slot {
            Slot::Value(v) => v.same(value),
            // Writing a draft's own untouched base back is a no-op.
            Slot::Draft(c) => !self.nodes[*c].changed() && self.nodes[*c].base.same(value),
        }
    }

    // ── Sequences ─────────────────────────────────────────────────────────

    fn out_of_range(index: usize, len: usize) -> ProduceError {
        ProduceError::invalid(format!("index {index} out of range for sequence of length {len}"))
    }

    pub(crate) fn seq_set(&mut self, id: NodeId, index: usize, value: Value) -> Result<(), ProduceError> {
        let len = self.len(id);
        if index == len {
            return self.seq_insert(id, index, value);
        }
        if index > len {
            return Err(Self::out_of_range(index, len));
        }
        let key = Key::Index(index);
        let prev = self.seq_slots(id)?[index].clone();
        if self.is_same(&prev, &value) {
            return Ok(());
        }
        let previous = self.recorder.is_active().then(|| self.resolve(&prev));
        self.detach(&prev, id, &key);
        self.seq_slots(id)?[index] = Slot::Value(value.clone());
        self.mark_changed(id);
        self.emit(id, &key, |path| {
            (
                Patch::Replace { path: path.clone(), value: value.clone() },
                Patch::Replace { path, value: previous.clone().unwrap_or(Value::Null) },
            )
        });
        Ok(())
    }

    pub(crate) fn seq_insert(&mut self, id: NodeId, index: usize, value: Value) -> Result<(), ProduceError> {
        let slots = self.seq_slots(id)?;
        if index > slots.len() {
            return Err(Self::out_of_range(index, slots.len()));
        }
        slots.insert(index, Slot::Value(value.clone()));
        self.reindex(id, index);
        self.mark_changed(id);
        self.emit(id, &Key::Index(index), |path| {
            (
                Patch::Add { path: path.clone(), value: value.clone() },
                Patch::Remove { path, value: None },
            )
        });
        Ok(())
    }

    pub(crate) fn seq_remove(&mut self, id: NodeId, index: usize) -> Result<Value, ProduceError> {
        let slots = self.seq_slots(id)?;
        if index >= slots.len() {
            return Err(Self::out_of_range(index, slots.len()));
        }
        let slot = slots.remove(index);
        let key = Key::Index(index);
        let shown = self.read(id, &slot);
        let old = self.recorder.is_active().then(|| self.resolve(&slot));
        self.detach(&slot, id, &key);
        self.reindex(id, index);
        self.mark_changed(id);
        self.emit(id, &key, |path| {
            (
                Patch::Remove { path: path.clone(), value: None },
                Patch::Add { path, value: old.clone().unwrap_or(Value::Null) },
            )
        });
        Ok(shown)
    }

    /// Removes trailing elements, last first, until `len` remain.
    pub(crate) fn seq_truncate(&mut self, id: NodeId, len: usize) -> Result<(), ProduceError> {
        while self.len(id) > len {
            self.seq_remove(id, self.len(id) - 1)?;
        }
        Ok(())
    }

    pub(crate) fn seq_swap(&mut self, id: NodeId, a: usize, b: usize) -> Result<(), ProduceError> {
        let recording = self.recorder.is_active();
        let slots = self.seq_slots(id)?;
        let len = slots.len();
        if a >= len || b >= len {
            return Err(Self::out_of_range(a.max(b), len));
        }
        if a == b {
            return Ok(());
        }
        if let (Slot::Value(x), Slot::Value(y)) = (&slots[a], &slots[b]) {
            if x.same(y) {
                return Ok(());
            }
        }
        slots.swap(a, b);
        let swapped = recording.then(|| (slots[a].clone(), slots[b].clone()));
        let values = swapped.map(|(now_a, now_b)| (self.resolve(&now_a), self.resolve(&now_b)));
        self.reindex(id, a.min(b));
        self.mark_changed(id);
        if let Some((now_a, now_b)) = values {
            self.emit(id, &Key::Index(a), |path| {
                (
                    Patch::Replace { path: path.clone(), value: now_a.clone() },
                    Patch::Replace { path, value: now_b.clone() },
                )
            });
            self.emit(id, &Key::Index(b), |path| {
                (
                    Patch::Replace { path: path.clone(), value: now_b.clone() },
                    Patch::Replace { path, value: now_a.clone() },
                )
            });
        }
        Ok(())
    }

    /// Moves one element, keeping its draft (if any) attached.
    pub(crate) fn seq_move(&mut self, id: NodeId, from: usize, to: usize) -> Result<(), ProduceError> {
        let slots = self.seq_slots(id)?;
        let len = slots.len();
        if from >= len || to >= len {
            return Err(Self::out_of_range(from.max(to), len));
        }
        if from == to {
            return Ok(());
        }
        let slot = slots.remove(from);
        slots.insert(to, slot.clone());
        self.reindex(id, from.min(to));
        self.mark_changed(id);
        if self.recorder.is_active() {
            let moved = self.resolve(&slot);
            self.emit(id, &Key::Index(from), |path| {
                (
                    Patch::Remove { path: path.clone(), value: None },
                    Patch::Add { path, value: moved.clone() },
                )
            });
            self.emit(id, &Key::Index(to), |path| {
                (
                    Patch::Add { path: path.clone(), value: moved.clone() },
                    Patch::Remove { path, value: None },
                )
            });
        }
        Ok(())
    }

    // ── Sets ──────────────────────────────────────────────────────────────

    pub(crate) fn set_contains(&self, id: NodeId, member: &Value) -> bool {
        let node = &self.nodes[id];
        match (&node.copy, &node.base) {
            (Some(Working::Set(s)), _) => s.contains(member),
            (None, Value::Set(s)) => s.contains(member),
            _ => false,
        }
    }

    pub(crate) fn set_add(&mut self, id: NodeId, member: Value) -> Result<bool, ProduceError> {
        let len = self.len(id);
        self.set_insert(id, len, member)
    }

    pub(crate) fn set_insert(&mut self, id: NodeId, position: usize, member: Value) -> Result<bool, ProduceError> {
        let members = self.set_members(id)?;
        if members.contains(&member) {
            return Ok(false);
        }
        if position > members.len() {
            return Err(ProduceError::invalid(format!(
                "position {position} out of range for set of size {}",
                members.len()
            )));
        }
        members.shift_insert(position, member.clone());
        self.mark_changed(id);
        self.emit(id, &Key::Index(position), |path| {
            (
                Patch::Add { path: path.clone(), value: member.clone() },
                Patch::Remove { path, value: Some(member.clone()) },
            )
        });
        Ok(true)
    }

    pub(crate) fn set_remove(&mut self, id: NodeId, member: &Value) -> Result<bool, ProduceError> {
        let members = self.set_members(id)?;
        let Some(position) = members.get_index_of(member) else {
            return Ok(false);
        };
        members.shift_remove_index(position);
        self.mark_changed(id);
        self.emit(id, &Key::Index(position), |path| {
            (
                Patch::Remove { path: path.clone(), value: Some(member.clone()) },
                Patch::Add { path, value: member.clone() },
            )
        });
        Ok(true)
    }

    // ── Shared containers ─────────────────────────────────────────────────

    /// The changed draft whose base is `value`, if any.
    fn alias(&self, value: &Value) -> Option<NodeId> {
        let node = *self.by_base.as_ref()?.get(&value.addr()?)?;
        self.nodes[node].changed().then_some(node)
    }

    /// Positions of `id` that hold the base of a changed draft but not the
    /// draft itself.
    fn aliases_in(&self, id: NodeId) -> Vec<(Key, NodeId)> {
        if self.by_base.is_none() || self.kind(id) == Kind::OrderedSet {
            return Vec::new();
        }
        self.keys(id)
            .into_iter()
            .filter_map(|key| match self.slot(id, &key)? {
                Slot::Value(v) => self.alias(&v).filter(|&d| d != id).map(|d| (key, d)),
                Slot::Draft(_) => None,
            })
            .collect()
    }

    /// Nodes attached to the root, parents before children.
    fn attached(&self) -> Vec<NodeId> {
        let mut seen = HashSet::from([ROOT]);
        let mut order = vec![ROOT];
        let mut next = 0;
        while let Some(&id) = order.get(next) {
            next += 1;
            if let Some(w) = &self.nodes[id].copy {
                for c in w.drafts() {
                    if seen.insert(c) {
                        order.push(c);
                    }
                }
            }
        }
        order
    }

    /// Links every attached position still holding a changed draft's base
    /// to that draft, so the result has one container where the base had
    /// one. Each link is recorded like a late `child`.
    fn link_aliases(&mut self) {
        if self.by_base.is_none() {
            return;
        }
        loop {
            let mut linked = 0;
            for id in self.attached() {
                for (key, d) in self.aliases_in(id) {
                    if self.reaches(d, id) {
                        continue;
                    }
                    self.working(id).put(&key, Slot::Draft(d));
                    self.link(d, id, key);
                    linked += 1;
                }
            }
            if linked == 0 {
                break;
            }
            trace!(session = self.session, linked, "linked shared positions");
        }
    }

    // ── Finalization ──────────────────────────────────────────────────────

    /// Value of the subtree at `id` as of now. Nothing is frozen or consumed.
    pub(crate) fn snapshot(&self, id: NodeId) -> Value {
        self.build(id, &mut Build::new(true, false))
    }

    /// Same as [`DraftStore::snapshot`], but unlinked positions keep the
    /// base they had in the patch stream.
    fn recorded(&self, id: NodeId) -> Value {
        self.build(id, &mut Build::new(false, false))
    }

    fn build(&self, id: NodeId, b: &mut Build) -> Value {
        if let Some(done) = b.memo.get(&id) {
            return done.clone();
        }
        let node = &self.nodes[id];
        if b.open.contains(&id) {
            return node.base.clone();
        }
        let stale = b.aliases && !node.changed() && !self.aliases_in(id).is_empty();
        let value = if node.changed() || stale {
            b.open.push(id);
            let value = match &node.copy {
                Some(w) => self.rebuild(w, b),
                None => self.rebuild(&Working::from_base(&node.base), b),
            };
            b.open.pop();
            value
        } else {
            if b.freeze {
                node.base.freeze(true);
            }
            node.base.clone()
        };
        b.memo.insert(id, value.clone());
        value
    }

    fn rebuild(&self, w: &Working, b: &mut Build) -> Value {
        let value = match w {
            Working::Record(m) => {
                let mut out = IndexMap::with_capacity(m.len());
                for (k, slot) in m {
                    out.insert(k.clone(), self.finish_slot(slot, b));
                }
                Value::from(out)
            }
            Working::Seq(v) => {
                let mut out = Vec::with_capacity(v.len());
                for slot in v {
                    out.push(self.finish_slot(slot, b));
                }
                Value::from(out)
            }
            Working::Map(m) => {
                let mut out = IndexMap::with_capacity(m.len());
                for (k, slot) in m {
                    if b.freeze {
                        k.freeze(true);
                    }
                    out.insert(k.clone(), self.finish_slot(slot, b));
                }
                Value::from(out)
            }
            Working::Set(s) => {
                if b.freeze {
                    s.iter().for_each(|m| m.freeze(true));
                }
                Value::from(s.clone())
            }
        };
        if b.freeze {
            value.freeze(false);
        }
        value
    }

    fn finish_slot(&self, slot: &Slot, b: &mut Build) -> Value {
        match slot {
            Slot::Draft(c) => self.build(*c, b),
            Slot::Value(v) => {
                if b.aliases {
                    if let Some(d) = self.alias(v).filter(|d| !b.open.contains(d)) {
                        return self.build(d, b);
                    }
                }
                if b.freeze {
                    v.freeze(true);
                }
                v.clone()
            }
        }
    }

    /// Consumes the store and builds the result.
    pub(crate) fn finalize(mut self) -> Finished {
        self.link_aliases();
        let mut b = Build::new(false, self.config.auto_freeze);
        let value = self.build(ROOT, &mut b);
        let rebuilt = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.changed() && b.memo.contains_key(i))
            .count();
        debug!(
            session = self.session,
            drafted = self.nodes.len(),
            rebuilt,
            patches = self.recorder.len(),
            "draft finalized"
        );
        let (patches, inverse) = self.recorder.finish();
        Finished { value, patches, inverse }
    }
}

/// State of one walk that turns drafts into values.
struct Build {
    memo: HashMap<NodeId, Value>,
    /// Nodes being rebuilt; a position leading back to one keeps its base.
    open: Vec<NodeId>,
    /// Show positions holding a changed draft's base through that draft.
    aliases: bool,
    freeze: bool,
}

impl Build {
    fn new(aliases: bool, freeze: bool) -> Self {
        Self { memo: HashMap::new(), open: Vec::new(), aliases, freeze }
    }
}

fn describe(value: &Value, config: &Config) -> String {
    let kind = value.kind();
    if kind.is_collection() && !config.ordered_collections {
        format!("{kind} (ordered collection support is disabled)")
    } else {
        kind.to_string()
    }
}
