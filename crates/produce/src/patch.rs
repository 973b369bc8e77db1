//! Patches and the recorder that collects them during a draft session.

use produce_value::{Path, Value};

/// One elementary edit.
///
/// `add` on a sequence position inserts (shifting later elements), `remove`
/// on a sequence position shifts them back. For ordered-set paths the last
/// step is the member's position and `Remove` carries the member itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    Add { path: Path, value: Value },
    Remove { path: Path, value: Option<Value> },
    Replace { path: Path, value: Value },
}

impl Patch {
    pub fn op_name(&self) -> &'static str {
        match self {
            Patch::Add { .. } => "add",
            Patch::Remove { .. } => "remove",
            Patch::Replace { .. } => "replace",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Patch::Add { path, .. } | Patch::Remove { path, .. } | Patch::Replace { path, .. } => path,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Patch::Add { value, .. } | Patch::Replace { value, .. } => Some(value),
            Patch::Remove { value, .. } => value.as_ref(),
        }
    }

    /// The path as an RFC 6901 JSON Pointer.
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for key in self.path() {
            out.push('/');
            out.push_str(&key.to_string().replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

// ── Recorder ──────────────────────────────────────────────────────────────

/// Collects forward and inverse patches for one draft session.
///
/// An inactive recorder drops everything handed to it; callers check
/// [`PatchRecorder::is_active`] before computing patch values.
#[derive(Debug, Default)]
pub(crate) struct PatchRecorder {
    active: bool,
    patches: Vec<Patch>,
    inverse: Vec<Patch>,
}

impl PatchRecorder {
    pub(crate) fn new(active: bool) -> Self {
        Self {
            active,
            ..Self::default()
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn record(&mut self, forward: Patch, inverse: Patch) {
        if self.active {
            self.patches.push(forward);
            self.inverse.push(inverse);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.patches.len()
    }

    /// Forward patches in the order they happened, inverse patches newest
    /// first so that applying them in order undoes the session.
    pub(crate) fn finish(self) -> (Vec<Patch>, Vec<Patch>) {
        let mut inverse = self.inverse;
        inverse.reverse();
        (self.patches, inverse)
    }
}
