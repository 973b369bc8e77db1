//! Container header shared by every non-leaf [`Value`](crate::Value).
//!
//! A container is always held behind an `Arc`, so the same allocation may be
//! reachable from many values at once. The freeze flag lives next to the data
//! and can be flipped through any of those handles, which is what makes
//! [`freeze`](crate::freeze) an in-place operation.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

/// Container payload plus its freeze flag.
///
/// Reading goes through `Deref`. Writing is only possible through
/// [`Value`](crate::Value)'s guarded `*_mut` accessors or through a draft.
pub struct Container<T> {
    data: T,
    frozen: AtomicBool,
}

impl<T> Container<T> {
    /// Wraps `data` in an unfrozen container.
    pub fn new(data: T) -> Self {
        Self {
            data,
            frozen: AtomicBool::new(false),
        }
    }

    /// Wraps `data` in a container that is frozen from the start.
    pub fn frozen(data: T) -> Self {
        Self {
            data,
            frozen: AtomicBool::new(true),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Marks the container immutable. Returns `true` if it was not frozen before.
    pub fn freeze(&self) -> bool {
        !self.frozen.swap(true, Ordering::AcqRel)
    }

    /// Mutable access that ignores the freeze flag.
    ///
    /// Callers must hold the only handle (see `Arc::make_mut`).
    pub(crate) fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T> Deref for Container<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

// A copy is a new, independently mutable container.
impl<T: Clone> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl<T: PartialEq> PartialEq for Container<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T: Eq> Eq for Container<T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.data.fmt(f)
    }
}
