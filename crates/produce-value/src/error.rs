use thiserror::Error;

use crate::Kind;

/// Errors raised by direct (non-draft) mutation of a [`Value`](crate::Value).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The container was frozen, either by a finished draft or by `freeze`.
    #[error("cannot modify a frozen {0}")]
    Frozen(Kind),
    #[error("expected {expected}, found {found}")]
    KindMismatch { expected: Kind, found: Kind },
}
