use produce_value::{Kind, ValueError};
use thiserror::Error;

/// Errors raised by drafts and producers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProduceError {
    /// A mutation addressed something that cannot be drafted or changed:
    /// a leaf, a missing position, an out-of-range index, a container of
    /// the wrong kind.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),
    /// The draft's invocation has already finished, or the handle belongs to
    /// another invocation.
    #[error("draft is stale: its producer invocation has already finished")]
    StaleDraft,
    /// Direct mutation of a frozen container.
    #[error("cannot modify a frozen {0}")]
    Frozen(Kind),
    /// Business-rule failure raised by a recipe.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("patch recording is disabled in this engine's configuration")]
    PatchesDisabled,
}

impl ProduceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ProduceError::InvalidMutation(msg.into())
    }
}

impl From<ValueError> for ProduceError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Frozen(kind) => ProduceError::Frozen(kind),
            other @ ValueError::KindMismatch { .. } => ProduceError::InvalidMutation(other.to_string()),
        }
    }
}

/// Errors raised while decoding or applying patches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("NOT_FOUND")]
    NotFound,
    #[error("INVALID_INDEX")]
    InvalidIndex,
    #[error("INVALID_TARGET")]
    InvalidTarget,
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
    #[error(transparent)]
    Draft(#[from] ProduceError),
}
