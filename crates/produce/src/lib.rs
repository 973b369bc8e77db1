//! produce: copy-on-write drafts over immutable values.
//!
//! A recipe receives a [`DraftMut`] of a base [`Value`] and edits it with
//! ordinary field and element operations. When the recipe returns, the
//! engine builds a new value that reuses every container the recipe did not
//! touch, and can report the edits as forward and inverse [`Patch`]es.
//!
//! ```
//! use produce::{produce_with_patches, apply_patches, ProduceError, Value};
//! use serde_json::json;
//!
//! let base = Value::from(json!({
//!     "user": {"name": "Ada", "tags": ["admin"]},
//!     "settings": {"theme": "dark"}
//! }));
//!
//! let (next, patches, inverse) = produce_with_patches(&base, |draft| {
//!     let mut user = draft.record_at("user")?;
//!     user.set("name", "Grace")?;
//!     user.seq_at("tags")?.push("editor")?;
//!     Ok::<_, ProduceError>(())
//! })
//! .unwrap();
//!
//! // Untouched subtrees are shared, not copied.
//! let key = produce::Key::from("settings");
//! assert!(next.get(&key).unwrap().same(base.get(&key).unwrap()));
//!
//! assert_eq!(apply_patches(&base, &patches).unwrap(), next);
//! assert_eq!(apply_patches(&next, &inverse).unwrap(), base);
//! ```

pub mod apply;
pub mod cli;
pub mod codec;
pub mod config;
pub mod draft;
pub mod engine;
pub mod error;
pub mod patch;

mod store;

pub use config::Config;
pub use draft::{Draft, DraftHandle, DraftMut, MapDraft, RecordDraft, SeqDraft, SetDraft};
pub use engine::{Engine, Outcome, Produced};
pub use error::{PatchError, ProduceError};
pub use patch::Patch;
pub use produce_value::{classify, freeze, is_draftable, Key, Kind, Path, Value, ValueError};

/// Runs `recipe` against a draft of `base` with the default [`Config`].
///
/// See [`Engine::produce`].
pub fn produce<F, T, E>(base: &Value, recipe: F) -> Result<Value, E>
where
    F: FnOnce(&mut DraftMut<'_>) -> Result<T, E>,
    T: Into<Outcome>,
    E: From<ProduceError>,
{
    Engine::default().produce(base, recipe)
}

/// See [`Engine::produce_with_patches`].
pub fn produce_with_patches<F, T, E>(base: &Value, recipe: F) -> Result<Produced, E>
where
    F: FnOnce(&mut DraftMut<'_>) -> Result<T, E>,
    T: Into<Outcome>,
    E: From<ProduceError>,
{
    Engine::default().produce_with_patches(base, recipe)
}

/// Curried producer: each call of the returned function is an independent
/// invocation over its own base.
///
/// ```
/// use produce::{producer, ProduceError, Value};
///
/// let add_item = producer(|draft, item: Value| {
///     draft.as_seq()?.push(item)?;
///     Ok::<_, ProduceError>(())
/// });
/// let a = add_item(&Value::seq(["x"]), Value::from("y")).unwrap();
/// let b = add_item(&Value::seq(Vec::<Value>::new()), Value::from("z")).unwrap();
/// assert_eq!(a, Value::seq(["x", "y"]));
/// assert_eq!(b, Value::seq(["z"]));
/// ```
pub fn producer<A, F, T, E>(recipe: F) -> impl Fn(&Value, A) -> Result<Value, E>
where
    F: Fn(&mut DraftMut<'_>, A) -> Result<T, E>,
    T: Into<Outcome>,
    E: From<ProduceError>,
{
    Engine::default().producer(recipe)
}

pub fn create_draft(base: &Value) -> Result<Draft, ProduceError> {
    Engine::default().create_draft(base)
}

pub fn create_draft_with_patches(base: &Value) -> Result<Draft, ProduceError> {
    Engine::default().create_draft_with_patches(base)
}

pub fn finish_draft(draft: &mut Draft) -> Result<Value, ProduceError> {
    draft.finish()
}

pub fn apply_patches(base: &Value, patches: &[Patch]) -> Result<Value, PatchError> {
    Engine::default().apply_patches(base, patches)
}

/// Pre-mutation value at `key` under `parent`, or `None` if that position
/// has not been drafted.
pub fn original(parent: &DraftMut<'_>, key: impl Into<Key>) -> Option<Value> {
    parent.original_at(key)
}

/// Value at `key` under `parent` as of now: a snapshot of the draft if the
/// position is drafted, the stored value otherwise, `None` if empty.
pub fn current(parent: &DraftMut<'_>, key: impl Into<Key>) -> Option<Value> {
    parent.current_at(key)
}
