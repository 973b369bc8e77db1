use produce_value::{Kind, Value};
use tracing::debug;

use crate::apply;
use crate::config::Config;
use crate::draft::{Draft, DraftMut};
use crate::error::{PatchError, ProduceError};
use crate::patch::Patch;
use crate::store::{DraftStore, ROOT};

/// What a recipe asks for once it returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Build the result from the draft.
    #[default]
    Keep,
    /// Discard the draft and return this value instead.
    Replace(Value),
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Keep
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Replace(value)
    }
}

impl From<Option<Value>> for Outcome {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Outcome::Keep, Outcome::Replace)
    }
}

/// Result of a producer run with patches: the new value, the forward
/// patches, and the inverse patches.
pub type Produced = (Value, Vec<Patch>, Vec<Patch>);

/// Producer entry points bound to one [`Config`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classifies `value` the way this engine drafts it.
    pub fn classify(&self, value: &Value) -> Kind {
        self.config.classify(value)
    }

    /// Runs `recipe` against a draft of `base` and returns the new value.
    ///
    /// Unmodified subtrees of the result are the base's own containers. If
    /// the recipe fails, its error is returned and the draft is dropped.
    pub fn produce<F, T, E>(&self, base: &Value, recipe: F) -> Result<Value, E>
    where
        F: FnOnce(&mut DraftMut<'_>) -> Result<T, E>,
        T: Into<Outcome>,
        E: From<ProduceError>,
    {
        let store = DraftStore::new(base, self.config, false)?;
        self.run(store, base, recipe).map(|(value, _, _)| value)
    }

    /// Like [`Engine::produce`], also returning forward and inverse patches.
    pub fn produce_with_patches<F, T, E>(&self, base: &Value, recipe: F) -> Result<Produced, E>
    where
        F: FnOnce(&mut DraftMut<'_>) -> Result<T, E>,
        T: Into<Outcome>,
        E: From<ProduceError>,
    {
        if !self.config.record_patches {
            return Err(ProduceError::PatchesDisabled.into());
        }
        let store = DraftStore::new(base, self.config, true)?;
        self.run(store, base, recipe)
    }

    /// Curries `recipe` into a reusable function of `(base, args)`.
    pub fn producer<A, F, T, E>(&self, recipe: F) -> impl Fn(&Value, A) -> Result<Value, E>
    where
        F: Fn(&mut DraftMut<'_>, A) -> Result<T, E>,
        T: Into<Outcome>,
        E: From<ProduceError>,
    {
        let engine = *self;
        move |base: &Value, args: A| engine.produce(base, |draft| recipe(draft, args))
    }

    /// Opens a draft the caller finishes explicitly. Nothing is recorded.
    pub fn create_draft(&self, base: &Value) -> Result<Draft, ProduceError> {
        DraftStore::new(base, self.config, false).map(Draft::new)
    }

    /// Opens a draft that records patches for [`Draft::finish_with_patches`].
    pub fn create_draft_with_patches(&self, base: &Value) -> Result<Draft, ProduceError> {
        if !self.config.record_patches {
            return Err(ProduceError::PatchesDisabled);
        }
        DraftStore::new(base, self.config, true).map(Draft::new)
    }

    /// Finishes `draft`. A second call reports [`ProduceError::StaleDraft`].
    pub fn finish_draft(&self, draft: &mut Draft) -> Result<Value, ProduceError> {
        draft.finish()
    }

    /// Applies `patches` in order, sharing everything they do not touch.
    pub fn apply_patches(&self, base: &Value, patches: &[Patch]) -> Result<Value, PatchError> {
        apply::apply_patches(self, base, patches)
    }

    /// Like [`Engine::produce`], with every position drafted separately.
    pub(crate) fn replay<F>(&self, base: &Value, recipe: F) -> Result<Value, PatchError>
    where
        F: FnOnce(&mut DraftMut<'_>) -> Result<(), PatchError>,
    {
        let store = DraftStore::new(base, self.config, false)?.unshared();
        self.run(store, base, recipe).map(|(value, _, _)| value)
    }

    fn run<F, T, E>(&self, mut store: DraftStore, base: &Value, recipe: F) -> Result<Produced, E>
    where
        F: FnOnce(&mut DraftMut<'_>) -> Result<T, E>,
        T: Into<Outcome>,
        E: From<ProduceError>,
    {
        let record = store.is_recording();
        let result = {
            let mut root = DraftMut::root(&mut store);
            recipe(&mut root)
        };
        let outcome = match result {
            Ok(outcome) => outcome.into(),
            Err(err) => {
                debug!(session = store.session(), "recipe failed, draft discarded");
                return Err(err);
            }
        };
        match outcome {
            Outcome::Keep => {
                let done = store.finalize();
                Ok((done.value, done.patches, done.inverse))
            }
            Outcome::Replace(value) => {
                if store.is_modified(ROOT) {
                    return Err(ProduceError::invalid(
                        "a recipe returned a replacement after modifying its draft",
                    )
                    .into());
                }
                if self.config.auto_freeze {
                    value.freeze(true);
                }
                debug!(session = store.session(), "draft replaced by recipe result");
                if !record {
                    return Ok((value, Vec::new(), Vec::new()));
                }
                let forward = Patch::Replace { path: Vec::new(), value: value.clone() };
                let inverse = Patch::Replace { path: Vec::new(), value: base.clone() };
                Ok((value, vec![forward], vec![inverse]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unmodified_draft_returns_base() {
        let base = Value::from(json!({"a": {"b": 1}}));
        let out = Engine::default()
            .produce(&base, |d| -> Result<(), ProduceError> {
                d.child("a")?;
                Ok(())
            })
            .unwrap();
        assert!(out.same(&base));
    }

    #[test]
    fn replacement_after_modification_is_rejected() {
        let base = Value::from(json!({"a": 1}));
        let err = Engine::default()
            .produce(&base, |d| {
                d.set("a", 2)?;
                Ok::<_, ProduceError>(Value::from(3))
            })
            .unwrap_err();
        assert!(matches!(err, ProduceError::InvalidMutation(_)));
    }

    #[test]
    fn replacement_emits_root_patches() {
        let base = Value::from(json!({"a": 1}));
        let (out, patches, inverse) = Engine::default()
            .produce_with_patches(&base, |_| Ok::<_, ProduceError>(Value::from(json!([1]))))
            .unwrap();
        assert_eq!(out, Value::from(json!([1])));
        assert_eq!(patches, vec![Patch::Replace { path: vec![], value: out.clone() }]);
        assert_eq!(inverse, vec![Patch::Replace { path: vec![], value: base }]);
    }

    #[test]
    fn patches_can_be_disabled() {
        let engine = Engine::new(Config { record_patches: false, ..Config::default() });
        let base = Value::from(json!({}));
        let err = engine
            .produce_with_patches(&base, |_| Ok::<_, ProduceError>(()))
            .unwrap_err();
        assert_eq!(err, ProduceError::PatchesDisabled);
        assert!(engine.produce(&base, |_| Ok::<_, ProduceError>(())).is_ok());
        assert_eq!(engine.create_draft_with_patches(&base).unwrap_err(), ProduceError::PatchesDisabled);
    }

    #[test]
    fn manual_drafts_record_only_on_request() {
        let base = Value::from(json!({"a": 1}));
        let engine = Engine::default();

        let mut quiet = engine.create_draft(&base).unwrap();
        quiet.root().unwrap().set("a", 2).unwrap();
        let (out, patches, inverse) = quiet.finish_with_patches().unwrap();
        assert_eq!(out, Value::from(json!({"a": 2})));
        assert!(patches.is_empty() && inverse.is_empty());

        let mut loud = engine.create_draft_with_patches(&base).unwrap();
        loud.root().unwrap().set("a", 2).unwrap();
        let (_, patches, inverse) = loud.finish_with_patches().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(inverse.len(), 1);
    }

    #[test]
    fn leaf_base_is_rejected() {
        let err = Engine::default()
            .produce(&Value::from("x"), |_| Ok::<_, ProduceError>(()))
            .unwrap_err();
        assert!(matches!(err, ProduceError::InvalidMutation(_)));
    }

    #[test]
    fn auto_freeze_can_be_disabled() {
        let engine = Engine::new(Config { auto_freeze: false, ..Config::default() });
        let base = Value::from(json!({"a": 1}));
        let out = engine.produce(&base, |d| d.set("a", 2)).unwrap();
        assert!(!out.is_frozen());
        let out = Engine::default().produce(&base, |d| d.set("a", 2)).unwrap();
        assert!(out.is_frozen());
    }
}
