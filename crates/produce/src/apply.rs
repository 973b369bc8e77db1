//! Patch application.
//!
//! Patches are replayed through a draft of the target, so the result shares
//! every subtree no patch reaches. Missing targets are errors rather than
//! silent no-ops.

use produce_value::{Key, Kind, Value};

use crate::draft::DraftMut;
use crate::engine::Engine;
use crate::error::{PatchError, ProduceError};
use crate::patch::Patch;

/// Applies `patches` to `base` in order.
///
/// A patch with an empty path replaces the whole value; later patches apply
/// to that replacement.
pub fn apply_patches(engine: &Engine, base: &Value, patches: &[Patch]) -> Result<Value, PatchError> {
    let mut current = base.clone();
    let mut rest = patches;
    while !rest.is_empty() {
        let split = rest.iter().position(|p| p.path().is_empty()).unwrap_or(rest.len());
        let (batch, tail) = rest.split_at(split);
        if !batch.is_empty() {
            current = engine.replay(&current, |draft| {
                batch.iter().try_for_each(|patch| apply_patch(draft, patch))
            })?;
        }
        match tail.split_first() {
            Some((root, tail)) => {
                current = apply_root(engine, root)?;
                rest = tail;
            }
            None => break,
        }
    }
    Ok(current)
}

fn apply_root(engine: &Engine, patch: &Patch) -> Result<Value, PatchError> {
    match patch {
        Patch::Add { value, .. } | Patch::Replace { value, .. } => {
            if engine.config().auto_freeze {
                value.freeze(true);
            }
            Ok(value.clone())
        }
        Patch::Remove { .. } => Err(PatchError::InvalidTarget),
    }
}

/// Applies one patch with a non-empty path inside a draft.
pub(crate) fn apply_patch(root: &mut DraftMut<'_>, patch: &Patch) -> Result<(), PatchError> {
    let (last, parents) = patch.path().split_last().ok_or(PatchError::InvalidTarget)?;
    let mut target = root.reborrow().descend(parents).map_err(|err| match err {
        ProduceError::InvalidMutation(_) => PatchError::NotFound,
        other => PatchError::Draft(other),
    })?;
    match target.kind() {
        Kind::Sequence => apply_seq(&mut target, last, patch),
        Kind::OrderedSet => apply_set(&mut target, last, patch),
        Kind::Record | Kind::OrderedMap => apply_keyed(&mut target, last, patch),
        Kind::Leaf => Err(PatchError::InvalidTarget),
    }
}

fn apply_keyed(target: &mut DraftMut<'_>, key: &Key, patch: &Patch) -> Result<(), PatchError> {
    if target.kind() == Kind::Record && key.as_field().is_none() {
        return Err(PatchError::InvalidTarget);
    }
    match patch {
        Patch::Add { value, .. } => target.set(key.clone(), value.clone())?,
        Patch::Replace { value, .. } => {
            if !target.contains_key(key.clone()) {
                return Err(PatchError::NotFound);
            }
            target.set(key.clone(), value.clone())?;
        }
        Patch::Remove { .. } => {
            target.delete(key.clone())?.ok_or(PatchError::NotFound)?;
        }
    }
    Ok(())
}

fn apply_seq(target: &mut DraftMut<'_>, key: &Key, patch: &Patch) -> Result<(), PatchError> {
    let len = target.len();
    let mut seq = target.as_seq()?;
    let index = match key {
        Key::Field(f) if f == "-" => len,
        key => key.as_index().ok_or(PatchError::InvalidIndex)?,
    };
    match patch {
        Patch::Add { value, .. } => {
            if index > len {
                return Err(PatchError::InvalidIndex);
            }
            seq.insert(index, value.clone())?;
        }
        Patch::Replace { value, .. } => {
            if index >= len {
                return Err(PatchError::NotFound);
            }
            seq.set(index, value.clone())?;
        }
        Patch::Remove { .. } => {
            if index >= len {
                return Err(PatchError::NotFound);
            }
            seq.remove(index)?;
        }
    }
    Ok(())
}

fn apply_set(target: &mut DraftMut<'_>, key: &Key, patch: &Patch) -> Result<(), PatchError> {
    let len = target.len();
    let mut set = target.as_set()?;
    let position = match key {
        Key::Field(f) if f == "-" => len,
        key => key.as_index().ok_or(PatchError::InvalidIndex)?,
    };
    match patch {
        Patch::Add { value, .. } => {
            if set.contains(value.clone()) {
                return Ok(());
            }
            set.insert(position.min(len), value.clone())?;
        }
        Patch::Remove { value: Some(member), .. } => {
            if !set.remove(member.clone())? {
                return Err(PatchError::NotFound);
            }
        }
        Patch::Remove { value: None, .. } => {
            if position >= len {
                return Err(PatchError::NotFound);
            }
            set.delete(position)?;
        }
        Patch::Replace { .. } => {
            return Err(PatchError::InvalidOp("replace inside an ordered set".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(doc: serde_json::Value, patches: Vec<Patch>) -> Result<Value, PatchError> {
        Engine::default().apply_patches(&Value::from(doc), &patches)
    }

    fn path(steps: &[&str]) -> Vec<Key> {
        steps.iter().map(|s| Key::from(*s)).collect()
    }

    #[test]
    fn add_replace_remove_on_record() {
        let out = apply(
            json!({"a": 1, "b": 2}),
            vec![
                Patch::Add { path: path(&["c"]), value: Value::from(3) },
                Patch::Replace { path: path(&["a"]), value: Value::from(10) },
                Patch::Remove { path: path(&["b"]), value: None },
            ],
        )
        .unwrap();
        assert_eq!(out, Value::from(json!({"a": 10, "c": 3})));
    }

    #[test]
    fn sequence_add_inserts_and_dash_appends() {
        let out = apply(
            json!({"list": [1, 3]}),
            vec![
                Patch::Add { path: path(&["list", "1"]), value: Value::from(2) },
                Patch::Add { path: path(&["list", "-"]), value: Value::from(4) },
            ],
        )
        .unwrap();
        assert_eq!(out, Value::from(json!({"list": [1, 2, 3, 4]})));
    }

    #[test]
    fn missing_targets_are_errors() {
        let cases = vec![
            (Patch::Remove { path: path(&["x"]), value: None }, PatchError::NotFound),
            (Patch::Replace { path: path(&["x"]), value: Value::Null }, PatchError::NotFound),
            (Patch::Add { path: path(&["x", "y"]), value: Value::Null }, PatchError::NotFound),
            (Patch::Remove { path: path(&["l", "5"]), value: None }, PatchError::NotFound),
            (Patch::Add { path: path(&["l", "5"]), value: Value::Null }, PatchError::InvalidIndex),
            (Patch::Add { path: path(&["l", "z"]), value: Value::Null }, PatchError::InvalidIndex),
            (Patch::Remove { path: vec![], value: None }, PatchError::InvalidTarget),
        ];
        for (patch, expected) in cases {
            assert_eq!(apply(json!({"l": [1]}), vec![patch]).unwrap_err(), expected);
        }
    }

    #[test]
    fn root_replace_then_edit() {
        let out = apply(
            json!({"old": true}),
            vec![
                Patch::Replace { path: vec![], value: Value::from(json!({"n": 1})) },
                Patch::Replace { path: path(&["n"]), value: Value::from(2) },
            ],
        )
        .unwrap();
        assert_eq!(out, Value::from(json!({"n": 2})));
    }

    #[test]
    fn untouched_subtrees_are_shared() {
        let base = Value::from(json!({"a": {"x": 1}, "b": {"y": 2}}));
        let out = Engine::default()
            .apply_patches(&base, &[Patch::Replace { path: path(&["a", "x"]), value: Value::from(5) }])
            .unwrap();
        assert!(out.get(&Key::from("b")).unwrap().same(base.get(&Key::from("b")).unwrap()));
    }

    #[test]
    fn set_members_by_value_and_position() {
        let base = Value::record([("tags", Value::set(["a", "b", "c"]))]);
        let out = Engine::default()
            .apply_patches(
                &base,
                &[
                    Patch::Remove { path: vec![Key::from("tags"), Key::Index(1)], value: Some(Value::from("b")) },
                    Patch::Add { path: vec![Key::from("tags"), Key::Index(0)], value: Value::from("z") },
                ],
            )
            .unwrap();
        let tags = out.get(&Key::from("tags")).unwrap().as_set().unwrap();
        let order: Vec<_> = tags.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(order, ["z", "a", "c"]);
    }
}
