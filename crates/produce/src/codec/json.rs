//! JSON codec for patches.
//!
//! A patch is `{"op": "add" | "remove" | "replace", "path": [...], "value": ...}`.
//! Path steps are encoded as JSON numbers (sequence indices and set
//! positions), strings (record fields and string map keys) or, for other
//! map keys, the key's own JSON form. The decoder also accepts an RFC 6901
//! pointer string as the path.
//!
//! Values go through [`Value::to_json`], so ordered maps with non-string
//! keys and ordered sets come back as sequences.

use produce_value::{Key, Path, Value};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value as Json};

use crate::error::PatchError;
use crate::patch::Patch;

// ── Path helpers ──────────────────────────────────────────────────────────

fn encode_step(key: &Key) -> Json {
    match key {
        Key::Index(i) => json!(i),
        Key::Field(f) => Json::String(f.clone()),
        Key::Entry(v) => v.to_json(),
    }
}

fn decode_step(v: &Json) -> Key {
    match v {
        Json::String(s) => Key::Field(s.clone()),
        Json::Number(n) => match n.as_u64().and_then(|i| usize::try_from(i).ok()) {
            Some(i) => Key::Index(i),
            None => Key::Entry(Value::from(v.clone())),
        },
        other => Key::Entry(Value::from(other.clone())),
    }
}

fn decode_pointer(s: &str) -> Result<Path, PatchError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let rest = s
        .strip_prefix('/')
        .ok_or_else(|| PatchError::InvalidOp(format!("invalid pointer {s:?}")))?;
    Ok(rest
        .split('/')
        .map(|c| Key::Field(c.replace("~1", "/").replace("~0", "~")))
        .collect())
}

fn decode_path(v: &Json) -> Result<Path, PatchError> {
    match v {
        Json::Array(steps) => Ok(steps.iter().map(decode_step).collect()),
        Json::String(s) => decode_pointer(s),
        _ => Err(PatchError::InvalidOp("path must be an array or a pointer string".into())),
    }
}

// ── Serialization ─────────────────────────────────────────────────────────

/// Serializes one patch.
pub fn to_json(patch: &Patch) -> Json {
    let mut m = Map::new();
    m.insert("op".into(), json!(patch.op_name()));
    m.insert("path".into(), Json::Array(patch.path().iter().map(encode_step).collect()));
    if let Some(value) = patch.value() {
        m.insert("value".into(), value.to_json());
    }
    Json::Object(m)
}

/// Serializes a patch list as a JSON array.
pub fn to_json_patch(patches: &[Patch]) -> Json {
    Json::Array(patches.iter().map(to_json).collect())
}

// ── Deserialization ───────────────────────────────────────────────────────

/// Deserializes one patch.
pub fn from_json(v: &Json) -> Result<Patch, PatchError> {
    let obj = v
        .as_object()
        .ok_or_else(|| PatchError::InvalidOp("patch must be an object".into()))?;
    let op = obj
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or_else(|| PatchError::InvalidOp("missing op".into()))?;
    let path = decode_path(
        obj.get("path")
            .ok_or_else(|| PatchError::InvalidOp("missing path".into()))?,
    )?;
    let value = obj.get("value").map(|v| Value::from(v.clone()));
    let required = |value: Option<Value>| {
        value.ok_or_else(|| PatchError::InvalidOp(format!("{op} requires a value")))
    };
    match op {
        "add" => Ok(Patch::Add { path, value: required(value)? }),
        "replace" => Ok(Patch::Replace { path, value: required(value)? }),
        "remove" => Ok(Patch::Remove { path, value }),
        other => Err(PatchError::InvalidOp(format!("unknown op {other:?}"))),
    }
}

/// Deserializes a JSON array of patches.
pub fn from_json_patch(v: &Json) -> Result<Vec<Patch>, PatchError> {
    v.as_array()
        .ok_or_else(|| PatchError::InvalidOp("patch list must be an array".into()))?
        .iter()
        .map(from_json)
        .collect()
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Json::deserialize(deserializer)?;
        from_json(&v).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_steps_by_kind() {
        let patch = Patch::Replace {
            path: vec![Key::from("users"), Key::Index(0), Key::Entry(Value::from(true))],
            value: Value::from("x"),
        };
        assert_eq!(
            to_json(&patch),
            json!({"op": "replace", "path": ["users", 0, true], "value": "x"})
        );
    }

    #[test]
    fn remove_omits_missing_value() {
        let patch = Patch::Remove { path: vec![Key::from("a")], value: None };
        assert_eq!(to_json(&patch), json!({"op": "remove", "path": ["a"]}));
    }

    #[test]
    fn pointer_paths_are_accepted() {
        let patch = from_json(&json!({"op": "remove", "path": "/a~1b/0"})).unwrap();
        assert_eq!(patch.path(), &vec![Key::from("a/b"), Key::from("0")]);
        let root = from_json(&json!({"op": "replace", "path": "", "value": 1})).unwrap();
        assert!(root.path().is_empty());
    }

    #[test]
    fn malformed_patches_are_rejected() {
        for bad in [
            json!([]),
            json!({"path": []}),
            json!({"op": "add", "path": []}),
            json!({"op": "move", "path": [], "value": 1}),
            json!({"op": "remove", "path": "a"}),
            json!({"op": "remove", "path": 5}),
        ] {
            assert!(matches!(from_json(&bad), Err(PatchError::InvalidOp(_))), "{bad}");
        }
    }

    #[test]
    fn serde_goes_through_the_codec() {
        let text = r#"[{"op":"add","path":["list",2],"value":{"n":1}}]"#;
        let patches: Vec<Patch> = serde_json::from_str(text).unwrap();
        assert_eq!(patches, from_json_patch(&serde_json::from_str(text).unwrap()).unwrap());
        assert_eq!(serde_json::to_string(&patches).unwrap(), text);
    }
}
