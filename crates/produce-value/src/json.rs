//! JSON interop.
//!
//! JSON objects become records, arrays become sequences. Going the other way,
//! maps whose keys are all strings become objects and any other map becomes
//! an array of `[key, value]` pairs; sets become arrays; opaque values and
//! non-finite floats become `null`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as Json};

use crate::Value;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::seq(items.into_iter().map(Value::from)),
            Json::Object(map) => Value::record(map.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}

impl From<&Value> for Json {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

impl Value {
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null | Value::Opaque(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number(Number::from(*i)),
            Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Record(r) => Json::Object(
                r.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>(),
            ),
            Value::Seq(s) => Json::Array(s.iter().map(Value::to_json).collect()),
            Value::Map(m) => {
                if m.keys().all(|k| k.as_str().is_some()) {
                    Json::Object(
                        m.iter()
                            .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.to_json())))
                            .collect(),
                    )
                } else {
                    Json::Array(
                        m.iter()
                            .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                            .collect(),
                    )
                }
            }
            Value::Set(s) => Json::Array(s.iter().map(Value::to_json).collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Opaque(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.len()))?;
                for (k, v) in r.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Seq(s) => serialize_items(serializer, s.len(), s.iter()),
            Value::Set(s) => serialize_items(serializer, s.len(), s.iter()),
            Value::Map(m) if m.keys().all(|k| k.as_str().is_some()) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Map(m) => {
                let mut seq = serializer.serialize_seq(Some(m.len()))?;
                for entry in m.iter() {
                    seq.serialize_element(&entry)?;
                }
                seq.end()
            }
        }
    }
}

fn serialize_items<'a, S: Serializer>(
    serializer: S,
    len: usize,
    items: impl Iterator<Item = &'a Value>,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(len))?;
    for item in items {
        seq.serialize_element(item)?;
    }
    seq.end()
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Value::from)
    }
}
