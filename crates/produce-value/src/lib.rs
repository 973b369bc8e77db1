//! produce-value: the immutable value model used by the `produce` engine.
//!
//! A [`Value`] is a closed tagged variant: primitives, opaque objects, and
//! four container kinds (record, sequence, ordered map, ordered set).
//! Containers live behind `Arc`, so handing a value around shares it, and
//! every container carries a freeze flag that can be set in place.
//!
//! # Example
//!
//! ```
//! use produce_value::{freeze, Kind, Value};
//!
//! let config = Value::from(serde_json::json!({"apiUrl": "https://api", "timeout": 5000}));
//! assert_eq!(config.kind(), Kind::Record);
//!
//! let mut frozen = freeze(&config, false);
//! assert!(frozen.record_mut().is_err());
//! ```

pub mod classify;
pub mod container;
pub mod error;
pub mod json;
pub mod key;
pub mod value;

pub use classify::{classify, is_draftable, Kind};
pub use container::Container;
pub use error::ValueError;
pub use key::{Key, Path};
pub use value::{Opaque, OrderedMap, OrderedSet, Record, Sequence, Value};

/// Marks `value` immutable in place and returns another handle to it.
///
/// Freezing is visible through every handle to the same container. Leaves
/// are returned unchanged.
pub fn freeze(value: &Value, deep: bool) -> Value {
    value.freeze(deep);
    value.clone()
}
