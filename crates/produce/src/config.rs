//! Engine configuration.

use produce_value::{classify, Kind, Value};
use serde::{Deserialize, Serialize};

/// Feature switches fixed when an [`Engine`](crate::Engine) is built.
///
/// Every switch defaults to `true`. Missing fields deserialize to their
/// defaults, so a partial config file is valid:
///
/// ```
/// let config: produce::Config = serde_json::from_str(r#"{"autoFreeze": false}"#).unwrap();
/// assert!(config.record_patches);
/// assert!(!config.auto_freeze);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Allows `produce_with_patches`.
    pub record_patches: bool,
    /// Drafts ordered maps and sets. When off they are treated as leaves.
    pub ordered_collections: bool,
    /// Freezes the containers a finished draft builds.
    pub auto_freeze: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_patches: true,
            ordered_collections: true,
            auto_freeze: true,
        }
    }
}

impl Config {
    /// Classifies `value` under this configuration.
    pub fn classify(&self, value: &Value) -> Kind {
        match classify(value) {
            kind if kind.is_collection() && !self.ordered_collections => Kind::Leaf,
            kind => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_become_leaves_when_disabled() {
        let config = Config { ordered_collections: false, ..Config::default() };
        assert_eq!(config.classify(&Value::set([1])), Kind::Leaf);
        assert_eq!(config.classify(&Value::map([("a", 1)])), Kind::Leaf);
        assert_eq!(config.classify(&Value::seq([1])), Kind::Sequence);
    }

    #[test]
    fn empty_object_is_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
