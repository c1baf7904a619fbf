// Normalized configuration output
//
// The validated tree handed to wiring code, with dotted-path accessors so a
// consumer can read `router.resource` or `templating.engines` directly.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::internal::error::Result;

/// A fully normalized, defaulted and type-checked configuration value
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedConfig {
    root: String,
    value: Value,
}

impl NormalizedConfig {
    pub fn new(root: impl Into<String>, value: Value) -> Self {
        Self {
            root: root.into(),
            value,
        }
    }

    /// Name of the schema root this value was normalized against
    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Looks up a value by dotted path relative to the root.
    ///
    /// Object entries are addressed by key and sequence elements by index:
    /// `templating.engines.0`. The empty path returns the root value.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.value, |value, segment| match value {
                Value::Object(obj) => obj.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.value)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.value)?)
    }
}

impl Serialize for NormalizedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}
