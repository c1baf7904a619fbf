// Before-normalization rules
//
// A rule is a (predicate, transform) pair attached to a schema node. Rules are
// stored as plain data so the normalizer stays one generic traversal; the
// `Custom` variants cover anything the built-in vocabulary cannot express.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Condition deciding whether a rule fires for a raw value
#[derive(Clone)]
pub enum Predicate {
    /// Always matches
    Always,
    /// Value is `null`
    IsNull,
    /// Value is a string
    IsString,
    /// Value is a sequence
    IsSequence,
    /// Value is an object
    IsObject,
    /// Value is a sequence or an object
    IsCollection,
    /// Value is anything but a sequence
    NotSequence,
    /// Value is neither a sequence nor an object
    NotCollection,
    /// Value is an object holding a non-null entry under the key
    HasKey(String),
    /// Value is an object where every listed key holds a non-empty value
    HasNonEmpty(Vec<String>),
    /// Caller-supplied predicate
    Custom(CustomPredicate),
}

/// Rewrite applied when a rule's predicate matches
#[derive(Clone)]
pub enum Transform {
    /// `v` becomes `[v]`
    WrapInList,
    /// `{key: x, ..}` becomes `x`
    ExtractKey(String),
    /// Object keys starting with the prefix lose it (`pdo.db_table` -> `db_table`)
    StripKeyPrefix(String),
    /// `{key: x, into: .., ..}` becomes `{into: {key: x}, ..}`
    NestUnder { key: String, into: String },
    /// Value is replaced wholesale
    Replace(Value),
    /// Caller-supplied transform
    Custom(CustomTransform),
}

/// Shareable predicate closure
#[derive(Clone)]
pub struct CustomPredicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

/// Shareable transform closure
#[derive(Clone)]
pub struct CustomTransform(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl CustomPredicate {
    pub fn new(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl CustomTransform {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

impl fmt::Debug for CustomTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomTransform(..)")
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => f.write_str("Always"),
            Predicate::IsNull => f.write_str("IsNull"),
            Predicate::IsString => f.write_str("IsString"),
            Predicate::IsSequence => f.write_str("IsSequence"),
            Predicate::IsObject => f.write_str("IsObject"),
            Predicate::IsCollection => f.write_str("IsCollection"),
            Predicate::NotSequence => f.write_str("NotSequence"),
            Predicate::NotCollection => f.write_str("NotCollection"),
            Predicate::HasKey(key) => f.debug_tuple("HasKey").field(key).finish(),
            Predicate::HasNonEmpty(keys) => f.debug_tuple("HasNonEmpty").field(keys).finish(),
            Predicate::Custom(custom) => custom.fmt(f),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::WrapInList => f.write_str("WrapInList"),
            Transform::ExtractKey(key) => f.debug_tuple("ExtractKey").field(key).finish(),
            Transform::StripKeyPrefix(prefix) => {
                f.debug_tuple("StripKeyPrefix").field(prefix).finish()
            }
            Transform::NestUnder { key, into } => f
                .debug_struct("NestUnder")
                .field("key", key)
                .field("into", into)
                .finish(),
            Transform::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Transform::Custom(custom) => custom.fmt(f),
        }
    }
}

impl Predicate {
    /// Evaluates the predicate against a raw value
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::IsNull => value.is_null(),
            Predicate::IsString => value.is_string(),
            Predicate::IsSequence => value.is_array(),
            Predicate::IsObject => value.is_object(),
            Predicate::IsCollection => value.is_array() || value.is_object(),
            Predicate::NotSequence => !value.is_array(),
            Predicate::NotCollection => !(value.is_array() || value.is_object()),
            Predicate::HasKey(key) => value
                .as_object()
                .and_then(|obj| obj.get(key))
                .map_or(false, |v| !v.is_null()),
            Predicate::HasNonEmpty(keys) => match value.as_object() {
                Some(obj) => keys
                    .iter()
                    .all(|key| obj.get(key).map_or(false, |v| !is_empty_value(v))),
                None => false,
            },
            Predicate::Custom(custom) => (custom.0)(value),
        }
    }
}

impl Transform {
    /// Applies the rewrite, consuming the raw value
    pub fn apply(&self, value: Value) -> Value {
        match self {
            Transform::WrapInList => Value::Array(vec![value]),
            Transform::ExtractKey(key) => match value {
                Value::Object(mut obj) => obj.remove(key).unwrap_or(Value::Null),
                other => other,
            },
            Transform::StripKeyPrefix(prefix) => match value {
                Value::Object(obj) => {
                    let mut renamed = Map::with_capacity(obj.len());
                    for (key, v) in obj {
                        let key = match key.strip_prefix(prefix.as_str()) {
                            Some(stripped) => stripped.to_string(),
                            None => key,
                        };
                        renamed.insert(key, v);
                    }
                    Value::Object(renamed)
                }
                other => other,
            },
            Transform::NestUnder { key, into } => match value {
                Value::Object(mut obj) => {
                    if let Some(moved) = obj.remove(key) {
                        let mut nested = Map::new();
                        nested.insert(key.clone(), moved);
                        obj.insert(into.clone(), Value::Object(nested));
                    }
                    Value::Object(obj)
                }
                other => other,
            },
            Transform::Replace(replacement) => replacement.clone(),
            Transform::Custom(custom) => (custom.0)(value),
        }
    }
}

/// Named (predicate, transform) pair
#[derive(Debug, Clone)]
pub struct NormalizationRule {
    pub name: String,
    pub predicate: Predicate,
    pub transform: Transform,
}

impl NormalizationRule {
    pub fn new(name: impl Into<String>, predicate: Predicate, transform: Transform) -> Self {
        Self {
            name: name.into(),
            predicate,
            transform,
        }
    }

    /// Single values become one-element sequences
    pub fn wrap_non_sequence() -> Self {
        Self::new("wrap_non_sequence", Predicate::NotSequence, Transform::WrapInList)
    }

    /// Objects carrying `key` collapse to that entry (tag-style `{value: ..}` bodies)
    pub fn unwrap_key(key: &str) -> Self {
        Self::new(
            format!("unwrap_{}", key),
            Predicate::HasKey(key.to_string()),
            Transform::ExtractKey(key.to_string()),
        )
    }

    /// Object keys lose the given prefix
    pub fn strip_key_prefix(prefix: &str) -> Self {
        Self::new(
            format!("strip_{}_prefix", prefix.trim_end_matches('.')),
            Predicate::IsObject,
            Transform::StripKeyPrefix(prefix.to_string()),
        )
    }
}

/// Runs `rules` in order; the first matching rule is applied and the rest skipped.
///
/// Returns the (possibly rewritten) value and the name of the rule that fired.
pub fn apply_first<'a>(rules: &'a [NormalizationRule], value: Value) -> (Value, Option<&'a str>) {
    match rules.iter().find(|rule| rule.predicate.matches(&value)) {
        Some(rule) => (rule.transform.apply(value), Some(rule.name.as_str())),
        None => (value, None),
    }
}

/// Emptiness in the loose sense attribute-style sources need:
/// null, false, 0, "", "0" and empty containers are all empty.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(obj) => obj.is_empty(),
    }
}
