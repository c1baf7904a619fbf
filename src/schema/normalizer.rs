// Schema normalizer for confschema
//
// Each source document is first *prepared* against the schema: substitutions,
// before-normalization rules, dual-name remapping, map key extraction and type
// checks, leaving absent nodes absent. Prepared sources are then deep-merged in
// precedence order and the result is *finalized* once: required checks,
// defaults, unset handling and cardinality.
//
// A value rejected while preparing is left out and the walk carries on, so the
// checks of the later passes still run over everything that survived.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::internal::error::ConfigError;
use crate::schema::merge::merge_values;
use crate::schema::output::NormalizedConfig;
use crate::schema::path::ConfigPath;
use crate::schema::rules::apply_first;
use crate::schema::types::{NodeKind, SchemaNode, XmlRemapping};

type Outcome<T> = std::result::Result<T, ConfigError>;

/// Configuration for the normalizer
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Drop keys no schema node declares instead of rejecting them
    pub allow_unknown_fields: bool,

    /// Report every independent failure in one pass; when false the first
    /// failure is returned on its own
    pub collect_all_errors: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            allow_unknown_fields: false,
            collect_all_errors: true,
        }
    }
}

/// Normalizes raw documents against a schema tree
#[derive(Debug, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

/// Normalizes one raw document with the default configuration
pub fn normalize(schema: &SchemaNode, raw: &Value) -> Result<NormalizedConfig, ConfigError> {
    Normalizer::new().normalize(schema, raw)
}

/// Failures gathered during one `process` call
struct Report<'a> {
    config: &'a NormalizerConfig,
    errors: Vec<ConfigError>,
    /// Locations whose raw value was rejected and left out
    rejected: HashSet<ConfigPath>,
}

impl<'a> Report<'a> {
    fn new(config: &'a NormalizerConfig) -> Self {
        Self {
            config,
            errors: Vec::new(),
            rejected: HashSet::new(),
        }
    }

    /// Records a failure; returns it back when the walk should stop here
    fn push(&mut self, error: ConfigError) -> Outcome<()> {
        if self.config.collect_all_errors {
            self.errors.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Records a failure for a value that is left out of the result
    fn reject(&mut self, path: &ConfigPath, error: ConfigError) -> Outcome<()> {
        self.rejected.insert(path.clone());
        self.push(error)
    }

    /// Unwraps a shape check; a failed check rejects the value at `path`
    fn check<T>(&mut self, path: &ConfigPath, checked: Outcome<T>) -> Outcome<Option<T>> {
        match checked {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                self.reject(path, error)?;
                Ok(None)
            }
        }
    }

    fn was_rejected(&self, path: &ConfigPath) -> bool {
        self.rejected.contains(path)
    }

    fn rejected_within(&self, path: &ConfigPath) -> bool {
        self.rejected.iter().any(|rejected| rejected.starts_with(path))
    }

    fn finish<T>(self, value: T) -> Outcome<T> {
        match ConfigError::from_errors(self.errors) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}

impl Normalizer {
    /// Creates a new normalizer with default configuration
    pub fn new() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }

    /// Creates a new normalizer with custom configuration
    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalizes a single raw document
    pub fn normalize(
        &self,
        schema: &SchemaNode,
        raw: &Value,
    ) -> Result<NormalizedConfig, ConfigError> {
        self.process(schema, std::slice::from_ref(raw))
    }

    /// Normalizes several raw documents, later ones taking precedence.
    ///
    /// Errors from every source and from the final absence and cardinality
    /// checks come back together.
    pub fn process(
        &self,
        schema: &SchemaNode,
        sources: &[Value],
    ) -> Result<NormalizedConfig, ConfigError> {
        let root = ConfigPath::root().key(&schema.name);
        let mut report = Report::new(&self.config);
        let mut merged: Option<Value> = None;

        for (index, source) in sources.iter().enumerate() {
            let Some(prepared) = self.prepare(schema, source.clone(), &root, &mut report)? else {
                continue;
            };
            merged = Some(match merged {
                None => prepared,
                Some(previous) => {
                    debug!(source = index, root = %schema.name, "merging configuration source");
                    merge_values(schema, previous, prepared)
                }
            });
        }

        let value = self.finalize(schema, merged, &root, &mut report)?;
        report.finish(NormalizedConfig::new(
            schema.name.clone(),
            value.unwrap_or(Value::Null),
        ))
    }

    /// Pass one: shape a raw value for `node`, without absence handling.
    ///
    /// Returns `None` when the value was rejected.
    fn prepare(
        &self,
        node: &SchemaNode,
        raw: Value,
        path: &ConfigPath,
        report: &mut Report,
    ) -> Outcome<Option<Value>> {
        trace!(path = %path, kind = %node.kind, "preparing node");

        let value = match raw {
            Value::Null => node.treat_null_as.clone().unwrap_or(Value::Null),
            Value::Bool(true) => node.treat_true_as.clone().unwrap_or(Value::Bool(true)),
            other => other,
        };

        let (value, fired) = apply_first(&node.before_normalization, value);
        if let Some(rule) = fired {
            debug!(path = %path, rule, "applied before-normalization rule");
        }

        if value == Value::Bool(false) && node.allow_unset && node.kind.is_container() {
            return Ok(Some(value));
        }

        match node.kind {
            NodeKind::Scalar => report.check(path, coerce_scalar(value, path)),
            NodeKind::Boolean => report.check(path, coerce_boolean(value, path)),
            NodeKind::Array => self.prepare_array(node, value, path, report),
            NodeKind::Prototype => self.prepare_prototype(node, value, path, report),
            NodeKind::Map => self.prepare_map(node, value, path, report),
        }
    }

    fn prepare_array(
        &self,
        node: &SchemaNode,
        value: Value,
        path: &ConfigPath,
        report: &mut Report,
    ) -> Outcome<Option<Value>> {
        let Some(mut input) = report.check(path, into_object(value, NodeKind::Array, path))? else {
            return Ok(None);
        };

        for remapping in &node.xml_remappings {
            remap_dual_name(node, remapping, &mut input, path, report)?;
        }

        if !node.ignore_extra_keys && !self.config.allow_unknown_fields {
            for key in input.keys() {
                if node.child(key).is_none() {
                    report.push(ConfigError::UnrecognizedField {
                        path: path.clone(),
                        field: key.clone(),
                    })?;
                }
            }
        }

        let mut output = Map::new();
        for child in &node.children {
            let Some(raw_child) = input.remove(&child.name) else {
                continue;
            };
            let child_path = path.key(&child.name);
            if let Some(prepared) = self.prepare(child, raw_child, &child_path, report)? {
                output.insert(child.name.clone(), prepared);
            }
        }
        Ok(Some(Value::Object(output)))
    }

    fn prepare_prototype(
        &self,
        node: &SchemaNode,
        value: Value,
        path: &ConfigPath,
        report: &mut Report,
    ) -> Outcome<Option<Value>> {
        let checked = match value {
            Value::Array(items) => Ok(items),
            other => Err(ConfigError::TypeMismatch {
                path: path.clone(),
                expected: NodeKind::Prototype,
                actual: other,
            }),
        };
        let Some(items) = report.check(path, checked)? else {
            return Ok(None);
        };
        let Some(template) = node.prototype.as_deref() else {
            return Ok(Some(Value::Array(items)));
        };

        let mut output = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if let Some(prepared) = self.prepare(template, item, &path.index(index), report)? {
                output.push(prepared);
            }
        }
        Ok(Some(Value::Array(output)))
    }

    fn prepare_map(
        &self,
        node: &SchemaNode,
        value: Value,
        path: &ConfigPath,
        report: &mut Report,
    ) -> Outcome<Option<Value>> {
        let entries = match value {
            Value::Array(items) => key_entries(node, items, path, report)?,
            other => report.check(path, into_object(other, NodeKind::Map, path))?,
        };
        let Some(entries) = entries else {
            return Ok(None);
        };
        let Some(template) = node.prototype.as_deref() else {
            return Ok(Some(Value::Object(entries)));
        };

        let mut output = Map::with_capacity(entries.len());
        for (key, body) in entries {
            if let Some(prepared) = self.prepare(template, body, &path.key(&key), report)? {
                output.insert(key, prepared);
            }
        }
        Ok(Some(Value::Object(output)))
    }

    /// Pass three: absence handling and cardinality on the merged value.
    ///
    /// Returns `None` when the node is to be omitted from the output.
    fn finalize(
        &self,
        node: &SchemaNode,
        value: Option<Value>,
        path: &ConfigPath,
        report: &mut Report,
    ) -> Outcome<Option<Value>> {
        let value = match value {
            Some(Value::Bool(false)) if node.allow_unset && node.kind.is_container() => {
                return Ok(None)
            }
            Some(value) => value,
            // Already reported while preparing.
            None if report.was_rejected(path) => return Ok(None),
            None => {
                if node.required {
                    report.push(ConfigError::MissingRequiredField { path: path.clone() })?;
                    return Ok(None);
                }
                if let Some(default) = &node.default {
                    return Ok(Some(default.clone()));
                }
                if node.allow_unset {
                    return Ok(None);
                }
                match node.kind.empty_value() {
                    Some(empty) => empty,
                    None => {
                        report.push(ConfigError::MissingRequiredField { path: path.clone() })?;
                        return Ok(None);
                    }
                }
            }
        };

        match (node.kind, value) {
            (NodeKind::Array, Value::Object(mut input)) => {
                let mut output = Map::new();
                for child in &node.children {
                    let child_path = path.key(&child.name);
                    if let Some(finalized) =
                        self.finalize(child, input.remove(&child.name), &child_path, report)?
                    {
                        output.insert(child.name.clone(), finalized);
                    }
                }
                Ok(Some(Value::Object(output)))
            }
            (NodeKind::Prototype, Value::Array(items)) => {
                if node.requires_at_least_one_element && items.is_empty() {
                    // Elements rejected while preparing may be what emptied it.
                    if !report.rejected_within(path) {
                        report.push(ConfigError::EmptyCollection { path: path.clone() })?;
                    }
                    return Ok(None);
                }
                let Some(template) = node.prototype.as_deref() else {
                    return Ok(Some(Value::Array(items)));
                };
                let mut output = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    if let Some(finalized) =
                        self.finalize(template, Some(item), &path.index(index), report)?
                    {
                        output.push(finalized);
                    }
                }
                Ok(Some(Value::Array(output)))
            }
            (NodeKind::Map, Value::Object(entries)) => {
                if node.requires_at_least_one_element && entries.is_empty() {
                    if !report.rejected_within(path) {
                        report.push(ConfigError::EmptyCollection { path: path.clone() })?;
                    }
                    return Ok(None);
                }
                let Some(template) = node.prototype.as_deref() else {
                    return Ok(Some(Value::Object(entries)));
                };
                let mut output = Map::with_capacity(entries.len());
                for (key, body) in entries {
                    let entry_path = path.key(&key);
                    if let Some(finalized) =
                        self.finalize(template, Some(body), &entry_path, report)?
                    {
                        output.insert(key, finalized);
                    }
                }
                Ok(Some(Value::Object(output)))
            }
            (_, value) => Ok(Some(value)),
        }
    }
}

/// Objects pass through; an empty sequence counts as an empty object since
/// array-style sources cannot tell the two apart.
fn into_object(value: Value, expected: NodeKind, path: &ConfigPath) -> Outcome<Map<String, Value>> {
    match value {
        Value::Object(obj) => Ok(obj),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        other => Err(ConfigError::TypeMismatch {
            path: path.clone(),
            expected,
            actual: other,
        }),
    }
}

fn coerce_scalar(value: Value, path: &ConfigPath) -> Outcome<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(ConfigError::TypeMismatch {
            path: path.clone(),
            expected: NodeKind::Scalar,
            actual: value,
        }),
        scalar => Ok(scalar),
    }
}

fn coerce_boolean(value: Value, path: &ConfigPath) -> Outcome<Value> {
    let coerced = match &value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    match coerced {
        Some(b) => Ok(Value::Bool(b)),
        None => Err(ConfigError::TypeMismatch {
            path: path.clone(),
            expected: NodeKind::Boolean,
            actual: value,
        }),
    }
}

/// Turns a sequence of entries into a keyed object using the map's key attribute.
///
/// The attribute is removed from each entry body; encounter order is kept.
/// Entries without a usable key are reported and skipped.
fn key_entries(
    node: &SchemaNode,
    items: Vec<Value>,
    path: &ConfigPath,
    report: &mut Report,
) -> Outcome<Option<Map<String, Value>>> {
    let Some(attribute) = node.key_attribute.as_deref() else {
        return report.check(
            path,
            Err(ConfigError::TypeMismatch {
                path: path.clone(),
                expected: NodeKind::Map,
                actual: Value::Array(items),
            }),
        );
    };

    let mut entries = Map::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let entry_path = path.index(index);
        let mut body = match item {
            Value::Object(body) => body,
            other => {
                report.reject(
                    &entry_path,
                    ConfigError::TypeMismatch {
                        path: entry_path.clone(),
                        expected: NodeKind::Array,
                        actual: other,
                    },
                )?;
                continue;
            }
        };
        let key_path = entry_path.key(attribute);
        let key = match body.remove(attribute) {
            Some(Value::String(key)) => key,
            Some(Value::Number(key)) => key.to_string(),
            Some(other) => {
                report.reject(
                    &key_path,
                    ConfigError::TypeMismatch {
                        path: key_path.clone(),
                        expected: NodeKind::Scalar,
                        actual: other,
                    },
                )?;
                continue;
            }
            None => {
                let error = ConfigError::MissingRequiredField {
                    path: key_path.clone(),
                };
                report.reject(&key_path, error)?;
                continue;
            }
        };
        if entries.contains_key(&key) {
            report.push(ConfigError::DuplicateKey {
                path: path.clone(),
                key,
            })?;
            continue;
        }
        entries.insert(key, Value::Object(body));
    }
    Ok(Some(entries))
}

/// Folds the singular spelling of a collection into its plural child.
///
/// The singular value, wrapped into a sequence unless it already is one, is
/// placed in front of whatever the plural spelling holds.
fn remap_dual_name(
    node: &SchemaNode,
    remapping: &XmlRemapping,
    input: &mut Map<String, Value>,
    path: &ConfigPath,
    report: &mut Report,
) -> Outcome<()> {
    let Some(singular) = input.remove(&remapping.singular) else {
        return Ok(());
    };
    let mut items = match singular {
        Value::Array(items) => items,
        other => vec![other],
    };
    let plural_path = path.key(&remapping.plural);
    trace!(path = %plural_path, singular = %remapping.singular, "remapping singular spelling");

    let merged = match input.remove(&remapping.plural) {
        None => Value::Array(items),
        Some(Value::Array(rest)) => {
            items.extend(rest);
            Value::Array(items)
        }
        Some(Value::Object(keyed)) => match node.child(&remapping.plural) {
            Some(collection) if collection.kind == NodeKind::Map => {
                let Some(mut entries) = key_entries(collection, items, &plural_path, report)? else {
                    return Ok(());
                };
                for (key, body) in keyed {
                    if entries.contains_key(&key) {
                        report.push(ConfigError::DuplicateKey {
                            path: plural_path.clone(),
                            key,
                        })?;
                        continue;
                    }
                    entries.insert(key, body);
                }
                Value::Object(entries)
            }
            _ => {
                items.push(Value::Object(keyed));
                Value::Array(items)
            }
        },
        Some(other) => {
            items.push(other);
            Value::Array(items)
        }
    };
    input.insert(remapping.plural.clone(), merged);
    Ok(())
}
