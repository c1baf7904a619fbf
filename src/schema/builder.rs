// Fluent schema construction
//
// `NodeBuilder` values are plain owned data; chaining consumes and returns the
// builder, and nested nodes are attached with `child`. Mistakes such as a
// child on a scalar node are recorded and reported by `build`, which checks
// the whole tree before handing out an immutable `SchemaNode`.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::internal::error::{Error, Result};
use crate::schema::rules::NormalizationRule;
use crate::schema::types::{NodeKind, SchemaNode, XmlRemapping};

/// Builder for one schema node and, recursively, its children
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    node: SchemaNode,
    children: Vec<NodeBuilder>,
    prototype: Option<Box<NodeBuilder>>,
    misuse: Vec<String>,
}

impl NodeBuilder {
    fn with_kind(name: &str, kind: NodeKind) -> Self {
        let mut node = SchemaNode::new(name, kind);
        // Optional scalars are simply left out when absent.
        node.allow_unset = !kind.is_container();
        node.treat_null_as = kind.empty_value();
        Self {
            node,
            children: Vec::new(),
            prototype: None,
            misuse: Vec::new(),
        }
    }

    /// A scalar leaf (string, number, boolean or null)
    pub fn scalar(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Scalar)
    }

    /// A boolean leaf
    pub fn boolean(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Boolean)
    }

    /// An object with named children declared through [`NodeBuilder::child`]
    pub fn array(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Array)
    }

    /// A sequence whose elements all follow `template`
    pub fn prototype(name: &str, template: NodeBuilder) -> Self {
        let mut builder = Self::with_kind(name, NodeKind::Prototype);
        builder.prototype = Some(Box::new(template));
        builder
    }

    /// Declares a named child of an array node
    pub fn child(mut self, child: NodeBuilder) -> Self {
        if self.node.kind == NodeKind::Array {
            self.children.push(child);
        } else {
            self.misuse.push(format!(
                "node '{}' of kind {} cannot declare child '{}'",
                self.node.name, self.node.kind, child.node.name
            ));
        }
        self
    }

    /// Help text printed next to errors reported for this node
    pub fn info(mut self, text: &str) -> Self {
        self.node.info = Some(text.to_string());
        self
    }

    pub fn is_required(mut self) -> Self {
        self.node.required = true;
        self.node.allow_unset = false;
        self
    }

    /// The node may be absent from input and is then omitted from output
    /// instead of being defaulted to an empty container. A later source may
    /// also unset it by giving `false`.
    pub fn can_be_unset(mut self) -> Self {
        self.node.allow_unset = true;
        self
    }

    /// An absent scalar without a default becomes an error
    pub fn cannot_be_unset(mut self) -> Self {
        self.node.allow_unset = false;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.node.default = Some(value);
        self
    }

    /// Explicit `null` default, distinct from having no default
    pub fn default_null(self) -> Self {
        self.default_value(Value::Null)
    }

    pub fn default_true(self) -> Self {
        self.default_value(Value::Bool(true))
    }

    pub fn default_false(self) -> Self {
        self.default_value(Value::Bool(false))
    }

    pub fn treat_null_like(mut self, value: Value) -> Self {
        self.node.treat_null_as = Some(value);
        self
    }

    pub fn treat_true_like(mut self, value: Value) -> Self {
        self.node.treat_true_as = Some(value);
        self
    }

    /// Appends a rule run against the raw value before type checking
    pub fn before_normalization(mut self, rule: NormalizationRule) -> Self {
        self.node.before_normalization.push(rule);
        self
    }

    pub fn requires_at_least_one_element(mut self) -> Self {
        if self.prototype.is_some() {
            self.node.requires_at_least_one_element = true;
        } else {
            self.misuse.push(format!(
                "requires_at_least_one_element() needs a prototype node, '{}' is {}",
                self.node.name, self.node.kind
            ));
        }
        self
    }

    /// Turns a prototype node into a map keyed by `attribute` of each entry
    pub fn use_attribute_as_key(mut self, attribute: &str) -> Self {
        if self.prototype.is_some() {
            self.node.kind = NodeKind::Map;
            self.node.key_attribute = Some(attribute.to_string());
            self.node.treat_null_as = NodeKind::Map.empty_value();
        } else {
            self.misuse.push(format!(
                "use_attribute_as_key() needs a prototype node, '{}' is {}",
                self.node.name, self.node.kind
            ));
        }
        self
    }

    /// Accepts `singular` as an alternative spelling of the `{singular}s` child
    pub fn fix_xml_config(self, singular: &str) -> Self {
        let plural = format!("{}s", singular);
        self.fix_xml_config_plural(singular, &plural)
    }

    /// Accepts `singular` as an alternative spelling of the `plural` child
    pub fn fix_xml_config_plural(mut self, singular: &str, plural: &str) -> Self {
        self.node.xml_remappings.push(XmlRemapping {
            singular: singular.to_string(),
            plural: plural.to_string(),
        });
        self
    }

    /// Values from later sources replace this node instead of merging into it
    pub fn perform_no_deep_merging(mut self) -> Self {
        self.node.mergeable = false;
        self
    }

    pub fn ignore_extra_keys(mut self) -> Self {
        self.node.ignore_extra_keys = true;
        self
    }

    /// Validates the whole tree and returns the immutable schema
    pub fn build(self) -> Result<SchemaNode> {
        self.build_at(&[])
    }

    fn build_at(self, parents: &[&str]) -> Result<SchemaNode> {
        let NodeBuilder {
            mut node,
            children,
            prototype,
            misuse,
        } = self;

        let location = if parents.is_empty() {
            node.name.clone()
        } else {
            format!("{}.{}", parents.join("."), node.name)
        };

        if let Some(problem) = misuse.into_iter().next() {
            return Err(Error::SchemaError(format!("{} (at '{}')", problem, location)));
        }
        if node.name.is_empty() {
            return Err(Error::SchemaError(format!(
                "node names must not be empty (under '{}')",
                parents.join(".")
            )));
        }
        if node.required && node.default.is_some() {
            return Err(Error::SchemaError(format!(
                "required node '{}' cannot have a default value",
                location
            )));
        }

        let name = node.name.clone();
        let mut path: Vec<&str> = parents.to_vec();
        path.push(&name);

        let mut seen = HashSet::new();
        for child in children {
            let built = child.build_at(&path)?;
            if !seen.insert(built.name.clone()) {
                return Err(Error::SchemaError(format!(
                    "duplicate child '{}' under '{}'",
                    built.name, location
                )));
            }
            node.children.push(built);
        }

        if let Some(template) = prototype {
            let built = template.build_at(&path)?;
            if let Some(attribute) = &node.key_attribute {
                if built.kind == NodeKind::Array && built.child(attribute).is_none() {
                    return Err(Error::SchemaError(format!(
                        "key attribute '{}' of map '{}' is not declared by its prototype",
                        attribute, location
                    )));
                }
            }
            node.prototype = Some(Box::new(built));
        }

        for remapping in &node.xml_remappings {
            if node.child(&remapping.plural).is_none() {
                return Err(Error::SchemaError(format!(
                    "'{}' remaps '{}' onto undeclared child '{}'",
                    location, remapping.singular, remapping.plural
                )));
            }
            if node.child(&remapping.singular).is_some() {
                return Err(Error::SchemaError(format!(
                    "'{}' remaps '{}', which is itself a declared child",
                    location, remapping.singular
                )));
            }
        }

        Ok(node)
    }
}

/// Shorthand for `{"enabled": true}`-style substitution values
pub fn object(entries: &[(&str, Value)]) -> Value {
    let mut map = Map::with_capacity(entries.len());
    for (key, value) in entries {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}
