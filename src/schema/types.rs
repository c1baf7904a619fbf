// Schema type system for confschema
//
// This module defines the schema tree: named nodes with a kind, absence
// handling (required / default / unset), substitutions and rules applied to
// raw values, and the collection-specific settings used by the normalizer.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::path::{ConfigPath, PathSegment};
use crate::schema::rules::NormalizationRule;

/// The shape a schema node accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// String, number, boolean or null
    Scalar,
    /// Boolean, coerced from the usual textual spellings
    Boolean,
    /// Object with a fixed set of named children
    Array,
    /// Object keyed by an attribute extracted from each entry
    Map,
    /// Sequence whose elements all follow one template
    Prototype,
}

impl NodeKind {
    /// Returns true for kinds that hold other nodes
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Array | NodeKind::Map | NodeKind::Prototype)
    }

    /// The value a container of this kind holds when it is empty
    pub fn empty_value(&self) -> Option<Value> {
        match self {
            NodeKind::Array | NodeKind::Map => Some(Value::Object(Map::new())),
            NodeKind::Prototype => Some(Value::Array(Vec::new())),
            NodeKind::Scalar | NodeKind::Boolean => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Scalar => "scalar",
            NodeKind::Boolean => "boolean",
            NodeKind::Array => "array",
            NodeKind::Map => "map",
            NodeKind::Prototype => "prototype",
        };
        f.write_str(name)
    }
}

/// A field that tag-style sources repeat under a singular name
/// (`<engine>twig</engine><engine>php</engine>`) while array-style sources
/// use the plural collection (`engines: [twig, php]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlRemapping {
    pub singular: String,
    pub plural: String,
}

/// A named node in the schema tree.
///
/// Trees are assembled with [`NodeBuilder`](crate::schema::NodeBuilder) and are
/// read-only afterwards; one tree may serve any number of normalization calls,
/// from any number of threads.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Identifier, unique among siblings
    pub name: String,
    pub kind: NodeKind,
    /// Absence after normalization is an error
    pub required: bool,
    /// Substituted when the node is absent; `Some(Value::Null)` is an explicit null default
    pub default: Option<Value>,
    /// Absent node is omitted from output
    pub allow_unset: bool,
    /// Applied to the raw value, first match wins
    pub before_normalization: Vec<NormalizationRule>,
    /// Named children of an `Array` node, in declaration order
    pub children: Vec<SchemaNode>,
    /// Element template of a `Prototype` or `Map` node
    pub prototype: Option<Box<SchemaNode>>,
    pub treat_null_as: Option<Value>,
    pub treat_true_as: Option<Value>,
    /// Entry field promoted to the key of a `Map` node
    pub key_attribute: Option<String>,
    /// Later sources deep-merge into earlier ones instead of replacing them
    pub mergeable: bool,
    pub requires_at_least_one_element: bool,
    pub xml_remappings: Vec<XmlRemapping>,
    /// Unknown keys under an `Array` node are dropped instead of rejected
    pub ignore_extra_keys: bool,
    /// Help text shown next to errors reported for this node
    pub info: Option<String>,
}

impl SchemaNode {
    pub(crate) fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            allow_unset: false,
            before_normalization: Vec::new(),
            children: Vec::new(),
            prototype: None,
            treat_null_as: None,
            treat_true_as: None,
            key_attribute: None,
            mergeable: true,
            requires_at_least_one_element: false,
            xml_remappings: Vec::new(),
            ignore_extra_keys: false,
            info: None,
        }
    }

    /// Looks up a direct child by name
    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Walks a dotted path of child names (`templating.engines`)
    pub fn find(&self, path: &str) -> Option<&SchemaNode> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// The node describing the value at `path`, as reported in a [`ConfigError`].
    ///
    /// Paths start at this node's name; map entries and sequence elements
    /// resolve to the element template.
    ///
    /// [`ConfigError`]: crate::ConfigError
    pub fn node_at(&self, path: &ConfigPath) -> Option<&SchemaNode> {
        let (first, rest) = path.segments().split_first()?;
        if *first != PathSegment::Key(self.name.clone()) {
            return None;
        }
        rest.iter().try_fold(self, |node, segment| match (node.kind, segment) {
            (NodeKind::Array, PathSegment::Key(key)) => node.child(key),
            (NodeKind::Map, _) | (NodeKind::Prototype, PathSegment::Index(_)) => {
                node.prototype.as_deref()
            }
            _ => None,
        })
    }

    /// The remapping whose plural is `plural`, if any
    pub fn remapping_for(&self, plural: &str) -> Option<&XmlRemapping> {
        self.xml_remappings.iter().find(|r| r.plural == plural)
    }
}
