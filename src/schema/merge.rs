// Schema-aware deep merge
//
// Combines two prepared values for the same node, the right-hand side coming
// from the higher-precedence source. Objects merge key by key, prototype
// sequences append, scalars are replaced, and nodes built with
// `perform_no_deep_merging` are replaced wholesale.

use serde_json::Value;

use crate::schema::types::{NodeKind, SchemaNode};

/// Merges `right` into `left` following the shape of `node`
pub fn merge_values(node: &SchemaNode, left: Value, right: Value) -> Value {
    // `false` unsets a node that allows it; a later container brings it back.
    if right == Value::Bool(false) && node.allow_unset && node.kind.is_container() {
        return right;
    }
    if !node.mergeable {
        return right;
    }

    match (node.kind, left, right) {
        (NodeKind::Array, Value::Object(mut left), Value::Object(right)) => {
            for (key, right_value) in right {
                match (left.get_mut(&key), node.child(&key)) {
                    (Some(slot), Some(child)) => {
                        let left_value = std::mem::take(slot);
                        *slot = merge_values(child, left_value, right_value);
                    }
                    _ => {
                        left.insert(key, right_value);
                    }
                }
            }
            Value::Object(left)
        }
        (NodeKind::Map, Value::Object(mut left), Value::Object(right)) => {
            for (key, right_value) in right {
                match (left.get_mut(&key), node.prototype.as_deref()) {
                    (Some(slot), Some(template)) => {
                        let left_value = std::mem::take(slot);
                        *slot = merge_values(template, left_value, right_value);
                    }
                    _ => {
                        left.insert(key, right_value);
                    }
                }
            }
            Value::Object(left)
        }
        (NodeKind::Prototype, Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Value::Array(left)
        }
        (_, _, right) => right,
    }
}
