// Schema module for confschema
//
// This module provides schema definition, construction and normalization for
// layered configuration documents. It includes:
//
// 1. Schema node model with absence handling and substitutions
// 2. Before-normalization rules stored as data
// 3. Fluent builder with build-time validation
// 4. Normalizer (prepare, merge, finalize) with aggregated errors
// 5. Normalized output with dotted-path access

// Re-export public types and functions
pub use self::builder::{object, NodeBuilder};
pub use self::normalizer::{normalize, Normalizer, NormalizerConfig};
pub use self::output::NormalizedConfig;
pub use self::path::{ConfigPath, PathSegment};
pub use self::rules::{CustomPredicate, CustomTransform, NormalizationRule, Predicate, Transform};
pub use self::types::{NodeKind, SchemaNode, XmlRemapping};

// Sub-modules
pub mod builder;
pub mod merge;
pub mod normalizer;
pub mod output;
pub mod path;
pub mod rules;
pub mod types;
