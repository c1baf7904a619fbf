// confschema library entry point
//
// Schema-driven normalization of layered configuration documents: declare a
// tree with `schema::NodeBuilder`, read sources with `loader`, and turn them
// into one validated `NormalizedConfig` with `schema::Normalizer`.

pub mod framework;
pub mod internal;
pub mod loader;
pub mod schema;

pub use internal::error::{ConfigError, Error, Result};
pub use loader::{section, SourceFormat, SourceLoader};
pub use schema::{
    normalize, NodeBuilder, NormalizedConfig, Normalizer, NormalizerConfig, SchemaNode,
};
