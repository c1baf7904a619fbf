use serde_json::Value;
use std::io;
use thiserror::Error;

use crate::schema::path::ConfigPath;
use crate::schema::types::NodeKind;

/// Unified error type for the confschema library.
///
/// Schema authoring mistakes surface as [`Error::SchemaError`] when a tree is
/// built; problems with an input document surface as [`ConfigError`], either
/// directly from the normalizer or wrapped in [`Error::Config`].
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid schema definition (bad builder usage).
    #[error("Schema Error: {0}")]
    SchemaError(String),

    /// A source document could not be read.
    #[error("Load Error: {0}")]
    LoadError(String),

    /// A source document could not be parsed.
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// A source document failed validation against the schema.
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
}

/// A specialized `Result` type for confschema operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::LoadError(format!("IO Error while reading configuration: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ParseError(format!("invalid YAML: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(format!("invalid JSON: {}", err))
    }
}

/// Input validation failure for one normalization call.
///
/// The normalizer stays usable after returning any of these; the caller may
/// fix the input and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("The child node \"{path}\" must be configured")]
    MissingRequiredField { path: ConfigPath },

    #[error("Invalid type for path \"{path}\": expected {expected}, got {actual}")]
    TypeMismatch {
        path: ConfigPath,
        expected: NodeKind,
        actual: Value,
    },

    #[error("The path \"{path}\" should have at least 1 element defined")]
    EmptyCollection { path: ConfigPath },

    #[error("Duplicate key \"{key}\" for path \"{path}\"")]
    DuplicateKey { path: ConfigPath, key: String },

    #[error("Unrecognized option \"{field}\" under \"{path}\"")]
    UnrecognizedField { path: ConfigPath, field: String },

    /// Several independent failures reported together.
    #[error("{} configuration errors:\n{}", .0.len(), render_list(.0))]
    Aggregate(Vec<ConfigError>),
}

fn render_list(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ConfigError {
    /// Folds a list of sibling failures into a single error.
    ///
    /// Nested aggregates are flattened. Returns `None` for an empty list and the
    /// error itself when there is exactly one.
    pub fn from_errors(errors: Vec<ConfigError>) -> Option<ConfigError> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                ConfigError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(ConfigError::Aggregate(flat)),
        }
    }

    /// Every leaf failure contained in this error
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Aggregate(inner) => inner.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }

    /// Location of the failure, `None` for aggregates
    pub fn path(&self) -> Option<&ConfigPath> {
        match self {
            ConfigError::MissingRequiredField { path }
            | ConfigError::TypeMismatch { path, .. }
            | ConfigError::EmptyCollection { path }
            | ConfigError::DuplicateKey { path, .. }
            | ConfigError::UnrecognizedField { path, .. } => Some(path),
            ConfigError::Aggregate(_) => None,
        }
    }
}
