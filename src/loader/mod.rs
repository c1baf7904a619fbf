// Raw configuration sources
//
// Reads documents into generic value trees ahead of normalization: YAML and
// JSON files or strings, and an environment-variable overlay. Nothing here
// knows about schemas; `section` picks a root section out of a document.

use std::fs;
use std::path::Path;

use figment::providers::Env;
use figment::Figment;
use serde_json::Value;
use tracing::{debug, info};

use crate::internal::error::{Error, Result};

/// Textual formats a source document may be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// Picks the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(SourceFormat::Yaml),
            Some("json") => Ok(SourceFormat::Json),
            other => Err(Error::LoadError(format!(
                "unsupported configuration format {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// Loader for raw configuration documents
#[derive(Debug, Clone, Default)]
pub struct SourceLoader {
    env_prefix: Option<String>,
}

impl SourceLoader {
    pub fn new() -> Self {
        Self { env_prefix: None }
    }

    /// Enables the environment overlay for variables starting with `prefix`.
    ///
    /// `APP_FRAMEWORK__ROUTER__RESOURCE=routing.yml` with prefix `APP_` becomes
    /// `{framework: {router: {resource: "routing.yml"}}}`.
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Reads and parses a file, picking the format from its extension
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;
        let text = fs::read_to_string(path)
            .map_err(|e| Error::LoadError(format!("cannot read {}: {}", path.display(), e)))?;
        let value = parse_str(&text, format)?;
        info!(path = %path.display(), ?format, "loaded configuration source");
        Ok(value)
    }

    /// Loads every file in order, then the environment overlay if enabled.
    ///
    /// The returned documents are in increasing precedence order.
    pub fn load_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Value>> {
        let mut documents = paths
            .iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>>>()?;
        if let Some(overlay) = self.env_overlay()? {
            documents.push(overlay);
        }
        Ok(documents)
    }

    /// The environment overlay, `None` when no prefix is configured
    pub fn env_overlay(&self) -> Result<Option<Value>> {
        let Some(prefix) = &self.env_prefix else {
            return Ok(None);
        };
        let value: Value = Figment::from(Env::prefixed(prefix).split("__"))
            .extract()
            .map_err(|e| Error::ParseError(format!("invalid environment overlay: {}", e)))?;
        debug!(prefix = %prefix, "read environment overlay");
        Ok(Some(value))
    }
}

/// Parses a document; blank input is an empty (null) document
pub fn parse_str(text: &str, format: SourceFormat) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value = match format {
        SourceFormat::Yaml => serde_yaml::from_str(text)?,
        SourceFormat::Json => serde_json::from_str(text)?,
    };
    Ok(value)
}

/// The `name` section of a document, if the document has one
pub fn section(document: &Value, name: &str) -> Option<Value> {
    document.as_object().and_then(|obj| obj.get(name)).cloned()
}
