// Configuration paths
//
// Every validation error carries the location of the offending value so that
// an aggregated report can be read without the input document at hand.

use std::fmt;

/// One step from a node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Named child of an array node, or entry of a map node
    Key(String),
    /// Element of a prototype sequence
    Index(usize),
}

/// Location of a value inside a configuration tree, e.g. `framework.templating.engines[0]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<PathSegment>,
}

impl ConfigPath {
    /// The empty path
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path extended by a key segment
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Returns a new path extended by an index segment
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &ConfigPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
