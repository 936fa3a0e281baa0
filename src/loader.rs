//! Reading schema and map documents.
//!
//! Compilation itself never touches the filesystem; it asks a
//! [`SchemaLoader`] for parsed documents. [`FileLoader`] reads YAML or JSON
//! from disk, [`MemoryLoader`] serves documents registered in memory.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SchemaError;

/// Abstraction over where schema documents come from.
///
/// Implement this trait to serve documents from another backend.
pub trait SchemaLoader: Send + Sync {
    /// Loads and parses the document at `path`.
    fn load(&self, path: &Path) -> Result<Value, SchemaError>;
}

/// Reads documents from disk.
///
/// `.json` files are parsed as JSON; everything else as YAML, which also
/// accepts JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl SchemaLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Value, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_document(path, &content)
    }
}

/// Parses document text, choosing the format from the file extension.
pub fn parse_document(path: &Path, content: &str) -> Result<Value, SchemaError> {
    let parse_error = |reason: String| SchemaError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        _ => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Serves documents registered in memory, keyed by path.
///
/// # Example
///
/// ```rust
/// use dtobind::{MemoryLoader, SchemaLoader};
/// use serde_json::json;
/// use std::path::Path;
///
/// let loader = MemoryLoader::new()
///     .with_document("schemas/address.yaml", json!({"dto": {"street": {"type": "string"}}}));
///
/// assert!(loader.load(Path::new("schemas/address.yaml")).is_ok());
/// assert!(loader.load(Path::new("schemas/missing.yaml")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<PathBuf, Value>,
}

impl MemoryLoader {
    /// Creates a loader with no documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document, builder style.
    pub fn with_document(mut self, path: impl Into<PathBuf>, document: Value) -> Self {
        self.insert(path, document);
        self
    }

    /// Registers a document under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, document: Value) {
        self.documents.insert(path.into(), document);
    }
}

impl SchemaLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Value, SchemaError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| SchemaError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "document not registered"),
            })
    }
}
