//! Schema compilation errors.

use std::path::PathBuf;

/// A schema description that cannot be compiled into a record tree.
///
/// Every variant names the property (or file) it was raised for so the
/// offending descriptor can be located without a debugger.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The `type` tag is not part of the known vocabulary.
    #[error("{property}: invalid type '{tag}'")]
    UnknownType { property: String, tag: String },

    /// The descriptor has no `type` key.
    #[error("{property}: missing 'type'")]
    MissingType { property: String },

    /// A `dto` typed property without a `ref` target.
    #[error("property '{property}' with type 'dto' requires a 'ref' parameter")]
    MissingRef { property: String },

    /// An `object` typed property without a `properties` set.
    #[error("property '{property}' with type 'object' requires a 'properties' map")]
    MissingProperties { property: String },

    /// The `pattern` is not a valid regular expression.
    #[error("{property}: invalid pattern: {source}")]
    InvalidPattern {
        property: String,
        #[source]
        source: regex::Error,
    },

    /// The descriptor is structurally wrong (not a map, bad bound, ...).
    #[error("{property}: {reason}")]
    InvalidDescriptor { property: String, reason: String },

    /// The schema file could not be read.
    #[error("IO error reading {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema file could not be parsed.
    #[error("parse error in {}: {}", .path.display(), .reason)]
    Parse { path: PathBuf, reason: String },

    /// The schema file lacks its top-level key.
    #[error("{}: missing top-level '{}' key", .path.display(), .key)]
    MissingRoot { path: PathBuf, key: String },

    /// Reference chain too deep, usually a cycle between files.
    #[error("maximum reference depth {} exceeded resolving {}", .depth, .path.display())]
    MaxDepthExceeded { path: PathBuf, depth: usize },
}

impl SchemaError {
    pub(crate) fn invalid(property: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidDescriptor {
            property: property.into(),
            reason: reason.into(),
        }
    }
}
