//! Error types for schema compilation, data binding and validation.
//!
//! Schema and mapping failures are hard errors that abort the current call.
//! Validation failures are reported: they carry the offending name and every
//! message collected for it, and callers inspect them rather than bail out.

mod schema_error;
mod validation_error;

pub use schema_error::SchemaError;
pub use validation_error::ValidationError;

/// Umbrella error for record access and data binding.
#[derive(Debug, thiserror::Error)]
pub enum DtoError {
    /// The schema description could not be compiled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An accessor named a field the record does not declare.
    #[error("property '{0}' not found")]
    PropertyNotFound(String),

    /// An input path has no registered alias while strict mapping is enabled.
    #[error("missing map to: {0}")]
    MapNotFound(String),

    /// A value was assigned to a property whose kind cannot hold it.
    #[error("property '{name}' is {kind} typed and cannot be assigned a plain value")]
    TypeMismatch {
        /// Property name
        name: String,
        /// The property's declared type tag
        kind: String,
    },

    /// An input index lies too far past the end of an untyped array.
    #[error("index {index} is out of range for '{name}'")]
    IndexOutOfRange {
        /// Property name
        name: String,
        /// The requested input index
        index: usize,
    },

    /// One or more constraint violations.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DtoError {
    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            DtoError::Validation(err) => Some(err),
            _ => None,
        }
    }
}
