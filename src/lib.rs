//! # dtobind
//!
//! Declarative data transfer objects: compile a schema description into a
//! typed record tree, bind arbitrary nested input onto it, and collect ALL
//! validation errors in one pass rather than stopping at the first.
//!
//! ## Overview
//!
//! A schema is a named set of property descriptors (type, required flag,
//! length, range and pattern constraints, nested objects, arrays and
//! references to other schema files). The [`Factory`] compiles it into a
//! [`Record`]. A [`Mapper`] flattens input data into dotted paths, translates
//! them through an alias table and assigns the values, growing array
//! [`Collection`]s element by element as indexed paths are discovered.
//! Validation results use stillwater's `Validation` type so every failure is
//! accumulated.
//!
//! ## Core Types
//!
//! - [`Record`]: a named, ordered set of properties (the DTO itself)
//! - [`Property`]: a typed field holding a scalar, a nested record or a collection
//! - [`Collection`]: the growable elements of an array property
//! - [`Factory`]: compiles schema descriptions, caching referenced schemas
//! - [`Mapper`]: binds input data onto records through aliases
//! - [`ValidationError`]: one or more qualified validation messages
//!
//! ## Example
//!
//! ```rust
//! use dtobind::{Factory, Mapper, SchemaCache};
//! use serde_json::json;
//!
//! let mut record = Factory::new(json!({
//!     "name": "user",
//!     "properties": {
//!         "username": {"type": "string", "required": true},
//!         "inventory": {
//!             "type": "array",
//!             "items": {
//!                 "type": "object",
//!                 "properties": {
//!                     "name": {"type": "string", "required": true},
//!                     "amount": {"type": "integer"}
//!                 }
//!             }
//!         }
//!     }
//! }))
//! .with_cache(SchemaCache::new())
//! .create()
//! .unwrap();
//!
//! let mapper = Mapper::new("user")
//!     .alias("username", "user.name")
//!     .alias("inventory", "user.inventory");
//!
//! let input = json!({
//!     "user": {
//!         "name": "ada",
//!         "inventory": [{"name": "shoes", "amount": 1}, {"amount": 2}]
//!     }
//! });
//! mapper.map(&mut record, &input).unwrap();
//!
//! assert_eq!(record.errors(), ["user.inventory.1.name: value is required."]);
//! ```

pub mod cache;
pub mod collection;
pub mod error;
pub mod factory;
pub mod loader;
pub mod mapper;
pub mod path;
pub mod property;
pub mod record;
pub mod validator;

pub use cache::SchemaCache;
pub use collection::{Collection, Element};
pub use error::{DtoError, SchemaError, ValidationError};
pub use factory::{Factory, SchemaSource};
pub use loader::{FileLoader, MemoryLoader, SchemaLoader};
pub use mapper::{flatten_fields, flatten_properties, ArrayStep, Mapper};
pub use path::{DtoPath, PathSegment};
pub use property::{CompoundKind, ParentRef, Property, PropertyValue};
pub use record::Record;
pub use validator::{TypeTag, Validator, ValidatorKind};

/// Type alias for validation results using ValidationError
pub type ValidationResult<T> = stillwater::Validation<T, ValidationError>;
