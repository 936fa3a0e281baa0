//! Compiling schema descriptions into record trees.
//!
//! A schema is a named set of property descriptors:
//!
//! ```yaml
//! dto:
//!   username:
//!     type: string
//!     required: true
//!     length: { min: 3, max: 20 }
//!   address:
//!     type: dto
//!     ref: address.yaml
//!   inventory:
//!     type: array
//!     max: 10
//!     items:
//!       type: object
//!       properties:
//!         name: { type: string }
//!         amount: { type: integer }
//! ```
//!
//! [`Factory::create`] turns it into a [`Record`]. `object` descriptors become
//! nested records, `array` descriptors with `items` become collections holding
//! an item template, and `dto` descriptors pull in another schema file.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cache::{normalize, SchemaCache};
use crate::collection::Collection;
use crate::error::SchemaError;
use crate::loader::{FileLoader, SchemaLoader};
use crate::property::Property;
use crate::record::Record;
use crate::validator::TypeTag;

/// Top-level key holding the property set in schema files.
pub const SCHEMA_ROOT_KEY: &str = "dto";

/// Record name used for in-memory schemas that do not name themselves.
pub const INLINE_NAME: &str = "InlineDto";

/// Default bound on nested `dto` references.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Where a schema description comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A YAML or JSON file with the property set under `dto`. The record is
    /// named after the file stem.
    File(PathBuf),
    /// An in-memory description, either `{name?, properties}` or a flat
    /// property set.
    Inline(Value),
}

impl From<PathBuf> for SchemaSource {
    fn from(path: PathBuf) -> Self {
        SchemaSource::File(path)
    }
}

impl From<&Path> for SchemaSource {
    fn from(path: &Path) -> Self {
        SchemaSource::File(path.to_path_buf())
    }
}

impl From<Value> for SchemaSource {
    fn from(value: Value) -> Self {
        SchemaSource::Inline(value)
    }
}

/// Compiles a schema description into a fresh [`Record`].
///
/// Referenced schemas are compiled once per cache and copied for every
/// consumer. By default the process-wide [`SchemaCache::global`] and a
/// [`FileLoader`] are used.
///
/// # Example
///
/// ```rust
/// use dtobind::{Factory, SchemaCache};
/// use serde_json::json;
///
/// let record = Factory::new(json!({
///     "name": "user",
///     "properties": {
///         "username": {"type": "string", "required": true},
///         "age": {"type": "integer", "range": {"min": 18, "max": 100}}
///     }
/// }))
/// .with_cache(SchemaCache::new())
/// .create()
/// .unwrap();
///
/// assert_eq!(record.name(), "user");
/// assert!(record.property("username").unwrap().is_required());
/// assert!(!record.property("age").unwrap().is_required());
/// ```
pub struct Factory {
    source: SchemaSource,
    cache: SchemaCache,
    loader: Arc<dyn SchemaLoader>,
    max_depth: usize,
    depth: usize,
}

impl Factory {
    /// Creates a compiler for `source` using the global cache and the filesystem loader.
    pub fn new(source: impl Into<SchemaSource>) -> Self {
        Self {
            source: source.into(),
            cache: SchemaCache::global().clone(),
            loader: Arc::new(FileLoader),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Uses `cache` for referenced schemas instead of the global cache.
    pub fn with_cache(mut self, cache: SchemaCache) -> Self {
        self.cache = cache;
        self
    }

    /// Reads schema files through `loader`.
    pub fn with_loader(mut self, loader: impl SchemaLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Sets how many `dto` references may be nested before compilation
    /// fails with [`SchemaError::MaxDepthExceeded`].
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Returns the schema source this factory compiles.
    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    /// Compiles the source into a new record tree.
    pub fn create(&self) -> Result<Record, SchemaError> {
        match &self.source {
            SchemaSource::File(path) => {
                debug!(path = %path.display(), "compiling schema file");
                let document = self.loader.load(path)?;
                let properties =
                    document
                        .get(SCHEMA_ROOT_KEY)
                        .ok_or_else(|| SchemaError::MissingRoot {
                            path: path.clone(),
                            key: SCHEMA_ROOT_KEY.to_string(),
                        })?;
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.compile_record(&name, properties)
            }
            SchemaSource::Inline(value) => {
                let structured = value.get("properties").filter(|p| p.is_object());
                match structured {
                    Some(properties) => {
                        let name = value
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or(INLINE_NAME);
                        self.compile_record(name, properties)
                    }
                    None => self.compile_record(INLINE_NAME, value),
                }
            }
        }
    }

    fn compile_record(&self, name: &str, properties: &Value) -> Result<Record, SchemaError> {
        let descriptors = properties.as_object().ok_or_else(|| {
            SchemaError::invalid(name, "expected a map of property descriptors")
        })?;

        let mut record = Record::new(name);
        for (property_name, descriptor) in descriptors {
            record.insert(self.compile_property(property_name, descriptor)?);
        }
        Ok(record)
    }

    fn compile_property(&self, name: &str, descriptor: &Value) -> Result<Property, SchemaError> {
        let descriptor = descriptor
            .as_object()
            .ok_or_else(|| SchemaError::invalid(name, "expected a property descriptor map"))?;

        let tag = descriptor
            .get("type")
            .ok_or_else(|| SchemaError::MissingType {
                property: name.to_string(),
            })?
            .as_str()
            .ok_or_else(|| SchemaError::invalid(name, "'type' must be a string"))?;
        let mut property = Property::with_type(name, tag)?;

        if let Some(required) = descriptor.get("required") {
            let required = required
                .as_bool()
                .ok_or_else(|| SchemaError::invalid(name, "'required' must be a boolean"))?;
            property.set_required(required);
        }

        match property.tag() {
            TypeTag::Object => {
                let properties =
                    descriptor
                        .get("properties")
                        .ok_or_else(|| SchemaError::MissingProperties {
                            property: name.to_string(),
                        })?;
                property.set_record(self.compile_record(name, properties)?);
            }
            TypeTag::Dto => {
                let reference = descriptor
                    .get("ref")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaError::MissingRef {
                        property: name.to_string(),
                    })?;
                let mut record = self.load_reference(reference)?;
                record.set_name(name);
                property.set_record(record);
            }
            TypeTag::Array => {
                if let Some(items) = descriptor.get("items") {
                    let template = self.compile_property("item", items)?;
                    let mut collection = Collection::new(name, template);
                    if let Some(max) = descriptor.get("max") {
                        let max = bound_usize(name, "max", max)?;
                        collection.set_range(0, max);
                    }
                    property.set_collection(collection);
                }
            }
            _ => {}
        }

        if let Some(length) = descriptor.get("length") {
            let (min, max) = bounds(name, "length", length)?;
            let min = min.map(|v| bound_usize(name, "length", v)).transpose()?;
            let max = max.map(|v| bound_usize(name, "length", v)).transpose()?;
            property.set_length_range(min, max);
        }

        if let Some(range) = descriptor.get("range") {
            let (min, max) = bounds(name, "range", range)?;
            let min = min.map(|v| bound_f64(name, v)).transpose()?;
            let max = max.map(|v| bound_f64(name, v)).transpose()?;
            property.set_value_range(min, max);
        }

        if let Some(pattern) = descriptor.get("pattern") {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| SchemaError::invalid(name, "'pattern' must be a string"))?;
            property
                .set_pattern(pattern)
                .map_err(|source| SchemaError::InvalidPattern {
                    property: name.to_string(),
                    source,
                })?;
        }

        Ok(property)
    }

    fn load_reference(&self, reference: &str) -> Result<Record, SchemaError> {
        let path = self.resolve_reference(reference);

        if let Some(record) = self.cache.get(&path) {
            trace!(path = %path.display(), "schema cache hit");
            return Ok(record);
        }

        if self.depth >= self.max_depth {
            return Err(SchemaError::MaxDepthExceeded {
                path,
                depth: self.max_depth,
            });
        }

        debug!(path = %path.display(), depth = self.depth + 1, "compiling referenced schema");
        let nested = Factory {
            source: SchemaSource::File(path.clone()),
            cache: self.cache.clone(),
            loader: Arc::clone(&self.loader),
            max_depth: self.max_depth,
            depth: self.depth + 1,
        };
        let record = nested.create()?;
        Ok(self.cache.insert(path, record))
    }

    /// Relative references resolve against the directory of the schema file
    /// being compiled. In-memory sources use the reference as given.
    fn resolve_reference(&self, reference: &str) -> PathBuf {
        let path = match &self.source {
            SchemaSource::File(source) if !is_absolute(reference) => source
                .parent()
                .map(|dir| dir.join(reference))
                .unwrap_or_else(|| PathBuf::from(reference)),
            _ => PathBuf::from(reference),
        };
        normalize(&path)
    }
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    let windows_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\');
    path.starts_with('/') || windows_drive
}

fn bounds<'a>(
    property: &str,
    key: &str,
    value: &'a Value,
) -> Result<(Option<&'a Value>, Option<&'a Value>), SchemaError> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| SchemaError::invalid(property, format!("'{}' must be a map", key)))?;
    let get = |bound: &str| map.get(bound).filter(|v| !v.is_null());
    Ok((get("min"), get("max")))
}

fn bound_usize(property: &str, key: &str, value: &Value) -> Result<usize, SchemaError> {
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            SchemaError::invalid(
                property,
                format!("'{}' bounds must be non-negative integers", key),
            )
        })
}

fn bound_f64(property: &str, value: &Value) -> Result<f64, SchemaError> {
    value
        .as_f64()
        .ok_or_else(|| SchemaError::invalid(property, "'range' bounds must be numbers"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::validator::{Validator, ValidatorKind};
    use serde_json::json;

    fn factory(source: Value) -> Factory {
        Factory::new(source).with_cache(SchemaCache::new())
    }

    #[test]
    fn test_flat_inline_source() {
        let record = factory(json!({"name": {"type": "string"}}))
            .create()
            .unwrap();
        assert_eq!(record.name(), INLINE_NAME);
        assert!(record.contains("name"));
    }

    #[test]
    fn test_structured_inline_without_name() {
        let record = factory(json!({"properties": {"id": {"type": "uuid"}}}))
            .create()
            .unwrap();
        assert_eq!(record.name(), INLINE_NAME);
        assert_eq!(record.property("id").unwrap().tag(), TypeTag::Uuid);
    }

    #[test]
    fn test_validators_compiled() {
        let record = factory(json!({
            "zip": {
                "type": "string",
                "length": {"min": 5},
                "range": {"max": 99999},
                "pattern": "^\\d+$"
            }
        }))
        .create()
        .unwrap();

        let zip = record.property("zip").unwrap();
        assert!(matches!(
            zip.validator(ValidatorKind::Length),
            Some(Validator::Length { min: Some(5), max: None })
        ));
        assert!(matches!(
            zip.validator(ValidatorKind::Range),
            Some(Validator::Range { min: None, max: Some(_) })
        ));
        assert!(zip.validator(ValidatorKind::Pattern).is_some());
    }

    #[test]
    fn test_array_with_max() {
        let record = factory(json!({
            "tags": {"type": "array", "max": 3, "items": {"type": "string"}}
        }))
        .create()
        .unwrap();

        let collection = record.property("tags").unwrap().collection().unwrap();
        assert_eq!(collection.range(), Some((0, 3)));
        assert_eq!(collection.item_template().name(), "item");
        assert!(!collection.holds_records());
    }

    #[test]
    fn test_untyped_array_has_no_collection() {
        let record = factory(json!({"tags": {"type": "array"}})).create().unwrap();
        let tags = record.property("tags").unwrap();
        assert!(tags.collection().is_none());
        assert!(tags.value().is_none());
    }

    #[test]
    fn test_descriptor_errors() {
        let cases = [
            (json!({"age": {"type": "int"}}), "invalid type 'int'"),
            (json!({"age": {"required": true}}), "missing 'type'"),
            (json!({"age": {"type": "dto"}}), "requires a 'ref' parameter"),
            (json!({"age": {"type": "object"}}), "requires a 'properties' map"),
            (json!({"age": {"type": "string", "pattern": "("}}), "invalid pattern"),
            (json!({"age": {"type": "string", "length": 3}}), "'length' must be a map"),
            (json!({"age": "string"}), "expected a property descriptor map"),
        ];

        for (source, expected) in cases {
            let err = factory(source).create().unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{} does not contain {}",
                err,
                expected
            );
        }
    }

    #[test]
    fn test_reference_resolves_relative_to_file() {
        let loader = MemoryLoader::new()
            .with_document(
                "schemas/user.yaml",
                json!({"dto": {"address": {"type": "dto", "ref": "address.yaml"}}}),
            )
            .with_document(
                "schemas/address.yaml",
                json!({"dto": {"street": {"type": "string"}}}),
            );
        let cache = SchemaCache::new();

        let record = Factory::new(PathBuf::from("schemas/user.yaml"))
            .with_loader(loader)
            .with_cache(cache.clone())
            .create()
            .unwrap();

        assert_eq!(record.name(), "user");
        let address = record.property("address").unwrap().record().unwrap();
        assert_eq!(address.name(), "address");
        assert!(address.contains("street"));
        assert!(cache.contains(Path::new("schemas/address.yaml")));
    }

    #[test]
    fn test_dotted_references_share_a_cache_entry() {
        let loader = MemoryLoader::new()
            .with_document(
                "schemas/user.yaml",
                json!({"dto": {
                    "home": {"type": "dto", "ref": "./address.yaml"},
                    "work": {"type": "dto", "ref": "nested/../address.yaml"}
                }}),
            )
            .with_document(
                "schemas/address.yaml",
                json!({"dto": {"street": {"type": "string"}}}),
            );
        let cache = SchemaCache::new();

        let record = Factory::new(PathBuf::from("schemas/user.yaml"))
            .with_loader(loader)
            .with_cache(cache.clone())
            .create()
            .unwrap();

        assert!(record.property("home").unwrap().record().is_some());
        assert!(record.property("work").unwrap().record().is_some());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(Path::new("schemas/address.yaml")));
    }

    #[test]
    fn test_missing_root_key() {
        let loader = MemoryLoader::new().with_document("bad.yaml", json!({"map": {}}));
        let err = Factory::new(PathBuf::from("bad.yaml"))
            .with_loader(loader)
            .with_cache(SchemaCache::new())
            .create()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingRoot { ref key, .. } if key == "dto"));
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/etc/schemas/a.yaml"));
        assert!(is_absolute("C:\\schemas\\a.yaml"));
        assert!(is_absolute("d:/schemas/a.yaml"));
        assert!(!is_absolute("schemas/a.yaml"));
        assert!(!is_absolute("a.yaml"));
    }
}
