//! Binding arbitrary nested input onto a compiled record.
//!
//! The [`Mapper`] flattens the input into dotted paths
//! (`user.inventory.0.name`), translates each path through its alias table
//! into a path of the record (`inventory.0.name`), and assigns the value.
//! Paths that address array elements grow the record's collections on
//! demand, so input arrays of any length bind without declaring a length in
//! the schema. After all input is consumed the record is validated and the
//! messages stay on the record for the caller to inspect.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::collection::{Collection, Element};
use crate::error::{DtoError, SchemaError};
use crate::loader::SchemaLoader;
use crate::path::{DtoPath, PathSegment};
use crate::property::{Property, PropertyValue};
use crate::record::Record;

/// Top-level key holding the alias table in map documents.
pub const MAP_ROOT_KEY: &str = "map";

/// Furthest an input index may reach past the end of an untyped array.
pub const MAX_RAW_GAP: usize = 1024;

/// One step into an array along an input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayStep {
    /// Record path of the array, after alias resolution.
    pub array_key: String,
    /// Input index of the element.
    pub index: usize,
    /// De-aliased dotted path of the field set within the element, up to the
    /// next index; empty when the array holds scalars directly.
    pub name: String,
}

/// Binds nested input data onto records through an alias table.
///
/// The alias table maps external input paths to record paths. Record paths
/// are relative to the root record (`address.street`); a leading segment
/// equal to the root's name is tolerated.
///
/// # Example
///
/// ```rust
/// use dtobind::{Factory, Mapper, SchemaCache};
/// use serde_json::json;
///
/// let mut record = Factory::new(json!({
///     "username": {"type": "string", "required": true, "length": {"min": 3, "max": 20}},
///     "age": {"type": "integer", "range": {"min": 18, "max": 100}}
/// }))
/// .with_cache(SchemaCache::new())
/// .create()
/// .unwrap();
///
/// let mapper = Mapper::new("signup")
///     .alias("username", "user.login")
///     .alias("age", "user.age");
///
/// mapper
///     .map(&mut record, &json!({"user": {"login": "ab", "age": 150}}))
///     .unwrap();
///
/// assert_eq!(
///     record.errors(),
///     [
///         "InlineDto.username: length validation failed.",
///         "InlineDto.age: range validation failed.",
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    name: String,
    aliases: IndexMap<String, String>,
    strict_mapping: bool,
    strict_errors: bool,
}

impl Mapper {
    /// Creates a mapper with no aliases and both strict modes off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds a mapper from a `{map: {external: internal}}` document.
    pub fn from_document(name: impl Into<String>, document: &Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let origin = Path::new(&name).to_path_buf();
        Self::from_map(name, document, &origin)
    }

    /// Loads a map document from `path`; the mapper is named after the
    /// file stem.
    pub fn load(path: impl AsRef<Path>, loader: &dyn SchemaLoader) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let document = loader.load(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_map(name, &document, path)
    }

    fn from_map(name: String, document: &Value, origin: &Path) -> Result<Self, SchemaError> {
        let entries = document
            .get(MAP_ROOT_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::MissingRoot {
                path: origin.to_path_buf(),
                key: MAP_ROOT_KEY.to_string(),
            })?;

        let mut mapper = Mapper::new(name);
        for (external, internal) in entries {
            let internal = internal
                .as_str()
                .ok_or_else(|| SchemaError::invalid(external.as_str(), "map target must be a string"))?;
            mapper.set_alias(internal, external.as_str());
        }
        Ok(mapper)
    }

    /// Returns the mapper's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the mapper.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Registers `external` as the input path for record path `internal`,
    /// builder style.
    pub fn alias(mut self, internal: impl Into<String>, external: impl Into<String>) -> Self {
        self.set_alias(internal, external);
        self
    }

    /// Registers `external` as the input path for record path `internal`.
    pub fn set_alias(&mut self, internal: impl Into<String>, external: impl Into<String>) {
        self.aliases.insert(external.into(), internal.into());
    }

    /// Returns the record path registered for an external path.
    pub fn get_alias(&self, external: &str) -> Option<&str> {
        self.aliases.get(external).map(String::as_str)
    }

    /// `(external, internal)` pairs in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(external, internal)| (external.as_str(), internal.as_str()))
    }

    /// Fail with [`DtoError::MapNotFound`] on input paths without an alias
    /// instead of skipping them.
    pub fn strict_mapping(mut self, strict: bool) -> Self {
        self.strict_mapping = strict;
        self
    }

    /// Returns true if unaliased input fails the mapping.
    pub fn is_strict_mapping(&self) -> bool {
        self.strict_mapping
    }

    /// Return the record's validation failure from [`Mapper::map`] instead of
    /// only leaving it on the record.
    pub fn strict_errors(mut self, strict: bool) -> Self {
        self.strict_errors = strict;
        self
    }

    /// Returns true if validation failures are returned from [`Mapper::map`].
    pub fn is_strict_errors(&self) -> bool {
        self.strict_errors
    }

    /// Binds `data` onto `record` and validates it.
    ///
    /// Validation messages are left on the record (see [`Record::errors`])
    /// whether or not they are returned. Hard failures are a missing alias
    /// under strict mapping and, under strict errors, a failed validation.
    pub fn map(&self, record: &mut Record, data: &Value) -> Result<(), DtoError> {
        debug!(mapper = %self.name, record = %record.name(), "mapping");
        record.clear_errors();
        self.check_aliases(record);

        for (key, value) in flatten_fields(data) {
            let result = if DtoPath::parse(&key).has_index() {
                self.map_indexed(record, &key, value)
            } else {
                self.map_scalar(record, &key, value)
            };

            match result {
                Ok(()) => trace!(key = %key, "mapped"),
                Err(err @ DtoError::MapNotFound(_)) if self.strict_mapping => return Err(err),
                Err(err) => warn!(key = %key, error = %err, "skipping input field"),
            }
        }

        let result = record.validate();
        debug!(
            record = %record.name(),
            errors = record.errors().len(),
            "mapping complete"
        );
        if self.strict_errors {
            result.into_result()?;
        }
        Ok(())
    }

    fn check_aliases(&self, record: &Record) {
        let declared = flatten_properties(record);
        for (external, internal) in &self.aliases {
            if !declared.contains_key(relative(record, internal)) {
                warn!(alias = %external, target = %internal, "alias targets an undeclared property");
            }
        }
    }

    /// Decomposes an indexed input path into its array steps.
    ///
    /// The array key of the first step must have an alias. Element field
    /// paths run up to the next index and are de-aliased through
    /// `{array key}.{field path}` when such an alias exists, kept as written
    /// otherwise.
    pub fn array_path(&self, key: &str) -> Result<Vec<ArrayStep>, DtoError> {
        let path = DtoPath::parse(key);
        let segments: Vec<&PathSegment> = path.segments().collect();
        let mut steps = Vec::new();
        let mut array_key = String::new();

        for (position, segment) in segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) => {
                    if !array_key.is_empty() {
                        array_key.push('.');
                    }
                    array_key.push_str(name);
                }
                PathSegment::Index(index) => {
                    let internal_key = match self.get_alias(&array_key) {
                        Some(internal) => internal.to_string(),
                        None if steps.is_empty() => {
                            return Err(DtoError::MapNotFound(array_key));
                        }
                        None => array_key.clone(),
                    };

                    let fields: Vec<&str> = segments[position + 1..]
                        .iter()
                        .map_while(|segment| match segment {
                            PathSegment::Field(field) => Some(field.as_str()),
                            PathSegment::Index(_) => None,
                        })
                        .collect();
                    let name = self.element_field(&array_key, &internal_key, &fields);

                    steps.push(ArrayStep {
                        array_key: internal_key,
                        index: *index,
                        name,
                    });
                }
            }
        }
        Ok(steps)
    }

    /// Translates the field path inside an element of `array_key`.
    fn element_field(&self, array_key: &str, internal_key: &str, fields: &[&str]) -> String {
        if fields.is_empty() {
            return String::new();
        }
        let field = fields.join(".");
        let Some(internal) = self.get_alias(&format!("{}.{}", array_key, field)) else {
            return field;
        };

        match internal
            .strip_prefix(internal_key)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(rest) if !rest.is_empty() => rest.to_string(),
            _ => {
                let tokens: Vec<&str> = internal.split('.').collect();
                tokens[tokens.len().saturating_sub(fields.len())..].join(".")
            }
        }
    }

    fn map_indexed(&self, record: &mut Record, key: &str, value: Value) -> Result<(), DtoError> {
        let steps = self.array_path(key)?;
        let first = steps
            .first()
            .ok_or_else(|| DtoError::MapNotFound(key.to_string()))?;

        let array_key = relative(record, &first.array_key).to_string();
        let property = record
            .property_at_mut(&array_key)
            .ok_or_else(|| DtoError::MapNotFound(first.array_key.clone()))?;
        assign_steps(property, &steps, value)
    }

    fn map_scalar(&self, record: &mut Record, key: &str, value: Value) -> Result<(), DtoError> {
        let internal = self.get_alias(key).ok_or_else(|| {
            DtoError::MapNotFound(key.to_string())
        })?;
        let internal = relative(record, internal).to_string();
        let segments: Vec<&str> = internal.split('.').filter(|s| !s.is_empty()).collect();

        assign_field(record, &segments, value).map_err(|err| match err {
            DtoError::MapNotFound(_) => DtoError::MapNotFound(key.to_string()),
            other => other,
        })
    }
}

/// Strips a leading segment naming the root record itself.
fn relative<'a>(record: &Record, internal: &'a str) -> &'a str {
    match internal.split_once('.') {
        Some((head, rest)) if head == record.name() && !record.contains(head) => rest,
        _ => internal,
    }
}

/// Walks the array steps from `property`, binding or growing one element per
/// step, and assigns `value` at the end.
fn assign_steps(property: &mut Property, steps: &[ArrayStep], value: Value) -> Result<(), DtoError> {
    let Some((step, rest)) = steps.split_first() else {
        return property.set_value(value);
    };
    trace!(array = %step.array_key, index = step.index, name = %step.name, "array step");

    let collection = match property.value_mut() {
        Some(PropertyValue::Collection(collection)) => collection,
        _ => return write_raw(property, step, rest, value),
    };

    check_shape(collection, step)?;
    let position = collection.bind(step.index);
    let element = collection
        .child_mut(position)
        .ok_or_else(|| DtoError::MapNotFound(step.array_key.clone()))?;

    let target = match element {
        Element::Record(record) => record
            .property_at_mut(&step.name)
            .ok_or_else(|| DtoError::PropertyNotFound(step.name.clone()))?,
        Element::Scalar(scalar) => scalar,
    };
    assign_steps(target, rest, value)
}

/// Refuses steps whose element field the item template does not declare, so
/// that unknown fields never grow the collection.
fn check_shape(collection: &Collection, step: &ArrayStep) -> Result<(), DtoError> {
    let declared = match collection.item_template().record() {
        Some(template) => !step.name.is_empty() && template.property_at(&step.name).is_some(),
        None => step.name.is_empty(),
    };
    if declared {
        Ok(())
    } else {
        Err(DtoError::PropertyNotFound(format!(
            "{}.{}",
            step.array_key, step.name
        )))
    }
}

/// Writes into an array declared without `items`.
///
/// The remaining input path is rebuilt inside the raw list: field segments
/// become nested objects and index segments nested lists, with skipped
/// positions padded with `null`.
fn write_raw(
    property: &mut Property,
    step: &ArrayStep,
    rest: &[ArrayStep],
    value: Value,
) -> Result<(), DtoError> {
    if !property.tag().is_array() {
        return Err(DtoError::TypeMismatch {
            name: property.name().to_string(),
            kind: property.tag().to_string(),
        });
    }

    let mut segments = Vec::new();
    for step in std::iter::once(step).chain(rest) {
        segments.push(PathSegment::Index(step.index));
        segments.extend(
            step.name
                .split('.')
                .filter(|field| !field.is_empty())
                .map(|field| PathSegment::Field(field.to_string())),
        );
    }

    let mut items = match property.data() {
        Some(items @ Value::Array(_)) => items.clone(),
        _ => Value::Array(Vec::new()),
    };
    write_value(property.name(), &mut items, &segments, value)?;
    property.set_value(items)
}

fn write_value(
    name: &str,
    node: &mut Value,
    segments: &[PathSegment],
    value: Value,
) -> Result<(), DtoError> {
    let Some((segment, rest)) = segments.split_first() else {
        *node = value;
        return Ok(());
    };

    match segment {
        PathSegment::Field(field) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            match node.as_object_mut() {
                Some(fields) => {
                    let slot = fields.entry(field.clone()).or_insert(Value::Null);
                    write_value(name, slot, rest, value)
                }
                None => Ok(()),
            }
        }
        PathSegment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let out_of_range = || DtoError::IndexOutOfRange {
                name: name.to_string(),
                index: *index,
            };
            let items = node.as_array_mut().ok_or_else(out_of_range)?;
            if index.saturating_sub(items.len()) > MAX_RAW_GAP {
                return Err(out_of_range());
            }
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            let slot = items.get_mut(*index).ok_or_else(out_of_range)?;
            write_value(name, slot, rest, value)
        }
    }
}

/// Assigns a value at a record path without indices.
///
/// A path that passes through a collection targets a field of its item
/// template: the first element whose field is still unset receives the
/// value, otherwise a new element is grown for it.
fn assign_field(record: &mut Record, segments: &[&str], value: Value) -> Result<(), DtoError> {
    let (first, rest) = segments
        .split_first()
        .ok_or_else(|| DtoError::MapNotFound(String::new()))?;
    let property = record
        .property_mut(first)
        .ok_or_else(|| DtoError::MapNotFound(first.to_string()))?;

    match property.value_mut() {
        Some(PropertyValue::Record(nested)) if !rest.is_empty() => {
            assign_field(nested, rest, value)
        }
        Some(PropertyValue::Collection(collection)) => fill_first_unset(collection, rest, value),
        _ if rest.is_empty() => property.set_value(value),
        _ => Err(DtoError::MapNotFound(segments.join("."))),
    }
}

fn fill_first_unset(collection: &mut Collection, rest: &[&str], value: Value) -> Result<(), DtoError> {
    let field = rest.join(".");
    let declared = match collection.item_template().record() {
        Some(template) => !rest.is_empty() && template.property_at(&field).is_some(),
        None => rest.is_empty(),
    };
    if !declared {
        return Err(DtoError::MapNotFound(format!("{}.{}", collection.name(), field)));
    }

    let unset = collection.children().iter().position(|element| {
        element_target(element, &field).map_or(false, |target| !target.has_value())
    });
    let position = match unset {
        Some(position) => position,
        None => {
            let element = collection.spawn();
            collection.add_child(element)
        }
    };

    let missing = DtoError::MapNotFound(format!("{}.{}", collection.name(), field));
    let target = match collection.child_mut(position) {
        Some(Element::Record(record)) => record.property_at_mut(&field),
        Some(Element::Scalar(scalar)) => Some(scalar),
        None => None,
    }
    .ok_or(missing)?;
    target.set_value(value)
}

fn element_target<'a>(element: &'a Element, field: &str) -> Option<&'a Property> {
    match element {
        Element::Record(record) => record.property_at(field),
        Element::Scalar(scalar) => Some(scalar),
    }
}

/// Flattens nested input into `dotted.path -> leaf` pairs, depth first.
///
/// List positions become numeric segments. Empty maps and lists contribute
/// nothing; a bare top-level scalar has no path and is dropped.
///
/// ```rust
/// use dtobind::flatten_fields;
/// use serde_json::json;
///
/// let fields = flatten_fields(&json!({"user": {"tags": ["a", "b"], "age": 40}}));
/// let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
/// assert_eq!(keys, ["user.tags.0", "user.tags.1", "user.age"]);
/// ```
pub fn flatten_fields(data: &Value) -> IndexMap<String, Value> {
    let mut fields = IndexMap::new();
    flatten_value(data, None, &mut fields);
    fields
}

fn flatten_value(value: &Value, prefix: Option<&str>, fields: &mut IndexMap<String, Value>) {
    let join = |key: &str| match prefix {
        Some(prefix) => format!("{}.{}", prefix, key),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_value(child, Some(&join(key)), fields);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_value(child, Some(&join(&index.to_string())), fields);
            }
        }
        leaf => {
            if let Some(prefix) = prefix {
                fields.insert(prefix.to_string(), leaf.clone());
            }
        }
    }
}

/// Flattens a record into `record path -> property`, depth first.
///
/// Nested records and object item templates contribute their own fields, so
/// `inventory.name` addresses the `name` field of every inventory element.
/// Arrays of arrays are not addressable below the outer array.
pub fn flatten_properties(record: &Record) -> IndexMap<String, &Property> {
    let mut properties = IndexMap::new();
    flatten_record(record, None, &mut properties);
    properties
}

fn flatten_record<'a>(
    record: &'a Record,
    prefix: Option<&str>,
    properties: &mut IndexMap<String, &'a Property>,
) {
    for property in record.properties() {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, property.name()),
            None => property.name().to_string(),
        };
        properties.insert(key.clone(), property);

        match property.value() {
            Some(PropertyValue::Record(nested)) => flatten_record(nested, Some(&key), properties),
            Some(PropertyValue::Collection(collection)) => {
                let template = collection.item_template();
                if let Some(nested) = template.record() {
                    flatten_record(nested, Some(&key), properties);
                } else if template.tag().is_array() {
                    warn!(property = %key, "arrays of arrays are not supported");
                }
            }
            _ => {}
        }
    }
}
