//! Named, typed fields of a record.
//!
//! A [`Property`] is either a scalar leaf, an array backed by a [`Collection`],
//! or an object whose value is a nested [`Record`]. The declared [`TypeTag`]
//! fixes which [`PropertyValue`] variant the property may hold.

use indexmap::IndexMap;
use serde_json::Value;
use stillwater::Validation;

use crate::collection::Collection;
use crate::error::{DtoError, SchemaError, ValidationError};
use crate::path::DtoPath;
use crate::record::Record;
use crate::validator::{TypeTag, Validator, ValidatorKind};
use crate::ValidationResult;

/// The kind of compound node owning a property, record or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    Record,
    Collection,
}

/// Non-owning back-reference to the compound that owns a node.
///
/// The tree is owned top-down; a parent reference only records where the
/// owner sits so paths can be rebuilt. It is refreshed whenever a subtree is
/// attached, renamed or cloned into a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    path: DtoPath,
    kind: CompoundKind,
}

impl ParentRef {
    pub(crate) fn record(path: DtoPath) -> Self {
        Self {
            path,
            kind: CompoundKind::Record,
        }
    }

    pub(crate) fn collection(path: DtoPath) -> Self {
        Self {
            path,
            kind: CompoundKind::Collection,
        }
    }

    /// Qualified path of the owning compound, root name first.
    pub fn path(&self) -> &DtoPath {
        &self.path
    }

    /// The owner's name, the last segment of its path.
    pub fn name(&self) -> String {
        self.path
            .last()
            .map(|segment| segment.to_string())
            .unwrap_or_default()
    }

    /// Whether the owner is a record or a collection.
    pub fn kind(&self) -> CompoundKind {
        self.kind
    }
}

/// The value slot of a property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// A primitive value, or a raw list for arrays declared without `items`.
    Data(Value),
    /// The nested record of an `object` or `dto` property.
    Record(Record),
    /// The elements of an `array` property declared with `items`.
    Collection(Collection),
}

/// A named field with a declared type, validators and a value.
///
/// # Example
///
/// ```rust
/// use dtobind::{Property, TypeTag};
/// use serde_json::json;
///
/// let mut age = Property::new("age", TypeTag::Integer);
/// age.set_required(true);
/// age.set_value_range(Some(18.0), Some(100.0));
///
/// age.set_value(json!(150)).unwrap();
/// let result = age.validate();
/// assert!(result.is_failure());
/// assert_eq!(age.errors(), ["age: range validation failed."]);
/// ```
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    tag: TypeTag,
    required: bool,
    value: Option<PropertyValue>,
    validators: IndexMap<ValidatorKind, Validator>,
    errors: Vec<String>,
    parent: Option<ParentRef>,
}

impl Property {
    /// Creates an optional property of the given type with no value.
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        let mut property = Self {
            name: name.into(),
            tag,
            required: false,
            value: None,
            validators: IndexMap::new(),
            errors: Vec::new(),
            parent: None,
        };
        property.bind(Validator::Type(tag));
        property
    }

    /// Creates a property from a type tag as written in a schema.
    pub fn with_type(name: impl Into<String>, tag: &str) -> Result<Self, SchemaError> {
        let name = name.into();
        let tag = parse_tag(&name, tag)?;
        Ok(Self::new(name, tag))
    }

    /// Returns the property's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the property and refreshes the parent links below it.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if let Some(parent) = self.parent.clone() {
            self.attach(parent);
        }
    }

    /// Returns the declared type tag.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Rebinds the type, replacing the previous type validator.
    pub fn set_type(&mut self, tag: &str) -> Result<(), SchemaError> {
        let tag = parse_tag(&self.name, tag)?;
        self.tag = tag;
        self.bind(Validator::Type(tag));
        Ok(())
    }

    /// Returns true if a value must be present.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Marks the property as required or optional.
    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    /// Binds a string length validator, replacing any previous one.
    pub fn set_length_range(&mut self, min: Option<usize>, max: Option<usize>) {
        self.bind(Validator::Length { min, max });
    }

    /// Binds a numeric range validator, replacing any previous one.
    pub fn set_value_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.bind(Validator::Range { min, max });
    }

    /// Binds a regex validator, replacing any previous one.
    pub fn set_pattern(&mut self, pattern: &str) -> Result<(), regex::Error> {
        let validator = Validator::pattern(pattern)?;
        self.bind(validator);
        Ok(())
    }

    /// Returns the validator occupying `kind`, if any.
    pub fn validator(&self, kind: ValidatorKind) -> Option<&Validator> {
        self.validators.get(&kind)
    }

    /// Active validators in binding order.
    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    fn bind(&mut self, validator: Validator) {
        let kind = validator.kind();
        self.validators.shift_remove(&kind);
        self.validators.insert(kind, validator);
    }

    /// Returns the back-reference to the owning record or collection.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Qualified path of this property, root name first.
    pub fn path(&self) -> DtoPath {
        match &self.parent {
            Some(parent) => parent.path().child(&self.name),
            None => DtoPath::root().child(&self.name),
        }
    }

    /// Records `parent` as the owner and refreshes the subtree below.
    pub(crate) fn attach(&mut self, parent: ParentRef) {
        match &mut self.value {
            Some(PropertyValue::Record(record)) => record.attach(Some(parent.clone())),
            Some(PropertyValue::Collection(collection)) => {
                collection.attach(Some(parent.clone()))
            }
            _ => {}
        }
        self.parent = Some(parent);
    }

    /// Returns the current value, if any.
    pub fn value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    /// Mutable access to the current value.
    pub fn value_mut(&mut self) -> Option<&mut PropertyValue> {
        self.value.as_mut()
    }

    /// The plain value, if this property holds one.
    pub fn data(&self) -> Option<&Value> {
        match &self.value {
            Some(PropertyValue::Data(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the nested record of an object property.
    pub fn record(&self) -> Option<&Record> {
        match &self.value {
            Some(PropertyValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Mutable access to the nested record.
    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match &mut self.value {
            Some(PropertyValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Returns the collection of an array property declared with `items`.
    pub fn collection(&self) -> Option<&Collection> {
        match &self.value {
            Some(PropertyValue::Collection(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Mutable access to the collection.
    pub fn collection_mut(&mut self) -> Option<&mut Collection> {
        match &mut self.value {
            Some(PropertyValue::Collection(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Assigns a plain value.
    ///
    /// Object properties and arrays backed by a collection are structural and
    /// reject plain values with [`DtoError::TypeMismatch`].
    pub fn set_value(&mut self, value: Value) -> Result<(), DtoError> {
        match self.value {
            Some(PropertyValue::Record(_)) | Some(PropertyValue::Collection(_)) => {
                return Err(self.mismatch())
            }
            _ if self.tag.is_object() => return Err(self.mismatch()),
            _ => {}
        }
        self.value = Some(PropertyValue::Data(value));
        Ok(())
    }

    fn mismatch(&self) -> DtoError {
        DtoError::TypeMismatch {
            name: self.name.clone(),
            kind: self.tag.to_string(),
        }
    }

    pub(crate) fn set_record(&mut self, record: Record) {
        self.value = Some(PropertyValue::Record(record));
        if let Some(parent) = self.parent.clone() {
            self.attach(parent);
        }
    }

    pub(crate) fn set_collection(&mut self, collection: Collection) {
        self.value = Some(PropertyValue::Collection(collection));
        if let Some(parent) = self.parent.clone() {
            self.attach(parent);
        }
    }

    /// Returns true if the property holds a non-empty value.
    ///
    /// Nested records and collections count as present.
    pub fn has_value(&self) -> bool {
        match &self.value {
            None => false,
            Some(PropertyValue::Data(value)) => !is_empty(value),
            Some(_) => true,
        }
    }

    /// Errors from the most recent [`Property::validate`] call.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Validates this property on its own.
    ///
    /// A required property must hold a non-empty value; arrays additionally
    /// need at least one element. When that check fails, no other validator
    /// runs. Otherwise every active validator runs against a plain value.
    /// Nested records and collection elements are validated by the owning
    /// record, not here.
    pub fn validate(&mut self) -> ValidationResult<()> {
        self.errors.clear();

        if self.check_required() {
            if let Some(PropertyValue::Data(value)) = &self.value {
                if !is_empty(value) {
                    for validator in self.validators.values() {
                        if !validator.is_valid(value) {
                            self.errors
                                .push(format!("{}: {} validation failed.", self.name, validator));
                        }
                    }
                }
            }
        }

        match ValidationError::from_vec(self.name.clone(), self.errors.clone()) {
            Some(err) => Validation::Failure(err),
            None => Validation::Success(()),
        }
    }

    fn check_required(&mut self) -> bool {
        if !self.required {
            return true;
        }

        if self.tag.is_array() {
            let present = match &self.value {
                Some(PropertyValue::Collection(collection)) => !collection.is_empty(),
                Some(PropertyValue::Data(Value::Array(items))) => !items.is_empty(),
                _ => false,
            };
            if !present {
                self.errors
                    .push(format!("{}: array item is required.", self.name));
            }
            return present;
        }

        if !self.has_value() {
            self.errors.push(format!("{}: value is required.", self.name));
            return false;
        }
        true
    }

    /// Deep copy with every value reset, used to spawn collection elements.
    pub fn clone_subtree(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }

    pub(crate) fn reset(&mut self) {
        self.errors.clear();
        match &mut self.value {
            Some(PropertyValue::Record(record)) => record.reset(),
            Some(PropertyValue::Collection(collection)) => collection.reset(),
            _ => self.value = None,
        }
    }

    /// Projects this property as a `"name":value` JSON member.
    ///
    /// Scalars are always emitted as quoted strings.
    pub fn to_json(&self) -> String {
        let body = match &self.value {
            Some(PropertyValue::Record(record)) => record.to_json(),
            Some(PropertyValue::Collection(collection)) => collection.to_json(),
            Some(PropertyValue::Data(Value::Array(items))) if self.tag.is_array() => {
                let items: Vec<String> = items.iter().map(quote_value).collect();
                format!("[{}]", items.join(","))
            }
            Some(PropertyValue::Data(value)) => quote_value(value),
            None if self.tag.is_array() => "[]".to_string(),
            None => quote(""),
        };
        format!("{}:{}", quote(&self.name), body)
    }

    /// Projects the value with native JSON types.
    pub fn to_value(&self) -> Value {
        match &self.value {
            None => Value::Null,
            Some(PropertyValue::Data(value)) => value.clone(),
            Some(PropertyValue::Record(record)) => record.to_value(),
            Some(PropertyValue::Collection(collection)) => collection.to_value(),
        }
    }
}

fn parse_tag(property: &str, tag: &str) -> Result<TypeTag, SchemaError> {
    tag.parse().map_err(|tag| SchemaError::UnknownType {
        property: property.to_string(),
        tag,
    })
}

/// Absent, `null`, `""`, `[]` and `{}` are empty. `0` and `false` are not.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub(crate) fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Quotes the textual form of a value: strings as-is, `null` as empty.
pub(crate) fn quote_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Null => quote(""),
        other => quote(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure(result: ValidationResult<()>) -> ValidationError {
        result.into_result().unwrap_err()
    }

    #[test]
    fn test_new_property_defaults() {
        let property = Property::new("username", TypeTag::String);
        assert_eq!(property.name(), "username");
        assert!(!property.is_required());
        assert!(property.value().is_none());
        assert!(matches!(
            property.validator(ValidatorKind::Type),
            Some(Validator::Type(TypeTag::String))
        ));
    }

    #[test]
    fn test_with_type_rejects_unknown_tag() {
        let err = Property::with_type("age", "int").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref tag, .. } if tag == "int"));
    }

    #[test]
    fn test_set_type_replaces_type_validator() {
        let mut property = Property::new("id", TypeTag::String);
        property.set_type("integer").unwrap();
        property.set_type("uuid").unwrap();

        assert_eq!(property.tag(), TypeTag::Uuid);
        assert_eq!(property.validators().count(), 1);
        assert!(property.set_type("bogus").is_err());
        assert_eq!(property.tag(), TypeTag::Uuid);
    }

    #[test]
    fn test_configuration_replaces_rather_than_accumulates() {
        let mut property = Property::new("code", TypeTag::String);
        property.set_length_range(Some(1), Some(2));
        property.set_length_range(Some(3), None);
        property.set_pattern("^a").unwrap();
        property.set_pattern("^b").unwrap();

        assert_eq!(property.validators().count(), 3);
        property.set_value(json!("bcd")).unwrap();
        assert!(property.validate().is_success());
    }

    #[test]
    fn test_required_scalar_missing() {
        let mut property = Property::new("username", TypeTag::String);
        property.set_required(true);
        property.set_length_range(Some(3), Some(20));

        let err = failure(property.validate());
        assert_eq!(err.name(), "username");
        assert_eq!(err.into_vec(), vec!["username: value is required."]);
    }

    #[test]
    fn test_required_short_circuits_other_validators() {
        let mut property = Property::new("username", TypeTag::String);
        property.set_required(true);
        property.set_value(json!("")).unwrap();

        let err = failure(property.validate());
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_zero_and_false_are_present() {
        let mut count = Property::new("count", TypeTag::Integer);
        count.set_required(true);
        count.set_value(json!(0)).unwrap();
        assert!(count.validate().is_success());

        let mut flag = Property::new("active", TypeTag::Boolean);
        flag.set_required(true);
        flag.set_value(json!(false)).unwrap();
        assert!(flag.validate().is_success());
    }

    #[test]
    fn test_each_failing_validator_reports() {
        let mut property = Property::new("zip", TypeTag::Integer);
        property.set_length_range(Some(5), Some(5));
        property.set_pattern(r"^\d+$").unwrap();
        property.set_value(json!("9021a")).unwrap();

        let err = failure(property.validate());
        assert_eq!(
            err.into_vec(),
            vec![
                "zip: integer validation failed.".to_string(),
                "zip: pattern validation failed.".to_string(),
            ]
        );
    }

    #[test]
    fn test_optional_empty_value_skips_validators() {
        let mut property = Property::new("email", TypeTag::Email);
        property.set_value(json!("")).unwrap();
        assert!(property.validate().is_success());
    }

    #[test]
    fn test_revalidation_does_not_duplicate() {
        let mut property = Property::new("age", TypeTag::Integer);
        property.set_value(json!("x")).unwrap();

        let _ = property.validate();
        let _ = property.validate();
        assert_eq!(property.errors().len(), 1);
    }

    #[test]
    fn test_required_untyped_array() {
        let mut tags = Property::new("tags", TypeTag::Array);
        tags.set_required(true);

        for value in [json!([]), json!(null), json!("not_an_array")] {
            tags.set_value(value).unwrap();
            let err = failure(tags.validate());
            assert!(err.contains("tags: array item is required."));
        }

        tags.set_value(json!(["a"])).unwrap();
        assert!(tags.validate().is_success());
    }

    #[test]
    fn test_required_collection_array() {
        let template = Property::new("item", TypeTag::String);
        let mut tags = Property::new("tags", TypeTag::Array);
        tags.set_required(true);
        tags.set_collection(Collection::new("tags", template));

        let err = failure(tags.validate());
        assert_eq!(err.first(), "tags: array item is required.");

        let collection = tags.collection_mut().unwrap();
        let element = collection.spawn();
        collection.add_child(element);
        assert!(tags.validate().is_success());
    }

    #[test]
    fn test_structural_properties_reject_plain_values() {
        let mut address = Property::new("address", TypeTag::Object);
        address.set_record(Record::new("address"));
        assert!(matches!(
            address.set_value(json!("x")),
            Err(DtoError::TypeMismatch { .. })
        ));

        let mut inventory = Property::new("inventory", TypeTag::Array);
        inventory.set_collection(Collection::new(
            "inventory",
            Property::new("item", TypeTag::String),
        ));
        assert!(inventory.set_value(json!(["x"])).is_err());
    }

    #[test]
    fn test_clone_subtree_resets_value() {
        let mut property = Property::new("name", TypeTag::String);
        property.set_required(true);
        property.set_value(json!("shoes")).unwrap();
        let _ = property.set_type("name");

        let copy = property.clone_subtree();
        assert!(copy.value().is_none());
        assert!(copy.is_required());
        assert_eq!(copy.tag(), TypeTag::Name);
        assert_eq!(property.data(), Some(&json!("shoes")));
    }

    #[test]
    fn test_to_json_quotes_scalars() {
        let mut age = Property::new("age", TypeTag::Integer);
        assert_eq!(age.to_json(), r#""age":"""#);

        age.set_value(json!(40)).unwrap();
        assert_eq!(age.to_json(), r#""age":"40""#);

        let mut note = Property::new("note", TypeTag::String);
        note.set_value(json!("say \"hi\"")).unwrap();
        assert_eq!(note.to_json(), r#""note":"say \"hi\"""#);
    }

    #[test]
    fn test_to_value_keeps_native_types() {
        let mut age = Property::new("age", TypeTag::Integer);
        assert_eq!(age.to_value(), Value::Null);
        age.set_value(json!(40)).unwrap();
        assert_eq!(age.to_value(), json!(40));
    }

    #[test]
    fn test_path_without_parent() {
        let property = Property::new("age", TypeTag::Integer);
        assert!(property.parent().is_none());
        assert_eq!(property.path().to_string(), "age");
    }
}
