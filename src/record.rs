//! Compound records: named, ordered sets of properties.
//!
//! A [`Record`] is the root of a compiled schema and the value of every
//! `object` property. Validation walks the tree in declaration order and
//! bubbles messages upward, each record prefixing them with its own name so
//! the root ends up with fully qualified paths like `user.address.street`.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use stillwater::Validation;
use tracing::debug;

use crate::collection::Element;
use crate::error::{DtoError, ValidationError};
use crate::path::{DtoPath, PathSegment};
use crate::property::{ParentRef, Property, PropertyValue};
use crate::ValidationResult;

/// A named, ordered set of typed properties.
///
/// # Example
///
/// ```rust
/// use dtobind::{Property, Record, TypeTag};
/// use serde_json::json;
///
/// let mut user = Record::new("user");
/// let mut name = Property::new("username", TypeTag::String);
/// name.set_required(true);
/// user.insert(name);
/// user.insert(Property::new("age", TypeTag::Integer));
///
/// assert!(user.validate().is_failure());
/// assert_eq!(user.errors(), ["user.username: value is required."]);
///
/// user.set("username", json!("ada")).unwrap();
/// assert_eq!(user.get("username").unwrap(), json!("ada"));
/// ```
#[derive(Debug, Clone)]
pub struct Record {
    name: String,
    properties: IndexMap<String, Property>,
    errors: Vec<String>,
    parent: Option<ParentRef>,
}

impl Record {
    /// Creates an empty record with no parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: IndexMap::new(),
            errors: Vec::new(),
            parent: None,
        }
    }

    /// Returns the record's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the record and refreshes the parent links below it.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.attach(self.parent.clone());
    }

    /// Returns the back-reference to the owning property's container.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Qualified path of this record, root name first.
    pub fn path(&self) -> DtoPath {
        match &self.parent {
            Some(parent) => parent.path().child(&self.name),
            None => DtoPath::root().child(&self.name),
        }
    }

    pub(crate) fn attach(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
        let own = ParentRef::record(self.path());
        for property in self.properties.values_mut() {
            property.attach(own.clone());
        }
    }

    /// Adds a property, replacing any property with the same name in place.
    pub fn insert(&mut self, mut property: Property) {
        property.attach(ParentRef::record(self.path()));
        self.properties
            .insert(property.name().to_string(), property);
    }

    /// Returns true if the record declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Returns the property declared as `name`.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Mutable access to the property declared as `name`.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    /// Returns the number of declared properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if no property is declared.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Resolves a dotted path relative to this record.
    ///
    /// Field segments select properties, numeric segments select collection
    /// elements: `inventory.0.name`. Returns `None` for anything not present,
    /// including elements that were never created.
    pub fn property_at(&self, path: &str) -> Option<&Property> {
        let path = DtoPath::parse(path);
        let segments: Vec<&PathSegment> = path.segments().collect();
        find(self, &segments)
    }

    /// Mutable variant of [`Record::property_at`].
    pub fn property_at_mut(&mut self, path: &str) -> Option<&mut Property> {
        let path = DtoPath::parse(path);
        let segments: Vec<&PathSegment> = path.segments().collect();
        find_mut(self, &segments)
    }

    /// Returns the projected value of a property.
    pub fn get(&self, name: &str) -> Result<Value, DtoError> {
        self.property(name)
            .map(Property::to_value)
            .ok_or_else(|| DtoError::PropertyNotFound(name.to_string()))
    }

    /// Assigns a plain value to a property and validates it.
    ///
    /// The value stays assigned even when validation fails.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), DtoError> {
        let property = self
            .property_mut(name)
            .ok_or_else(|| DtoError::PropertyNotFound(name.to_string()))?;
        property.set_value(value)?;
        property.validate().into_result()?;
        Ok(())
    }

    /// Errors collected by the most recent validation, fully qualified.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Appends messages, each prefixed with `{name}.`.
    pub fn add_errors<I, S>(&mut self, errors: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for error in errors {
            self.errors.push(format!("{}.{}", self.name, error.as_ref()));
        }
    }

    /// Clears the collected error list.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Validates every property in declaration order.
    ///
    /// Never stops at the first failure: nested records, collection elements
    /// and scalars are all checked, and every message is merged into this
    /// record's error list before the combined result is returned.
    pub fn validate(&mut self) -> ValidationResult<()> {
        self.errors.clear();
        let mut collected = Vec::new();

        for property in self.properties.values_mut() {
            if let Some(record) = property.record_mut() {
                let _ = record.validate();
                collected.extend(record.errors().iter().cloned());
                continue;
            }

            if let Validation::Failure(err) = property.validate() {
                collected.extend(err);
            }

            if let Some(collection) = property.collection_mut() {
                collected.extend(collection.errors().iter().cloned());
                collected.extend(collection.validate_children());
            }
        }

        self.add_errors(collected);
        if self.parent.is_none() {
            for error in &self.errors {
                debug!(record = %self.name, error = %error, "validation error");
            }
        }

        match ValidationError::from_vec(self.name.clone(), self.errors.clone()) {
            Some(err) => Validation::Failure(err),
            None => Validation::Success(()),
        }
    }

    /// Deep copy with every value and error reset.
    pub fn clone_subtree(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }

    pub(crate) fn reset(&mut self) {
        self.errors.clear();
        for property in self.properties.values_mut() {
            property.reset();
        }
    }

    /// Projects the record as a JSON object with quoted scalars.
    ///
    /// A record where no property carries a value projects as `{}`.
    pub fn to_json(&self) -> String {
        if !self.properties.values().any(Property::has_value) {
            return "{}".to_string();
        }
        let members: Vec<String> = self.properties.values().map(Property::to_json).collect();
        format!("{{{}}}", members.join(","))
    }

    /// Projects the record with native JSON types, in declaration order.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, property)| (name.clone(), property.to_value()))
            .collect();
        Value::Object(map)
    }
}

fn find<'a>(record: &'a Record, segments: &[&PathSegment]) -> Option<&'a Property> {
    let (first, rest) = segments.split_first()?;
    let property = record.property(&first.to_string())?;
    descend(property, rest)
}

fn descend<'a>(property: &'a Property, segments: &[&PathSegment]) -> Option<&'a Property> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(property);
    };
    match (property.value()?, first) {
        (PropertyValue::Record(record), _) => find(record, segments),
        (PropertyValue::Collection(collection), PathSegment::Index(index)) => {
            match collection.child(*index)? {
                Element::Record(record) => find(record, rest),
                Element::Scalar(element) => descend(element, rest),
            }
        }
        _ => None,
    }
}

fn find_mut<'a>(record: &'a mut Record, segments: &[&PathSegment]) -> Option<&'a mut Property> {
    let (first, rest) = segments.split_first()?;
    let property = record.property_mut(&first.to_string())?;
    descend_mut(property, rest)
}

fn descend_mut<'a>(
    property: &'a mut Property,
    segments: &[&PathSegment],
) -> Option<&'a mut Property> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(property);
    };
    match (property.value_mut()?, first) {
        (PropertyValue::Record(record), _) => find_mut(record, segments),
        (PropertyValue::Collection(collection), PathSegment::Index(index)) => {
            match collection.child_mut(*index)? {
                Element::Record(record) => find_mut(record, rest),
                Element::Scalar(element) => descend_mut(element, rest),
            }
        }
        _ => None,
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<Record>();
    assert_sync::<Record>();
};
