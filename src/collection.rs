//! Runtime containers for array properties.
//!
//! A [`Collection`] holds the elements of one array property plus the item
//! template every element is cloned from. Elements are never pre-allocated:
//! the mapper grows the collection as indexed input paths are discovered.

use indexmap::IndexMap;
use serde_json::Value;
use stillwater::Validation;

use crate::path::DtoPath;
use crate::property::{quote_value, ParentRef, Property, PropertyValue};
use crate::record::Record;

/// One element of a collection.
#[derive(Debug, Clone)]
pub enum Element {
    /// An element of an array of objects.
    Record(Record),
    /// An element of an array of scalars.
    Scalar(Property),
}

impl Element {
    /// Position-based name of the element.
    pub fn name(&self) -> &str {
        match self {
            Element::Record(record) => record.name(),
            Element::Scalar(property) => property.name(),
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            Element::Record(record) => record.set_name(name),
            Element::Scalar(property) => property.set_name(name),
        }
    }

    /// Returns the record if the collection holds objects.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Element::Record(record) => Some(record),
            Element::Scalar(_) => None,
        }
    }

    /// Mutable access to the element's record.
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Element::Record(record) => Some(record),
            Element::Scalar(_) => None,
        }
    }

    /// Returns the scalar property if the collection holds scalars.
    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Element::Scalar(property) => Some(property),
            Element::Record(_) => None,
        }
    }

    /// Mutable access to the element's scalar property.
    pub fn as_property_mut(&mut self) -> Option<&mut Property> {
        match self {
            Element::Scalar(property) => Some(property),
            Element::Record(_) => None,
        }
    }

    fn attach(&mut self, parent: ParentRef) {
        match self {
            Element::Record(record) => record.attach(Some(parent)),
            Element::Scalar(property) => property.attach(parent),
        }
    }

    /// Validates the element and returns its messages, qualified by the
    /// element's name.
    fn validate(&mut self) -> Vec<String> {
        match self {
            Element::Record(record) => {
                let _ = record.validate();
                record.errors().to_vec()
            }
            Element::Scalar(property) => match property.validate() {
                Validation::Success(()) => Vec::new(),
                Validation::Failure(err) => err.into_vec(),
            },
        }
    }

    fn to_json(&self) -> String {
        match self {
            Element::Record(record) => record.to_json(),
            Element::Scalar(property) => match property.data() {
                Some(value) => quote_value(value),
                None => quote_value(&Value::Null),
            },
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Element::Record(record) => record.to_value(),
            Element::Scalar(property) => property.to_value(),
        }
    }
}

/// A growable, homogeneous sequence of elements sharing one item template.
///
/// The optional cardinality range is a soft constraint: appending past the
/// maximum still appends, and records an error on the collection.
///
/// # Example
///
/// ```rust
/// use dtobind::{Collection, Property, TypeTag};
///
/// let mut tags = Collection::new("tags", Property::new("item", TypeTag::String));
/// tags.set_range(0, 1);
///
/// let first = tags.spawn();
/// tags.add_child(first);
/// let second = tags.spawn();
/// tags.add_child(second);
///
/// assert_eq!(tags.len(), 2);
/// assert_eq!(tags.errors().len(), 1);
/// assert!(tags.child(5).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    item_template: Box<Property>,
    children: Vec<Element>,
    bindings: IndexMap<usize, usize>,
    range: Option<(usize, usize)>,
    errors: Vec<String>,
    parent: Option<ParentRef>,
}

impl Collection {
    /// Creates an empty collection whose elements follow `item_template`.
    pub fn new(name: impl Into<String>, item_template: Property) -> Self {
        let mut collection = Self {
            name: name.into(),
            item_template: Box::new(item_template),
            children: Vec::new(),
            bindings: IndexMap::new(),
            range: None,
            errors: Vec::new(),
            parent: None,
        };
        collection.attach(None);
        collection
    }

    /// Returns the collection's name, which is its property's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the collection and refreshes the parent links below it.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.attach(self.parent.clone());
    }

    /// Returns the back-reference to the owning record or collection.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Qualified path of this collection, root name first.
    pub fn path(&self) -> DtoPath {
        match &self.parent {
            Some(parent) => parent.path().child(&self.name),
            None => DtoPath::root().child(&self.name),
        }
    }

    pub(crate) fn attach(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
        let own = ParentRef::collection(self.path());
        self.item_template.attach(own.clone());
        for child in &mut self.children {
            child.attach(own.clone());
        }
    }

    /// Returns the prototype every element is cloned from.
    pub fn item_template(&self) -> &Property {
        &self.item_template
    }

    /// Mutable access to the item template.
    pub fn item_template_mut(&mut self) -> &mut Property {
        &mut self.item_template
    }

    /// Returns true if elements are records, i.e. the template is an object.
    pub fn holds_records(&self) -> bool {
        matches!(self.item_template.value(), Some(PropertyValue::Record(_)))
    }

    /// Returns the configured `(min, max)` cardinality, if any.
    pub fn range(&self) -> Option<(usize, usize)> {
        self.range
    }

    /// Sets the cardinality range checked when elements are appended.
    pub fn set_range(&mut self, min: usize, max: usize) {
        self.range = Some((min, max));
    }

    /// Returns the cardinality errors raised so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Clears the cardinality errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Clones the item template into a fresh, value-less element.
    pub fn spawn(&self) -> Element {
        match self.item_template.record() {
            Some(record) => Element::Record(record.clone_subtree()),
            None => Element::Scalar(self.item_template.clone_subtree()),
        }
    }

    /// Appends an element and returns its position.
    ///
    /// The element is renamed after its position. Exceeding the configured
    /// maximum records an error but still appends.
    pub fn add_child(&mut self, mut element: Element) -> usize {
        if let Some((_, max)) = self.range {
            if self.children.len() >= max {
                self.errors.push(format!(
                    "{}: items would exceed the maximum range of {}.",
                    self.name, max
                ));
            }
        }

        let position = self.children.len();
        element.set_name(position.to_string());
        element.attach(ParentRef::collection(self.path()));
        self.children.push(element);
        position
    }

    /// Returns the element at `position`, or `None` when out of bounds.
    pub fn child(&self, position: usize) -> Option<&Element> {
        self.children.get(position)
    }

    /// Mutable access to the element at `position`.
    pub fn child_mut(&mut self, position: usize) -> Option<&mut Element> {
        self.children.get_mut(position)
    }

    /// Elements in position order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if no element has been created yet.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Position of the element bound to input index `index`, if any.
    pub fn bound(&self, index: usize) -> Option<usize> {
        self.bindings.get(&index).copied()
    }

    /// Returns the position of the element for input index `index`, growing
    /// the collection from the template when the index is new.
    ///
    /// An unbound index adopts the element at the same position when that
    /// element exists and no other index claimed it, so dense input keeps
    /// positions equal to indices and a repeated index reuses its element.
    pub fn bind(&mut self, index: usize) -> usize {
        if let Some(position) = self.bound(index) {
            return position;
        }

        let adoptable =
            index < self.children.len() && !self.bindings.values().any(|&p| p == index);
        let position = if adoptable {
            index
        } else {
            let element = self.spawn();
            self.add_child(element)
        };
        self.bindings.insert(index, position);
        position
    }

    /// Validates every element, returning messages qualified with this
    /// collection's name (`inventory.0.name: value is required.`).
    pub fn validate_children(&mut self) -> Vec<String> {
        let name = self.name.clone();
        self.children
            .iter_mut()
            .flat_map(|child| child.validate())
            .map(|error| format!("{}.{}", name, error))
            .collect()
    }

    pub(crate) fn reset(&mut self) {
        self.children.clear();
        self.bindings.clear();
        self.errors.clear();
        self.item_template.reset();
    }

    /// Projects the elements as a JSON array, scalars quoted.
    pub fn to_json(&self) -> String {
        let items: Vec<String> = self.children.iter().map(Element::to_json).collect();
        format!("[{}]", items.join(","))
    }

    /// Projects the elements with native JSON types.
    pub fn to_value(&self) -> Value {
        Value::Array(self.children.iter().map(Element::to_value).collect())
    }
}
