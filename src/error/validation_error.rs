//! Validation failure carrying every collected message.

use std::fmt::{self, Display};

use stillwater::prelude::*;

/// One or more constraint violations raised while validating a property or
/// record.
///
/// `ValidationError` wraps a `NonEmptyVec<String>` so a failure always carries
/// at least one message. Messages are already qualified with the name of the
/// node that produced them (`username: value is required.`); records re-prefix
/// them with their own name as they bubble up.
///
/// # Example
///
/// ```rust
/// use dtobind::ValidationError;
/// use stillwater::prelude::*;
///
/// let a = ValidationError::single("user", "user.name: value is required.");
/// let b = ValidationError::single("user", "user.age: range validation failed.");
///
/// let combined = a.combine(b);
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    name: String,
    errors: NonEmptyVec<String>,
}

impl ValidationError {
    /// Creates an error for `name` from a non-empty message list.
    pub fn new(name: impl Into<String>, errors: NonEmptyVec<String>) -> Self {
        Self {
            name: name.into(),
            errors,
        }
    }

    /// Creates an error holding a single message.
    pub fn single(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, NonEmptyVec::singleton(message.into()))
    }

    /// Creates an error from a message list, or `None` if the list is empty.
    pub fn from_vec(name: impl Into<String>, errors: Vec<String>) -> Option<Self> {
        NonEmptyVec::from_vec(errors).map(|errors| Self::new(name, errors))
    }

    /// The name of the property or record that failed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; a validation error holds at least one message.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the first message.
    pub fn first(&self) -> &str {
        self.errors.head()
    }

    /// Returns an iterator over the messages.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.errors.iter()
    }

    /// Returns true if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.errors.iter().any(|message| message.contains(needle))
    }

    /// Converts into the message list.
    pub fn into_vec(self) -> Vec<String> {
        self.errors.into_vec()
    }
}

impl Semigroup for ValidationError {
    fn combine(self, other: Self) -> Self {
        ValidationError {
            name: self.name,
            errors: self.errors.combine(other.errors),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation failed for {} with {} error(s):",
            self.name,
            self.len()
        )?;
        for (i, message) in self.errors.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl IntoIterator for ValidationError {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_vec().into_iter()
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationError>();
    assert_sync::<ValidationError>();
};
