//! Dotted paths through records and input data.
//!
//! Both sides of a binding are addressed the same way: dot-joined tokens
//! where a token made only of ASCII digits selects an array element. The
//! `name` field of the second `inventory` element reads `inventory.1.name`.

use std::fmt::{self, Display};

/// One token of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A property or input key, e.g. `street`.
    Field(String),
    /// An array position, e.g. `0`.
    Index(usize),
}

impl PathSegment {
    /// Classifies a raw token. Digit-only tokens that fit a `usize` are
    /// indices; anything else, `1a` or an overflowing number, is a field.
    pub fn parse(token: &str) -> Self {
        let digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
        match token.parse::<usize>() {
            Ok(index) if digits => PathSegment::Index(index),
            _ => PathSegment::Field(token.to_string()),
        }
    }

    /// Returns true for an array position.
    pub fn is_index(&self) -> bool {
        matches!(self, PathSegment::Index(_))
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A parsed dotted path.
///
/// # Example
///
/// ```rust
/// use dtobind::{DtoPath, PathSegment};
///
/// let path = DtoPath::parse("user.inventory.0.name");
/// assert!(path.has_index());
/// assert_eq!(path.len(), 4);
/// assert_eq!(path.last(), Some(&PathSegment::Field("name".into())));
/// assert_eq!(path.to_string(), "user.inventory.0.name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DtoPath {
    segments: Vec<PathSegment>,
}

impl DtoPath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Splits on `.`, dropping empty tokens so `a..b.` reads as `a.b`.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|token| !token.is_empty())
            .map(PathSegment::parse)
            .collect();
        Self { segments }
    }

    /// Returns this path extended by one token.
    pub fn child(&self, token: &str) -> Self {
        let mut child = self.clone();
        child.segments.push(PathSegment::parse(token));
        child
    }

    /// Iterates over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// True when some token selects an array element.
    pub fn has_index(&self) -> bool {
        self.segments.iter().any(PathSegment::is_index)
    }

    /// Returns the final segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the empty path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for DtoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens = self.segments.iter();
        if let Some(first) = tokens.next() {
            write!(f, "{}", first)?;
        }
        for token in tokens {
            write!(f, ".{}", token)?;
        }
        Ok(())
    }
}

impl From<&str> for DtoPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
