//! Values and their bookkeeping wrapper.

use std::fmt;
use std::hash::Hash;

/// Trait for values stored in a sectioned collection.
///
/// Value equality is the only identity the engine uses: two equal values are
/// the same logical item. The section key groups values into sections;
/// sections are ordered by key, descending.
///
/// # Example
///
/// ```
/// use horizon_sections::SectionValue;
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// struct Contact {
///     name: String,
/// }
///
/// impl SectionValue for Contact {
///     type Key = char;
///
///     fn section_key(&self) -> char {
///         self.name.chars().next().unwrap_or('#')
///     }
/// }
/// ```
pub trait SectionValue: Clone + Eq + Hash + Send + Sync + 'static {
    /// The grouping key. Totally ordered.
    type Key: Ord + Clone + fmt::Debug + Send + Sync + 'static;

    /// Returns the key of the section this value belongs to.
    fn section_key(&self) -> Self::Key;
}

/// Pairs a value with the "added since the last pass" flag.
#[derive(Clone)]
pub struct ItemWrapper<T> {
    value: T,
    is_new: bool,
}

impl<T> ItemWrapper<T> {
    /// Wraps a freshly added value.
    pub fn new(value: T) -> Self {
        Self {
            value,
            is_new: true,
        }
    }

    /// Returns the wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Unwraps the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Whether the item was added since the last reconciliation pass.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Clears the new flag once the item has been reported to the view.
    pub fn mark_settled(&mut self) {
        self.is_new = false;
    }
}

impl<T: PartialEq> PartialEq for ItemWrapper<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for ItemWrapper<T> {}

impl<T: fmt::Debug> fmt::Debug for ItemWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_new {
            write!(f, "{:?}*", self.value)
        } else {
            write!(f, "{:?}", self.value)
        }
    }
}
