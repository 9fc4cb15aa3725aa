//! Index paths for addressing items in a sectioned collection.
//!
//! An `IndexPath` is a `(section, row)` pair. Paths are plain values: they
//! describe a position in one specific layout and go stale as soon as the
//! collection changes.

use std::fmt;

/// Represents the position of an item within a sectioned collection.
///
/// Paths order lexicographically: first by section, then by row.
///
/// # Example
///
/// ```
/// use horizon_sections::IndexPath;
///
/// let first = IndexPath::new(0, 3);
/// let second = IndexPath::new(1, 0);
/// assert!(first < second);
/// assert_eq!(first.to_string(), "[0, 3]");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IndexPath {
    section: usize,
    row: usize,
}

impl IndexPath {
    /// Creates a new index path.
    #[inline]
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }

    /// Returns the section index.
    #[inline]
    pub const fn section(&self) -> usize {
        self.section
    }

    /// Returns the row within the section.
    #[inline]
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Returns a path in the same section at a different row.
    #[inline]
    pub const fn with_row(&self, row: usize) -> Self {
        Self {
            section: self.section,
            row,
        }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, row): (usize, usize)) -> Self {
        Self::new(section, row)
    }
}
