//! Position tracking for a single reorder pass.

use super::index::IndexPath;

/// Where an item was before a reorder pass and where it ended up.
///
/// Records only live for the duration of one pass. `to` starts equal to
/// `from` and is resolved once the item's post-sort position is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord<T> {
    value: T,
    from: IndexPath,
    to: IndexPath,
}

impl<T> MoveRecord<T> {
    /// Snapshot a value at its current position.
    pub fn new(value: T, from: IndexPath) -> Self {
        Self {
            value,
            from,
            to: from,
        }
    }

    /// The tracked value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Position before the pass.
    pub fn from(&self) -> IndexPath {
        self.from
    }

    /// Position after the pass.
    pub fn to(&self) -> IndexPath {
        self.to
    }

    /// Record the post-sort position.
    pub fn resolve(&mut self, to: IndexPath) {
        self.to = to;
    }

    /// Whether the item changed position.
    pub fn is_move(&self) -> bool {
        self.from != self.to
    }
}
