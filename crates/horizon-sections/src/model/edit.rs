//! Edit scripts: the primitive view operations derived from one pass.
//!
//! Scripts use batch semantics, the same convention animated collection views
//! use for batched updates:
//!
//! - removal indices and move sources address the layout *before* the batch;
//! - insertion indices and move destinations address the layout *after* it.
//!
//! Every script the store produces follows this convention, so a view can
//! hand a whole script to one animated batch.

use std::fmt;

use super::index::IndexPath;
use crate::view::AnimatableView;

/// One primitive view operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edit {
    /// Insert a section at the given post-batch index.
    InsertSection(usize),
    /// Remove the section at the given pre-batch index.
    RemoveSection(usize),
    /// Insert an item at the given post-batch path.
    InsertItem(IndexPath),
    /// Remove the item at the given pre-batch path.
    RemoveItem(IndexPath),
    /// Move an item from a pre-batch path to a post-batch path.
    ///
    /// Moves in one script describe a single permutation and must be handed
    /// to the view in one batch. Applying them one after another, each
    /// against the layout left by the previous one, does not reproduce the
    /// new order.
    MoveItem {
        /// Source path.
        from: IndexPath,
        /// Destination path.
        to: IndexPath,
    },
}

impl Edit {
    /// Issue this edit to a view.
    pub fn apply_to(&self, view: &dyn AnimatableView) {
        match *self {
            Self::InsertSection(index) => view.insert_section(index),
            Self::RemoveSection(index) => view.remove_section(index),
            Self::InsertItem(path) => view.insert_item(path),
            Self::RemoveItem(path) => view.remove_item(path),
            Self::MoveItem { from, to } => view.move_item(from, to),
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertSection(index) => write!(f, "insert section {index}"),
            Self::RemoveSection(index) => write!(f, "remove section {index}"),
            Self::InsertItem(path) => write!(f, "insert item {path}"),
            Self::RemoveItem(path) => write!(f, "remove item {path}"),
            Self::MoveItem { from, to } => write!(f, "move item {from} -> {to}"),
        }
    }
}

/// The ordered edits produced by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    edits: Vec<Edit>,
}

impl EditScript {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edit.
    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Number of edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether the script has no edits.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Iterates the edits in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits.iter()
    }

    /// The edits in emission order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Issue every edit to `view`, in order.
    pub fn apply_to(&self, view: &dyn AnimatableView) {
        for edit in &self.edits {
            tracing::trace!(target: horizon_sections_core::logging::targets::RECONCILER, %edit, "issuing edit");
            edit.apply_to(view);
        }
    }
}

impl From<Vec<Edit>> for EditScript {
    fn from(edits: Vec<Edit>) -> Self {
        Self { edits }
    }
}

impl Extend<Edit> for EditScript {
    fn extend<I: IntoIterator<Item = Edit>>(&mut self, iter: I) {
        self.edits.extend(iter);
    }
}

impl IntoIterator for EditScript {
    type Item = Edit;
    type IntoIter = std::vec::IntoIter<Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.into_iter()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}
