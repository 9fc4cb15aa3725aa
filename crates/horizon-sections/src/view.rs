//! The view collaborator interface.
//!
//! The reconciler never knows what kind of view it drives. Any animated list
//! or grid binds to it by implementing [`AnimatableView`]: four primitive
//! structural edits plus a batch operation that reports when its animation
//! has finished.
//!
//! # Example
//!
//! ```ignore
//! use horizon_sections::{AnimatableView, BatchCompletion, IndexPath};
//!
//! struct GridAdapter {
//!     grid: MyAnimatedGrid,
//! }
//!
//! impl AnimatableView for GridAdapter {
//!     fn begin_batch(&self, edits: Box<dyn FnOnce() + '_>, on_complete: BatchCompletion) {
//!         self.grid.perform_batch_updates(edits, on_complete);
//!     }
//!
//!     fn insert_section(&self, index: usize) {
//!         self.grid.insert_sections(&[index]);
//!     }
//!
//!     // ...
//! }
//! ```

use crate::model::IndexPath;

/// Invoked by the view once a batch's animation has finished.
///
/// The argument reports whether the animation ran to completion.
pub type BatchCompletion = Box<dyn FnOnce(bool) + Send>;

/// An animated, sectioned view that consumes edit scripts.
///
/// Every method is called on the UI thread only. The reconciler holds the
/// view weakly; dropping the view turns later apply phases into no-ops.
pub trait AnimatableView: Send + Sync {
    /// Run `edits` as one atomic, animated batch and call `on_complete` once
    /// the animation has finished.
    ///
    /// `edits` calls back into the primitive operations below. `on_complete`
    /// may be called synchronously or later; the reconciler submits nothing
    /// else to the view until it has been called.
    fn begin_batch(&self, edits: Box<dyn FnOnce() + '_>, on_complete: BatchCompletion);

    /// Insert a section at `index`.
    fn insert_section(&self, index: usize);

    /// Remove the section at `index`.
    fn remove_section(&self, index: usize);

    /// Insert an item at `path`.
    fn insert_item(&self, path: IndexPath);

    /// Remove the item at `path`.
    fn remove_item(&self, path: IndexPath);

    /// Move an item from `from` to `to`.
    fn move_item(&self, from: IndexPath, to: IndexPath);
}

static_assertions::assert_obj_safe!(AnimatableView);
