//! The section/item model and its diff algorithms.
//!
//! This module holds everything the reconciler computes on the worker:
//!
//! - [`SectionValue`]: the trait stored values implement
//! - [`ItemWrapper`] and [`Section`]: bookkeeping for one item and one section
//! - [`SectionStore`]: the ordered sections, with add, remove, move and
//!   reorder passes that each return an [`EditScript`]
//! - [`MoveRecord`]: position tracking for a reorder pass
//!
//! The types here are plain single-threaded data. Threading lives in the
//! [`Reconciler`](crate::Reconciler).
//!
//! # Example
//!
//! ```
//! use horizon_sections::model::{Edit, SectionStore};
//! use horizon_sections::SectionValue;
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Task {
//!     priority: u8,
//!     title: &'static str,
//! }
//!
//! impl SectionValue for Task {
//!     type Key = u8;
//!
//!     fn section_key(&self) -> u8 {
//!         self.priority
//!     }
//! }
//!
//! let mut store = SectionStore::new();
//! let script = store
//!     .add([Task { priority: 1, title: "write" }, Task { priority: 3, title: "ship" }])
//!     .unwrap();
//!
//! // Highest key first.
//! assert_eq!(store.section_key(0), Some(&3));
//! assert_eq!(script.edits(), &[Edit::InsertSection(0), Edit::InsertSection(1)]);
//! ```

mod edit;
mod index;
mod item;
mod move_record;
mod section;
mod store;

pub use edit::{Edit, EditScript};
pub use index::IndexPath;
pub use item::{ItemWrapper, SectionValue};
pub use move_record::MoveRecord;
pub use section::{Comparator, Section};
pub use store::SectionStore;
