//! Horizon Sections - reconciliation for animated, sectioned list and grid views.
//!
//! Callers add, remove, move and re-sort values. Each change is diffed on a
//! background worker into a minimal edit script (section inserts and
//! removals, item inserts, removals and moves), and the script is played
//! against the view on the UI thread as one animated batch. Changes are
//! strictly serialized: the next diff starts only after the previous batch
//! has finished animating.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use horizon_sections::{
//!     AnimatableView, BatchCompletion, IndexPath, Reconciler, SectionValue, UiQueue,
//! };
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Contact {
//!     name: String,
//! }
//!
//! impl SectionValue for Contact {
//!     type Key = char;
//!
//!     fn section_key(&self) -> char {
//!         self.name.chars().next().unwrap_or('#')
//!     }
//! }
//!
//! struct PrintingView;
//!
//! impl AnimatableView for PrintingView {
//!     fn begin_batch(&self, edits: Box<dyn FnOnce() + '_>, on_complete: BatchCompletion) {
//!         edits();
//!         on_complete(true);
//!     }
//!     fn insert_section(&self, index: usize) { println!("+section {index}"); }
//!     fn remove_section(&self, index: usize) { println!("-section {index}"); }
//!     fn insert_item(&self, path: IndexPath) { println!("+item {path}"); }
//!     fn remove_item(&self, path: IndexPath) { println!("-item {path}"); }
//!     fn move_item(&self, from: IndexPath, to: IndexPath) { println!("{from} -> {to}"); }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ui = UiQueue::new();
//!     let view = Arc::new(PrintingView);
//!     let reconciler = Reconciler::new(&view, ui.handle())?;
//!
//!     let handle = reconciler.add([
//!         Contact { name: "Ada".into() },
//!         Contact { name: "Grace".into() },
//!     ])?;
//!     ui.process_until(|| handle.is_done(), Duration::from_secs(1));
//!
//!     assert_eq!(reconciler.number_of_sections(), 2);
//!     Ok(())
//! }
//! ```

pub mod model;
mod reconciler;
pub mod view;

pub use horizon_sections_core::*;
pub use model::{Comparator, Edit, EditScript, IndexPath, SectionValue};
pub use reconciler::Reconciler;
pub use view::{AnimatableView, BatchCompletion};
