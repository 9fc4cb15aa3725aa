//! Core systems for Horizon Sections.
//!
//! This crate provides the threading foundation the reconciliation engine in
//! `horizon-sections` is built on:
//!
//! - **Serialized Pipeline**: one worker thread running compute-then-apply
//!   units strictly in submission order, one at a time
//! - **UI Queue**: hand-off of apply phases to the UI thread
//! - **Worker-owned state**: state only a compute phase may mutate, with a
//!   type-level worker token and UI-thread read checks
//! - **Thread checks**: thread affinity assertions with descriptive panics
//! - **Cancellation**: cooperative, unit-boundary cancellation
//!
//! # Pipeline Example
//!
//! ```no_run
//! use horizon_sections_core::{SerialPipeline, UiQueue, WorkUnit, WorkerOwned};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! // Created on the UI thread.
//! let ui = UiQueue::new();
//! let pipeline = SerialPipeline::new(ui.handle()).unwrap();
//! let items = Arc::new(WorkerOwned::new(Vec::<u32>::new(), &ui.handle()));
//!
//! let store = items.clone();
//! let handle = pipeline
//!     .submit(WorkUnit::new(
//!         move |token| {
//!             store.write(token, |items| items.push(1));
//!             Some(0usize)
//!         },
//!         |inserted_row, done| {
//!             println!("insert row {inserted_row}");
//!             done.finish();
//!         },
//!     ))
//!     .unwrap();
//!
//! // The UI thread pumps its queue until the unit is done.
//! ui.process_until(|| handle.is_done(), Duration::from_secs(1));
//! assert_eq!(items.read(|items| items.len()), 1);
//! ```

mod cancellation;
mod error;
pub mod guarded;
pub mod logging;
pub mod pipeline;
pub mod thread_check;
pub mod ui_queue;

pub use cancellation::CancellationToken;
pub use error::{PipelineError, Result};
pub use guarded::{WorkerOwned, WorkerToken};
pub use logging::PerfSpan;
pub use pipeline::{
    Completion, PipelineBuilder, PipelineConfig, SerialPipeline, UnitHandle, UnitId, UnitState,
    WorkUnit,
};
pub use thread_check::ThreadAffinity;
pub use ui_queue::{QueuedInvocation, UiHandle, UiQueue};
