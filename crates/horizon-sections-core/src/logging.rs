//! Logging facilities for Horizon Sections.
//!
//! Horizon Sections uses the `tracing` crate for instrumentation and never
//! installs a subscriber itself. To see logs, install one in your
//! application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_sections=debug,horizon_sections_core=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! The subscriber is the observability hook: nothing is printed unless the
//! host asks for it.

use std::time::Instant;

/// Span names used throughout Horizon Sections for tracing.
///
/// These constants can be used to filter traces for specific phases.
pub mod span_names {
    /// Compute phase of a unit of work (runs on the pipeline worker).
    pub const COMPUTE: &str = "horizon_sections::compute";
    /// Apply phase of a unit of work (runs on the UI thread).
    pub const APPLY: &str = "horizon_sections::apply";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Serialized pipeline target.
    pub const PIPELINE: &str = "horizon_sections_core::pipeline";
    /// UI queue target.
    pub const UI_QUEUE: &str = "horizon_sections_core::ui_queue";
    /// Reconciler target.
    pub const RECONCILER: &str = "horizon_sections::reconciler";
    /// Section store and diff target.
    pub const STORE: &str = "horizon_sections::store";
    /// Performance spans.
    pub const PERF: &str = "horizon_sections::perf";
}

/// A guard that keeps a tracing span entered and logs its duration when
/// dropped.
#[derive(Debug)]
pub struct PerfSpan {
    name: &'static str,
    started: Instant,
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: targets::PERF, "perf", operation = name);
        Self {
            name,
            started: Instant::now(),
            span: span.entered(),
        }
    }
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        tracing::trace!(
            target: targets::PERF,
            operation = self.name,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "span finished"
        );
    }
}
