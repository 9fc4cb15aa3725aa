//! Error types for Horizon Sections.

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors returned when submitting work to a [`SerialPipeline`](crate::SerialPipeline).
///
/// Contract violations (touching worker-owned state from the UI thread, a
/// broken reorder invariant) are not represented here: they panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline has been stopped and accepts no further units.
    #[error("Pipeline has been stopped; no further units are accepted")]
    Stopped,
    /// The bounded unit queue is at capacity.
    #[error("Pipeline queue is full")]
    QueueFull,
    /// The worker thread could not be spawned.
    #[error("Failed to spawn pipeline worker thread: {0}")]
    SpawnFailed(String),
}
