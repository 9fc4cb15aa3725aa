//! Serialized pipeline for compute-then-apply units of work.
//!
//! This module provides a `SerialPipeline` that owns one dedicated worker
//! thread and a FIFO queue of [`WorkUnit`]s. Each unit has two phases:
//!
//! - **compute** runs on the worker thread. It may mutate worker-owned state
//!   (see [`WorkerOwned`](crate::WorkerOwned)) and returns `Some(payload)` if
//!   anything observable changed, `None` otherwise.
//! - **apply** runs on the UI thread with the payload and a [`Completion`].
//!   The unit is not finished, and the next unit does not start, until the
//!   completion fires.
//!
//! Only one unit is ever in flight, so a fast producer cannot stack
//! overlapping animations on the UI thread and state is never mutated while
//! a previously computed edit script is still being applied.
//!
//! # Example
//!
//! ```no_run
//! use horizon_sections_core::{SerialPipeline, UiQueue, WorkUnit};
//! use std::time::Duration;
//!
//! let ui = UiQueue::new();
//! let pipeline = SerialPipeline::new(ui.handle()).unwrap();
//!
//! let handle = pipeline
//!     .submit(WorkUnit::new(
//!         |_token| Some(vec![1, 2, 3]),
//!         |edits, done| {
//!             println!("applying {edits:?} on the UI thread");
//!             done.finish();
//!         },
//!     ))
//!     .unwrap();
//!
//! ui.process_until(|| handle.is_done(), Duration::from_secs(1));
//! pipeline.stop_and_join();
//! ```
//!
//! # Cancellation
//!
//! [`SerialPipeline::stop`] cancels everything outstanding. Queued units are
//! marked [`UnitState::Cancelled`] without running; an apply phase that was
//! posted but has not yet run on the UI thread is skipped; a compute phase
//! that is already running completes and its apply phase is not scheduled.
//! Submissions after `stop()` are rejected with [`PipelineError::Stopped`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex};

use crate::cancellation::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::guarded::WorkerToken;
use crate::logging::{PerfSpan, span_names, targets};
use crate::ui_queue::UiHandle;

/// Default capacity for the pipeline's unit queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default interval at which a waiting worker re-checks cancellation.
const DEFAULT_COMPLETION_POLL: Duration = Duration::from_millis(50);

/// Global counter for generating unique unit IDs.
static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Configuration for creating a SerialPipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Name for the worker thread.
    pub name: String,
    /// Stack size for the worker thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the unit queue.
    pub queue_capacity: usize,
    /// How often the worker re-checks cancellation while idle or while
    /// waiting for an apply phase to complete.
    pub completion_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "horizon-sections-pipeline".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            completion_poll: DEFAULT_COMPLETION_POLL,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating pipelines with custom configuration.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new PipelineBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the unit queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Set the cancellation poll interval.
    pub fn completion_poll(mut self, interval: Duration) -> Self {
        self.config.completion_poll = interval;
        self
    }

    /// Get the configuration built so far.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build and start the pipeline.
    pub fn build(self, ui: UiHandle) -> Result<SerialPipeline> {
        SerialPipeline::with_config(self.config, ui)
    }
}

/// A unique identifier for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value of this unit ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Lifecycle of a unit of work.
///
/// `Pending → Running → [Applying →] Finished`, or directly to `Cancelled`
/// from any non-terminal state. `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Queued, not yet started.
    Pending,
    /// Compute phase running on the worker.
    Running,
    /// Apply phase handed to the UI thread, waiting for completion.
    Applying,
    /// Done. Terminal.
    Finished,
    /// Cancelled by `stop()`. Terminal.
    Cancelled,
}

impl UnitState {
    /// Whether this state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Shared, observable state of one unit.
struct UnitStatus {
    state: Mutex<UnitState>,
    changed: Condvar,
}

impl UnitStatus {
    fn new(state: UnitState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        })
    }

    fn get(&self) -> UnitState {
        *self.state.lock()
    }

    /// Transition to `next` unless already terminal. Returns whether the
    /// transition happened.
    fn set(&self, next: UnitState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }
}

/// A handle for observing a submitted unit.
#[derive(Clone)]
pub struct UnitHandle {
    id: UnitId,
    status: Arc<UnitStatus>,
}

impl UnitHandle {
    /// A handle for work that was resolved without queuing a unit.
    ///
    /// The handle is already `Finished`.
    pub fn finished() -> Self {
        Self {
            id: UnitId::next(),
            status: UnitStatus::new(UnitState::Finished),
        }
    }

    /// The unit's ID.
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// The unit's current state.
    pub fn state(&self) -> UnitState {
        self.status.get()
    }

    /// Whether the unit reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Block until the unit reaches a terminal state or `timeout` elapses.
    ///
    /// Do not call this from the UI thread for a unit that has an apply
    /// phase: the apply phase needs the UI thread to run. Pump the UI queue
    /// with [`UiQueue::process_until`](crate::UiQueue::process_until) instead.
    ///
    /// Returns `true` if the unit is done.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut state = self.status.state.lock();
        if state.is_terminal() {
            return true;
        }
        let _ = self
            .status
            .changed
            .wait_while_for(&mut state, |s| !s.is_terminal(), timeout);
        state.is_terminal()
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Signals the end of a unit's apply phase.
///
/// The apply phase must call [`finish`](Completion::finish), synchronously or
/// later (for example from an animation callback). Dropping a `Completion`
/// without calling `finish` also releases the pipeline.
pub struct Completion {
    unit: UnitId,
    sender: Sender<()>,
}

impl Completion {
    /// Report that the apply phase is complete.
    pub fn finish(self) {
        let _ = self.sender.send(());
    }

    /// The unit this completion belongs to.
    pub fn unit_id(&self) -> UnitId {
        self.unit
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("unit", &self.unit).finish()
    }
}

type ApplyFn = Box<dyn FnOnce(Completion) + Send>;
type ComputeFn = Box<dyn FnOnce(&WorkerToken) -> Option<ApplyFn> + Send>;

/// One queued compute-then-apply pair.
pub struct WorkUnit {
    label: &'static str,
    compute: ComputeFn,
}

impl WorkUnit {
    /// Create a unit from a compute closure and an apply closure.
    ///
    /// `compute` runs on the worker. If it returns `Some(payload)`, `apply`
    /// later runs on the UI thread with that payload.
    pub fn new<P, C, A>(compute: C, apply: A) -> Self
    where
        P: Send + 'static,
        C: FnOnce(&WorkerToken) -> Option<P> + Send + 'static,
        A: FnOnce(P, Completion) + Send + 'static,
    {
        Self {
            label: "unit",
            compute: Box::new(move |token: &WorkerToken| {
                compute(token).map(|payload| {
                    Box::new(move |done: Completion| apply(payload, done)) as ApplyFn
                })
            }),
        }
    }

    /// Attach a label used in log output.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// The unit's label.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit").field("label", &self.label).finish()
    }
}

/// A unit in the queue, with its observable status.
struct QueuedUnit {
    id: UnitId,
    unit: WorkUnit,
    status: Arc<UnitStatus>,
}

/// A task sent to the worker.
enum PipelineTask {
    /// Run a unit.
    Run(QueuedUnit),
    /// Shutdown signal.
    Shutdown,
}

/// Internal state shared between the pipeline handle and the worker thread.
struct PipelineState {
    /// Whether the pipeline accepts submissions.
    running: AtomicBool,
    /// Whether a unit is between `Running` and a terminal state.
    busy: AtomicBool,
    /// Cancellation token for cooperative shutdown.
    cancellation: CancellationToken,
    /// Count of units waiting in the queue.
    pending_units: AtomicUsize,
    /// Condvar for waiting on shutdown.
    shutdown_condvar: Condvar,
    /// Mutex for the condvar.
    shutdown_mutex: Mutex<bool>,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            pending_units: AtomicUsize::new(0),
            shutdown_condvar: Condvar::new(),
            shutdown_mutex: Mutex::new(false),
        }
    }

    fn signal_shutdown(&self) {
        let mut exited = self.shutdown_mutex.lock();
        *exited = true;
        self.shutdown_condvar.notify_all();
    }
}

/// A single-worker, strictly FIFO execution queue for units of work.
///
/// # Thread Safety
///
/// `SerialPipeline` is `Send + Sync` and can be shared between threads.
/// Multiple threads can submit concurrently; units run in the order the
/// queue received them.
pub struct SerialPipeline {
    /// Channel sender for submitting units.
    sender: Sender<PipelineTask>,
    /// Receiver clone used by `stop()` to cancel queued units.
    receiver: Receiver<PipelineTask>,
    /// Thread handle for joining.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Shared state with the worker thread.
    state: Arc<PipelineState>,
}

impl SerialPipeline {
    /// Create a pipeline with default configuration.
    ///
    /// The worker thread starts immediately.
    pub fn new(ui: UiHandle) -> Result<Self> {
        Self::with_config(PipelineConfig::default(), ui)
    }

    /// Create a pipeline with custom configuration.
    pub fn with_config(config: PipelineConfig, ui: UiHandle) -> Result<Self> {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let state = Arc::new(PipelineState::new());

        let thread_state = state.clone();
        let thread_receiver = receiver.clone();
        let poll = config.completion_poll;

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                worker_loop(thread_receiver, &thread_state, &ui, poll);
                thread_state.running.store(false, Ordering::Release);
                thread_state.signal_shutdown();
            })
            .map_err(|err| PipelineError::SpawnFailed(err.to_string()))?;

        tracing::debug!(target: targets::PIPELINE, thread = %config.name, capacity = config.queue_capacity, "pipeline started");

        Ok(Self {
            sender,
            receiver,
            handle: Mutex::new(Some(handle)),
            state,
        })
    }

    /// Submit a unit for execution.
    ///
    /// Returns a handle for observing the unit, or an error if the pipeline
    /// has been stopped or the queue is full.
    pub fn submit(&self, unit: WorkUnit) -> Result<UnitHandle> {
        if !self.is_running() {
            tracing::warn!(target: targets::PIPELINE, label = unit.label(), "submission rejected: pipeline stopped");
            return Err(PipelineError::Stopped);
        }

        let id = UnitId::next();
        let status = UnitStatus::new(UnitState::Pending);
        let label = unit.label();

        self.state.pending_units.fetch_add(1, Ordering::AcqRel);

        let task = PipelineTask::Run(QueuedUnit {
            id,
            unit,
            status: status.clone(),
        });

        match self.sender.try_send(task) {
            Ok(()) => {
                if self.state.cancellation.is_cancelled() {
                    // A concurrent stop() may have drained the queue before this send landed.
                    self.drain_cancelled();
                    tracing::warn!(target: targets::PIPELINE, %id, label, "submission rejected: pipeline stopped");
                    return Err(PipelineError::Stopped);
                }
                tracing::trace!(target: targets::PIPELINE, %id, label, "unit queued");
                Ok(UnitHandle { id, status })
            }
            Err(TrySendError::Full(_)) => {
                self.state.pending_units.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(target: targets::PIPELINE, %id, label, "submission rejected: queue full");
                Err(PipelineError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.state.pending_units.fetch_sub(1, Ordering::AcqRel);
                Err(PipelineError::Stopped)
            }
        }
    }

    /// Check if the pipeline accepts submissions.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Check if a unit is currently in flight (computing or applying).
    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    /// Get the number of units waiting in the queue.
    pub fn pending_units(&self) -> usize {
        self.state.pending_units.load(Ordering::Acquire)
    }

    /// Check if nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        !self.is_busy() && self.pending_units() == 0
    }

    /// Cancel everything outstanding and stop accepting units.
    ///
    /// Non-blocking. Queued units are marked cancelled immediately. Use
    /// `join()` to wait for the worker thread to exit.
    pub fn stop(&self) {
        // Mark as not running immediately so new submissions are rejected
        self.state.running.store(false, Ordering::Release);
        if !self.state.cancellation.cancel() {
            return;
        }

        let cancelled = self.drain_cancelled();
        let _ = self.sender.try_send(PipelineTask::Shutdown);

        tracing::debug!(target: targets::PIPELINE, cancelled, "pipeline stopped");
    }

    /// Mark every queued unit cancelled. Returns how many were drained.
    fn drain_cancelled(&self) -> usize {
        let mut cancelled = 0usize;
        while let Ok(task) = self.receiver.try_recv() {
            if let PipelineTask::Run(queued) = task {
                cancel_queued(&self.state, queued);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Wait for the worker thread to finish.
    ///
    /// Returns `true` if the worker was joined successfully, `false` if
    /// already joined or the thread panicked.
    pub fn join(&self) -> bool {
        let mut handle = self.handle.lock();
        if let Some(h) = handle.take() {
            h.join().is_ok()
        } else {
            false
        }
    }

    /// Stop the pipeline and wait for the worker to exit.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }

    /// Wait for the worker thread to exit, with a timeout.
    ///
    /// Returns `true` if the worker exited within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut exited = self.state.shutdown_mutex.lock();
        if *exited {
            return true;
        }
        let _ = self
            .state
            .shutdown_condvar
            .wait_while_for(&mut exited, |done| !*done, timeout);
        *exited
    }

    /// Get the cancellation token shared with the worker.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.state.cancellation
    }
}

impl Drop for SerialPipeline {
    fn drop(&mut self) {
        self.stop();
        // Don't block in drop - just request shutdown
    }
}

impl fmt::Debug for SerialPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialPipeline")
            .field("running", &self.is_running())
            .field("busy", &self.is_busy())
            .field("pending_units", &self.pending_units())
            .finish()
    }
}

fn cancel_queued(state: &PipelineState, queued: QueuedUnit) {
    state.pending_units.fetch_sub(1, Ordering::AcqRel);
    if queued.status.set(UnitState::Cancelled) {
        tracing::debug!(target: targets::PIPELINE, id = %queued.id, label = queued.unit.label(), "unit cancelled before compute");
    }
}

/// The main worker loop that processes units.
fn worker_loop(receiver: Receiver<PipelineTask>, state: &PipelineState, ui: &UiHandle, poll: Duration) {
    let token = WorkerToken::new(ui.affinity());

    while !state.cancellation.is_cancelled() {
        // Use a timeout so we can check cancellation periodically
        match receiver.recv_timeout(poll) {
            Ok(PipelineTask::Run(queued)) => {
                if state.cancellation.is_cancelled() {
                    cancel_queued(state, queued);
                    break;
                }
                state.pending_units.fetch_sub(1, Ordering::AcqRel);
                state.busy.store(true, Ordering::Release);
                run_unit(queued, &token, state, ui, poll);
                state.busy.store(false, Ordering::Release);
            }
            Ok(PipelineTask::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Whatever is still queued will never run.
    while let Ok(task) = receiver.try_recv() {
        if let PipelineTask::Run(queued) = task {
            cancel_queued(state, queued);
        }
    }
}

/// Run one unit through its compute and apply phases.
fn run_unit(
    queued: QueuedUnit,
    token: &WorkerToken,
    state: &PipelineState,
    ui: &UiHandle,
    poll: Duration,
) {
    let QueuedUnit { id, unit, status } = queued;
    let label = unit.label;

    status.set(UnitState::Running);
    tracing::debug!(target: targets::PIPELINE, %id, label, "compute started");

    let apply = {
        let _perf = PerfSpan::new(span_names::COMPUTE);
        (unit.compute)(token)
    };

    let Some(apply) = apply else {
        status.set(UnitState::Finished);
        tracing::debug!(target: targets::PIPELINE, %id, label, "unit finished without changes");
        return;
    };

    if state.cancellation.is_cancelled() {
        status.set(UnitState::Cancelled);
        tracing::debug!(target: targets::PIPELINE, %id, label, "unit cancelled after compute");
        return;
    }

    let (done_sender, done_receiver) = bounded(1);
    let completion = Completion {
        unit: id,
        sender: done_sender,
    };

    status.set(UnitState::Applying);
    let cancellation = state.cancellation.clone();
    let posted = ui.post(move || {
        if cancellation.is_cancelled() {
            // Dropping the completion releases the worker.
            return;
        }
        let _span = tracing::debug_span!(target: targets::PIPELINE, "apply", phase = span_names::APPLY, %id).entered();
        apply(completion);
    });

    if !posted {
        tracing::warn!(target: targets::PIPELINE, %id, label, "UI queue is gone; apply phase dropped");
        status.set(UnitState::Finished);
        return;
    }

    // Backpressure: the next unit waits until the UI reports completion.
    loop {
        match done_receiver.recv_timeout(poll) {
            Ok(()) => {
                status.set(UnitState::Finished);
                tracing::debug!(target: targets::PIPELINE, %id, label, "unit finished");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                if state.cancellation.is_cancelled() {
                    status.set(UnitState::Cancelled);
                } else {
                    tracing::debug!(target: targets::PIPELINE, %id, label, "completion dropped without finish");
                    status.set(UnitState::Finished);
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if state.cancellation.is_cancelled() {
                    status.set(UnitState::Cancelled);
                    tracing::debug!(target: targets::PIPELINE, %id, label, "unit cancelled while applying");
                    break;
                }
            }
        }
    }
}

static_assertions::assert_impl_all!(SerialPipeline: Send, Sync);
static_assertions::assert_impl_all!(UnitHandle: Send, Sync);
static_assertions::assert_impl_all!(Completion: Send);
static_assertions::assert_impl_all!(WorkUnit: Send);
