//! Queued invocations for UI-thread delivery.
//!
//! The pipeline worker never touches the view. When a compute phase produces
//! an edit script, the apply phase is wrapped in a [`QueuedInvocation`] and
//! posted through a [`UiHandle`] to the [`UiQueue`] owned by the UI thread.
//! The UI thread drains the queue from its event loop (or, in tests, by
//! pumping it directly).
//!
//! # How It Works
//!
//! 1. The UI thread creates a `UiQueue`; the queue records the creating thread
//!    as the UI thread.
//!
//! 2. Producers on any thread post closures through a cloned `UiHandle`.
//!
//! 3. The UI thread calls [`UiQueue::process_pending`] or
//!    [`UiQueue::process_until`], which execute invocations in posting order.
//!
//! ```
//! use horizon_sections_core::UiQueue;
//! use std::time::Duration;
//!
//! let queue = UiQueue::new();
//! let handle = queue.handle();
//!
//! std::thread::spawn(move || {
//!     handle.post(|| println!("runs on the UI thread"));
//! });
//!
//! queue.process_until(|| false, Duration::from_millis(50));
//! ```

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::logging::targets;
use crate::thread_check::ThreadAffinity;

/// A type-erased invocation that runs later on the UI thread.
pub struct QueuedInvocation {
    invoke: Box<dyn FnOnce() + Send>,
}

impl QueuedInvocation {
    /// Create a new queued invocation.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }

    /// Execute the invocation.
    pub fn execute(self) {
        (self.invoke)();
    }
}

/// The UI-thread end of the hand-off channel.
///
/// Bound to the thread that created it. Pumping the queue from any other
/// thread panics.
pub struct UiQueue {
    sender: Sender<QueuedInvocation>,
    receiver: Receiver<QueuedInvocation>,
    affinity: ThreadAffinity,
}

impl UiQueue {
    /// Create a queue bound to the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            affinity: ThreadAffinity::current(),
        }
    }

    /// Get a handle for posting invocations to this queue.
    pub fn handle(&self) -> UiHandle {
        UiHandle {
            sender: self.sender.clone(),
            affinity: self.affinity,
        }
    }

    /// The thread this queue is bound to.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// Get the number of invocations waiting to run.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Run every invocation currently queued, including ones posted while
    /// processing.
    ///
    /// Returns the number of invocations executed.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the UI thread.
    pub fn process_pending(&self) -> usize {
        self.affinity
            .assert_same_thread_with_msg("UiQueue::process_pending called off the UI thread");

        let mut count = 0;
        while let Ok(invocation) = self.receiver.try_recv() {
            invocation.execute();
            count += 1;
        }
        if count > 0 {
            tracing::trace!(target: targets::UI_QUEUE, count, "processed queued invocations");
        }
        count
    }

    /// Pump the queue until `done()` returns `true` or `timeout` elapses.
    ///
    /// `done` is checked before waiting and after every executed invocation.
    /// Returns the final value of `done()`.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the UI thread.
    pub fn process_until<F>(&self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        self.affinity
            .assert_same_thread_with_msg("UiQueue::process_until called off the UI thread");

        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return done();
            }
            // Wake periodically so conditions driven by other threads are seen.
            match self.receiver.recv_timeout(remaining.min(Duration::from_millis(10))) {
                Ok(invocation) => invocation.execute(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A clonable, thread-safe handle for posting work to the UI thread.
#[derive(Clone)]
pub struct UiHandle {
    sender: Sender<QueuedInvocation>,
    affinity: ThreadAffinity,
}

impl UiHandle {
    /// Post a closure to run on the UI thread.
    ///
    /// Invocations are always queued, even when called from the UI thread
    /// itself, so posting order is execution order.
    ///
    /// Returns `false` if the queue has been dropped.
    pub fn post<F>(&self, invoke: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(QueuedInvocation::new(invoke)).is_ok()
    }

    /// Check whether the current thread is the UI thread.
    #[inline]
    pub fn is_ui_thread(&self) -> bool {
        self.affinity.is_same_thread()
    }

    /// The UI thread's affinity.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }
}

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle")
            .field("ui_thread", &self.affinity.thread_id())
            .finish()
    }
}
