//! Thread affinity verification for the UI/worker split.
//!
//! Horizon Sections runs on exactly two kinds of threads: the UI thread, which
//! owns the view and applies edit scripts, and the pipeline worker, which owns
//! the section store while a compute phase runs. [`ThreadAffinity`] records
//! which thread is the UI thread and turns violations of that split into loud
//! panics instead of silent state corruption.
//!
//! ```
//! use horizon_sections_core::thread_check::ThreadAffinity;
//!
//! let ui = ThreadAffinity::current();
//! assert!(ui.is_same_thread());
//!
//! std::thread::spawn(move || {
//!     // A worker may never run on the UI thread.
//!     ui.assert_other_thread("store mutation attempted on the UI thread");
//! })
//! .join()
//! .unwrap();
//! ```

use std::thread::ThreadId;

/// Thread affinity tracker.
///
/// Records the thread on which it was created and verifies that later calls
/// happen on (or away from) that thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Create a new thread affinity tracker for the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Assert that we are on the bound thread.
    ///
    /// # Panics
    ///
    /// Panics with a descriptive message if called from a different thread.
    #[inline]
    pub fn assert_same_thread(&self) {
        self.assert_same_thread_with_msg("object accessed from wrong thread")
    }

    /// Assert that we are on the bound thread, with a custom message.
    ///
    /// # Panics
    ///
    /// Panics if called from a different thread.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            self.panic_wrong_thread(msg);
        }
    }

    /// Assert that we are *not* on the bound thread.
    ///
    /// Used on the worker side: compute phases must never run on the UI thread.
    ///
    /// # Panics
    ///
    /// Panics if called from the bound thread.
    pub fn assert_other_thread(&self, msg: &str) {
        if self.is_same_thread() {
            panic_contract_violation(
                msg,
                "This operation belongs to the pipeline worker. Submit it as a unit\n\
                 of work instead of calling it from the UI thread.",
            );
        }
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self, msg: &str) -> ! {
        let current = std::thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");
        let current_id = current.id();

        panic!(
            "\n\
            ══════════════════════════════════════════════════════════════════════\n\
            THREAD AFFINITY VIOLATION\n\
            ══════════════════════════════════════════════════════════════════════\n\
            \n\
            {msg}\n\
            \n\
            Bound thread: {:?}\n\
            Current thread: \"{current_name}\" (ID: {current_id:?})\n\
            \n\
            UI queues are pumped and edit scripts are applied on the UI thread\n\
            they were created on.\n\
            \n\
            ══════════════════════════════════════════════════════════════════════",
            self.thread_id
        )
    }
}

/// Panic with a contract-violation banner.
///
/// Called when worker-owned state is touched in a way that could tear it. The
/// process is expected to abort the offending operation; there is no recovery.
#[cold]
#[inline(never)]
#[doc(hidden)]
pub fn panic_contract_violation(msg: &str, hint: &str) -> ! {
    let current = std::thread::current();
    let current_name = current.name().unwrap_or("<unnamed>");
    let current_id = current.id();

    panic!(
        "\n\
        ══════════════════════════════════════════════════════════════════════\n\
        CONTRACT VIOLATION\n\
        ══════════════════════════════════════════════════════════════════════\n\
        \n\
        {msg}\n\
        \n\
        Current thread: \"{current_name}\" (ID: {current_id:?})\n\
        \n\
        {hint}\n\
        \n\
        ══════════════════════════════════════════════════════════════════════"
    )
}
