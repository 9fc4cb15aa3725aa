//! State owned by the pipeline worker.
//!
//! [`WorkerOwned`] holds state that only a compute phase may mutate. Writes
//! require a [`WorkerToken`], which only the pipeline's worker loop can
//! create, so mutation outside a unit of work does not type-check. Reads are
//! allowed anywhere, with one rule: the UI thread must never observe the
//! state while a compute phase holds it. Such a read is a contract violation
//! and panics instead of blocking the UI thread.

use std::marker::PhantomData;

use parking_lot::RwLock;

use crate::thread_check::{ThreadAffinity, panic_contract_violation};
use crate::ui_queue::UiHandle;

/// Proof that the caller is running inside a pipeline compute phase.
///
/// Handed to compute closures by reference. It cannot be constructed outside
/// this crate and cannot leave the worker thread.
pub struct WorkerToken {
    ui: ThreadAffinity,
    _not_send: PhantomData<*const ()>,
}

impl WorkerToken {
    pub(crate) fn new(ui: ThreadAffinity) -> Self {
        Self {
            ui,
            _not_send: PhantomData,
        }
    }

    /// The UI thread the owning pipeline delivers apply phases to.
    pub fn ui_affinity(&self) -> ThreadAffinity {
        self.ui
    }
}

impl std::fmt::Debug for WorkerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerToken").finish_non_exhaustive()
    }
}

/// State that is mutated only by the pipeline worker.
pub struct WorkerOwned<T> {
    state: RwLock<T>,
    ui: ThreadAffinity,
}

impl<T> WorkerOwned<T> {
    /// Wrap `state`, recording `ui`'s thread as the UI thread.
    pub fn new(state: T, ui: &UiHandle) -> Self {
        Self {
            state: RwLock::new(state),
            ui: ui.affinity(),
        }
    }

    /// Mutate the state from a compute phase.
    ///
    /// # Panics
    ///
    /// Panics if called on the UI thread.
    pub fn write<R>(&self, _token: &WorkerToken, f: impl FnOnce(&mut T) -> R) -> R {
        self.ui
            .assert_other_thread("worker-owned state mutated on the UI thread");
        let mut guard = self.state.write();
        f(&mut guard)
    }

    /// Read the state.
    ///
    /// Off the UI thread this waits for any running compute phase to finish.
    ///
    /// # Panics
    ///
    /// Panics if called on the UI thread while a compute phase holds the state.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if self.ui.is_same_thread() {
            match self.state.try_read() {
                Some(guard) => f(&guard),
                None => panic_contract_violation(
                    "section store read from the UI thread while a compute phase is running",
                    "The store is owned by the pipeline worker until the compute phase\n\
                     returns. Read it from the apply phase, or once the unit has finished.",
                ),
            }
        } else {
            f(&self.state.read())
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for WorkerOwned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.try_read() {
            Some(state) => f.debug_struct("WorkerOwned").field("state", &*state).finish(),
            None => f.write_str("WorkerOwned { <locked by worker> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_queue::UiQueue;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_write_off_ui_thread_and_read_on_ui_thread() {
        let queue = UiQueue::new();
        let owned = Arc::new(WorkerOwned::new(Vec::<i32>::new(), &queue.handle()));

        let worker_side = owned.clone();
        let ui = queue.affinity();
        std::thread::spawn(move || {
            let token = WorkerToken::new(ui);
            worker_side.write(&token, |v| v.push(7));
        })
        .join()
        .unwrap();

        assert_eq!(owned.read(|v| v.clone()), vec![7]);
    }

    #[test]
    #[should_panic(expected = "CONTRACT VIOLATION")]
    fn test_write_on_ui_thread_panics() {
        let queue = UiQueue::new();
        let owned = WorkerOwned::new(0u32, &queue.handle());
        let token = WorkerToken::new(queue.affinity());
        owned.write(&token, |v| *v += 1);
    }

    #[test]
    fn test_ui_read_during_write_panics() {
        let queue = UiQueue::new();
        let owned = Arc::new(WorkerOwned::new(0u32, &queue.handle()));
        let (locked_tx, locked_rx) = crossbeam_channel::bounded::<()>(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);

        let worker_side = owned.clone();
        let ui = queue.affinity();
        let worker = std::thread::spawn(move || {
            let token = WorkerToken::new(ui);
            worker_side.write(&token, |v| {
                locked_tx.send(()).unwrap();
                let _ = release_rx.recv_timeout(Duration::from_secs(2));
                *v = 1;
            });
        });

        locked_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let read = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| owned.read(|v| *v)));
        release_tx.send(()).unwrap();
        worker.join().unwrap();

        assert!(read.is_err(), "UI-thread read during compute must panic");
        assert_eq!(owned.read(|v| *v), 1);
    }

    #[test]
    fn test_off_thread_read_waits_for_writer() {
        let queue = UiQueue::new();
        let owned = Arc::new(WorkerOwned::new(0u32, &queue.handle()));
        let (locked_tx, locked_rx) = crossbeam_channel::bounded::<()>(1);

        let worker_side = owned.clone();
        let ui = queue.affinity();
        let worker = std::thread::spawn(move || {
            let token = WorkerToken::new(ui);
            worker_side.write(&token, |v| {
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(30));
                *v = 5;
            });
        });

        locked_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let reader = owned.clone();
        let seen = std::thread::spawn(move || reader.read(|v| *v)).join().unwrap();
        worker.join().unwrap();
        assert_eq!(seen, 5);
    }
}
