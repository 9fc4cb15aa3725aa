//! Tests for the reconciler: serialized application of edit scripts to a view.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use horizon_sections::{
    AnimatableView, BatchCompletion, Comparator, Edit, IndexPath, PipelineConfig, PipelineError,
    Reconciler, SectionValue, UiQueue, UnitHandle, UnitState,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct Contact {
    group: u8,
    name: &'static str,
}

impl SectionValue for Contact {
    type Key = u8;

    fn section_key(&self) -> u8 {
        self.group
    }
}

fn c(group: u8, name: &'static str) -> Contact {
    Contact { group, name }
}

fn by_name() -> Comparator<Contact> {
    Arc::new(|a: &Contact, b: &Contact| a.name < b.name)
}

/// A view that records every edit it receives.
///
/// With `defer` set, batch completions are held until `release` is called,
/// standing in for a running animation.
#[derive(Default)]
struct RecordingView {
    edits: Mutex<Vec<Edit>>,
    batches: AtomicUsize,
    in_batch: AtomicBool,
    overlapped: AtomicBool,
    defer: AtomicBool,
    held: Mutex<Vec<BatchCompletion>>,
}

impl RecordingView {
    fn deferred() -> Arc<Self> {
        let view = Self::default();
        view.defer.store(true, Ordering::SeqCst);
        Arc::new(view)
    }

    fn edits(&self) -> Vec<Edit> {
        self.edits.lock().clone()
    }

    fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn release(&self) {
        let held: Vec<BatchCompletion> = self.held.lock().drain(..).collect();
        for complete in held {
            self.in_batch.store(false, Ordering::SeqCst);
            complete(true);
        }
    }
}

impl AnimatableView for RecordingView {
    fn begin_batch(&self, edits: Box<dyn FnOnce() + '_>, on_complete: BatchCompletion) {
        if self.in_batch.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        edits();
        if self.defer.load(Ordering::SeqCst) {
            self.held.lock().push(on_complete);
        } else {
            self.in_batch.store(false, Ordering::SeqCst);
            on_complete(true);
        }
    }

    fn insert_section(&self, index: usize) {
        self.edits.lock().push(Edit::InsertSection(index));
    }

    fn remove_section(&self, index: usize) {
        self.edits.lock().push(Edit::RemoveSection(index));
    }

    fn insert_item(&self, path: IndexPath) {
        self.edits.lock().push(Edit::InsertItem(path));
    }

    fn remove_item(&self, path: IndexPath) {
        self.edits.lock().push(Edit::RemoveItem(path));
    }

    fn move_item(&self, from: IndexPath, to: IndexPath) {
        self.edits.lock().push(Edit::MoveItem { from, to });
    }
}

fn settle(ui: &UiQueue, handle: &UnitHandle) {
    assert!(ui.process_until(|| handle.is_done(), TIMEOUT), "unit did not finish");
}

fn names(reconciler: &Reconciler<Contact>) -> Vec<(u8, Vec<&'static str>)> {
    reconciler
        .snapshot()
        .into_iter()
        .map(|(key, items)| (key, items.iter().map(|c| c.name).collect()))
        .collect()
}

#[test]
fn test_add_inserts_sections_and_items() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    let handle = reconciler.add([c(1, "ada"), c(2, "bob")]).unwrap();
    settle(&ui, &handle);
    assert_eq!(handle.state(), UnitState::Finished);
    assert_eq!(view.edits(), vec![Edit::InsertSection(0), Edit::InsertSection(1)]);

    let handle = reconciler.add_one(c(1, "cy")).unwrap();
    settle(&ui, &handle);
    assert_eq!(view.edits()[2..], [Edit::InsertItem(IndexPath::new(1, 1))]);

    assert_eq!(reconciler.number_of_sections(), 2);
    assert_eq!(reconciler.number_of_items(1), 2);
    assert_eq!(reconciler.section_key(0), Some(2));
    assert_eq!(reconciler.get(IndexPath::new(1, 1)), Some(c(1, "cy")));
    assert_eq!(reconciler.position_of(&c(2, "bob")), Some(IndexPath::new(0, 0)));
    assert_eq!(view.batches(), 2);
}

#[test]
fn test_duplicate_add_touches_view_once() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    settle(&ui, &reconciler.add_one(c(1, "seed")).unwrap());
    let first = reconciler.add_one(c(1, "a")).unwrap();
    let second = reconciler.add_one(c(1, "a")).unwrap();
    settle(&ui, &first);
    settle(&ui, &second);

    let inserts = view
        .edits()
        .into_iter()
        .filter(|edit| matches!(edit, Edit::InsertItem(_)))
        .count();
    assert_eq!(inserts, 1);
    assert_eq!(view.batches(), 2);
    assert_eq!(reconciler.number_of_items(0), 2);
}

#[test]
fn test_remove_drops_emptied_sections() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    settle(&ui, &reconciler.add([c(2, "a"), c(1, "b"), c(1, "c")]).unwrap());
    let handle = reconciler.remove([c(2, "a"), c(1, "b")]).unwrap();
    settle(&ui, &handle);

    assert_eq!(
        view.edits()[2..],
        [Edit::RemoveSection(0), Edit::RemoveItem(IndexPath::new(1, 0))]
    );
    assert_eq!(names(&reconciler), vec![(1, vec!["c"])]);

    let handle = reconciler.remove_one(c(1, "c")).unwrap();
    settle(&ui, &handle);
    assert_eq!(reconciler.number_of_sections(), 0);
    assert_eq!(view.edits().last(), Some(&Edit::RemoveSection(0)));
}

#[test]
fn test_empty_input_resolves_without_a_unit() {
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::<Contact>::new(&view, ui.handle()).unwrap();

    let added = reconciler.add(Vec::new()).unwrap();
    let removed = reconciler.remove(Vec::new()).unwrap();
    assert_eq!(added.state(), UnitState::Finished);
    assert_eq!(removed.state(), UnitState::Finished);
    assert!(reconciler.is_idle());
    assert_eq!(view.batches(), 0);
}

#[test]
fn test_sort_and_reorder() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::with_comparator(&view, ui.handle(), by_name()).unwrap();

    settle(&ui, &reconciler.add([c(1, "b"), c(1, "a"), c(1, "c")]).unwrap());
    assert_eq!(names(&reconciler), vec![(1, vec!["a", "b", "c"])]);

    let descending: Comparator<Contact> = Arc::new(|a: &Contact, b: &Contact| a.name > b.name);
    let handle = reconciler.set_comparator(Some(descending)).unwrap();
    settle(&ui, &handle);

    assert_eq!(names(&reconciler), vec![(1, vec!["c", "b", "a"])]);
    assert_eq!(
        view.edits()[1..],
        [
            Edit::MoveItem { from: IndexPath::new(0, 2), to: IndexPath::new(0, 0) },
            Edit::MoveItem { from: IndexPath::new(0, 0), to: IndexPath::new(0, 2) },
        ]
    );

    // Same order again: nothing to animate.
    let again: Comparator<Contact> = Arc::new(|a: &Contact, b: &Contact| a.name > b.name);
    settle(&ui, &reconciler.set_comparator(Some(again)).unwrap());
    assert_eq!(view.batches(), 2);
}

#[test]
fn test_user_move_skips_view() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    settle(&ui, &reconciler.add([c(1, "a"), c(1, "b"), c(1, "c")]).unwrap());
    let handle = reconciler
        .move_item(IndexPath::new(0, 0), IndexPath::new(0, 2), true)
        .unwrap();
    settle(&ui, &handle);

    assert_eq!(names(&reconciler), vec![(1, vec!["b", "c", "a"])]);
    assert_eq!(view.batches(), 1);

    let handle = reconciler
        .move_item(IndexPath::new(0, 2), IndexPath::new(0, 0), false)
        .unwrap();
    settle(&ui, &handle);
    assert_eq!(names(&reconciler), vec![(1, vec!["a", "b", "c"])]);
    assert_eq!(
        view.edits().last(),
        Some(&Edit::MoveItem { from: IndexPath::new(0, 2), to: IndexPath::new(0, 0) })
    );
}

#[test]
fn test_next_unit_waits_for_batch_completion() {
    init_tracing();
    let ui = UiQueue::new();
    let view = RecordingView::deferred();
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    let first = reconciler.add_one(c(1, "a")).unwrap();
    let second = reconciler.add_one(c(2, "b")).unwrap();

    assert!(ui.process_until(|| view.batches() == 1, TIMEOUT));
    assert_eq!(first.state(), UnitState::Applying);

    // The second unit may not even compute while the first is animating.
    assert!(!ui.process_until(|| view.batches() > 1, Duration::from_millis(150)));
    assert_eq!(second.state(), UnitState::Pending);

    view.release();
    assert!(ui.process_until(|| view.batches() == 2, TIMEOUT));
    view.release();
    settle(&ui, &second);

    assert_eq!(first.state(), UnitState::Finished);
    assert!(!view.overlapped.load(Ordering::SeqCst));
    assert_eq!(view.edits(), vec![Edit::InsertSection(0), Edit::InsertSection(0)]);
}

#[test]
fn test_queue_full_is_reported() {
    init_tracing();
    let ui = UiQueue::new();
    let view = RecordingView::deferred();
    let config = PipelineConfig {
        queue_capacity: 1,
        ..PipelineConfig::default()
    };
    let reconciler = Reconciler::with_config(&view, ui.handle(), config).unwrap();

    let first = reconciler.add_one(c(1, "a")).unwrap();
    assert!(ui.process_until(|| view.batches() == 1, TIMEOUT));

    let second = reconciler.add_one(c(1, "b")).unwrap();
    assert_eq!(reconciler.pending_units(), 1);
    assert!(matches!(reconciler.add_one(c(1, "c")), Err(PipelineError::QueueFull)));

    view.release();
    assert!(ui.process_until(|| view.batches() == 2, TIMEOUT));
    view.release();
    settle(&ui, &first);
    settle(&ui, &second);
    assert_eq!(reconciler.number_of_items(0), 2);
}

#[test]
fn test_stop_before_apply_leaves_view_untouched() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    let handles: Vec<UnitHandle> = ["a", "b", "c"]
        .into_iter()
        .map(|name| reconciler.add_one(c(1, name)).unwrap())
        .collect();
    reconciler.stop();

    for handle in &handles {
        assert!(ui.process_until(|| handle.is_done(), TIMEOUT));
        assert_eq!(handle.state(), UnitState::Cancelled);
    }
    ui.process_pending();

    assert_eq!(view.batches(), 0);
    assert!(view.edits().is_empty());
    assert!(!reconciler.is_running());
}

#[test]
fn test_stop_while_animating_cancels_the_rest() {
    init_tracing();
    let ui = UiQueue::new();
    let view = RecordingView::deferred();
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    let first = reconciler.add_one(c(1, "a")).unwrap();
    assert!(ui.process_until(|| view.batches() == 1, TIMEOUT));
    let queued = reconciler.add_one(c(1, "b")).unwrap();

    reconciler.stop();
    assert_eq!(queued.state(), UnitState::Cancelled);

    view.release();
    settle(&ui, &first);
    ui.process_until(|| false, Duration::from_millis(100));
    assert_eq!(view.batches(), 1);
}

#[test]
fn test_submissions_after_stop_are_rejected() {
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();
    reconciler.stop();

    assert!(matches!(reconciler.add_one(c(1, "a")), Err(PipelineError::Stopped)));
    assert!(matches!(reconciler.add(Vec::new()), Err(PipelineError::Stopped)));
    assert!(matches!(reconciler.remove_one(c(1, "a")), Err(PipelineError::Stopped)));
    assert!(matches!(
        reconciler.move_item(IndexPath::new(0, 0), IndexPath::new(0, 1), false),
        Err(PipelineError::Stopped)
    ));
    assert!(matches!(reconciler.set_comparator(None), Err(PipelineError::Stopped)));
}

#[test]
fn test_dropped_view_still_updates_model() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::new(&view, ui.handle()).unwrap();

    let handle = reconciler.add([c(1, "a"), c(2, "b")]).unwrap();
    drop(view);
    settle(&ui, &handle);

    assert_eq!(handle.state(), UnitState::Finished);
    assert_eq!(reconciler.number_of_sections(), 2);
}

#[test]
fn test_ui_read_during_compute_panics() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());

    let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let blocking: Comparator<Contact> = Arc::new(move |a: &Contact, b: &Contact| {
        let _ = entered_tx.try_send(());
        // Returns immediately once the sender is dropped.
        let _ = release_rx.recv_timeout(TIMEOUT);
        a.name < b.name
    });
    let reconciler = Reconciler::with_comparator(&view, ui.handle(), blocking).unwrap();

    let handle = reconciler.add([c(1, "b"), c(1, "a")]).unwrap();
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    let read = catch_unwind(AssertUnwindSafe(|| reconciler.number_of_sections()));
    assert!(read.is_err());

    drop(release_tx);
    settle(&ui, &handle);
    assert_eq!(names(&reconciler), vec![(1, vec!["a", "b"])]);
}

#[test]
fn test_off_ui_read_waits_for_compute() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());

    let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let blocking: Comparator<Contact> = Arc::new(move |a: &Contact, b: &Contact| {
        let _ = entered_tx.try_send(());
        let _ = release_rx.recv_timeout(TIMEOUT);
        a.name < b.name
    });
    let reconciler = Arc::new(Reconciler::with_comparator(&view, ui.handle(), blocking).unwrap());

    let handle = reconciler.add([c(1, "b"), c(1, "a")]).unwrap();
    entered_rx.recv_timeout(TIMEOUT).unwrap();

    let reader = {
        let reconciler = reconciler.clone();
        std::thread::spawn(move || reconciler.number_of_items(0))
    };
    std::thread::sleep(Duration::from_millis(50));
    assert!(!reader.is_finished());

    drop(release_tx);
    assert_eq!(reader.join().unwrap(), 2);
    settle(&ui, &handle);
}

#[test]
fn test_add_then_remove_applies_in_submission_order() {
    init_tracing();
    let ui = UiQueue::new();
    let view = RecordingView::deferred();

    let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let slow: Comparator<Contact> = Arc::new(move |a: &Contact, b: &Contact| {
        let _ = entered_tx.try_send(());
        let _ = release_rx.recv_timeout(TIMEOUT);
        a.name < b.name
    });
    let reconciler = Reconciler::with_comparator(&view, ui.handle(), slow).unwrap();

    // Two values so the first compute has to sort, and blocks.
    let added = reconciler.add([c(1, "x"), c(1, "w")]).unwrap();
    let removed = reconciler.remove_one(c(1, "x")).unwrap();
    entered_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(removed.state(), UnitState::Pending);

    drop(release_tx);
    assert!(ui.process_until(|| view.batches() == 1, TIMEOUT));
    assert_eq!(view.edits(), vec![Edit::InsertSection(0)]);

    // The removal waits for the insert animation.
    assert!(!ui.process_until(|| view.batches() > 1, Duration::from_millis(100)));
    assert_eq!(removed.state(), UnitState::Pending);

    view.release();
    assert!(ui.process_until(|| view.batches() == 2, TIMEOUT));
    view.release();
    settle(&ui, &removed);

    assert_eq!(added.state(), UnitState::Finished);
    assert_eq!(removed.state(), UnitState::Finished);
    assert_eq!(
        view.edits(),
        vec![Edit::InsertSection(0), Edit::RemoveItem(IndexPath::new(0, 1))]
    );
    assert_eq!(reconciler.position_of(&c(1, "x")), None);
    assert_eq!(names(&reconciler), vec![(1, vec!["w"])]);
    assert!(!view.overlapped.load(Ordering::SeqCst));
}

#[test]
fn test_user_drag_then_add_keeps_view_order() {
    init_tracing();
    let ui = UiQueue::new();
    let view = Arc::new(RecordingView::default());
    let reconciler = Reconciler::with_comparator(&view, ui.handle(), by_name()).unwrap();

    settle(&ui, &reconciler.add([c(1, "a"), c(1, "b")]).unwrap());
    settle(
        &ui,
        &reconciler
            .move_item(IndexPath::new(0, 0), IndexPath::new(0, 1), true)
            .unwrap(),
    );
    let handle = reconciler.add_one(c(1, "c")).unwrap();
    settle(&ui, &handle);

    // The view shows b, a after the drag; appending c at row 2 must match the model.
    assert_eq!(view.edits()[1..], [Edit::InsertItem(IndexPath::new(0, 2))]);
    assert_eq!(names(&reconciler), vec![(1, vec!["b", "a", "c"])]);
}
