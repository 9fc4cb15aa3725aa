//! The public reconciler: a section store driven through a serialized
//! pipeline into an animated view.

use std::fmt;
use std::sync::{Arc, Weak};

use horizon_sections_core::logging::targets;
use horizon_sections_core::{
    Completion, PipelineConfig, PipelineError, Result, SerialPipeline, UiHandle,
    UnitHandle, WorkUnit, WorkerOwned, WorkerToken,
};

use crate::model::{Comparator, EditScript, IndexPath, SectionStore, SectionValue};
use crate::view::AnimatableView;

/// Keeps an animated, sectioned view in sync with a set of values.
///
/// Every mutation is queued as one unit of work. Units run strictly one at a
/// time: the diff for a unit is computed on a background worker, its edits
/// are applied to the view on the UI thread inside one animated batch, and
/// the next unit starts only once that batch has reported completion.
///
/// The reconciler holds the view weakly. Once the view is dropped, queued
/// units still update the model but no longer touch the view.
///
/// # Example
///
/// ```ignore
/// let ui = UiQueue::new();
/// let view = Arc::new(MyGridAdapter::new());
/// let reconciler = Reconciler::new(&view, ui.handle())?;
///
/// let handle = reconciler.add(contacts)?;
/// ui.process_until(|| handle.is_done(), Duration::from_secs(1));
/// assert_eq!(reconciler.number_of_sections(), 3);
/// ```
pub struct Reconciler<T: SectionValue> {
    store: Arc<WorkerOwned<SectionStore<T>>>,
    pipeline: SerialPipeline,
    view: Weak<dyn AnimatableView>,
    ui: UiHandle,
}

impl<T: SectionValue> Reconciler<T> {
    /// Creates a reconciler driving `view`, with apply phases delivered to
    /// `ui`.
    ///
    /// Items keep their insertion order until a comparator is set.
    pub fn new<V>(view: &Arc<V>, ui: UiHandle) -> Result<Self>
    where
        V: AnimatableView + 'static,
    {
        Self::build(view, ui, PipelineConfig::default(), SectionStore::new())
    }

    /// Creates a reconciler with a custom pipeline configuration.
    pub fn with_config<V>(view: &Arc<V>, ui: UiHandle, config: PipelineConfig) -> Result<Self>
    where
        V: AnimatableView + 'static,
    {
        Self::build(view, ui, config, SectionStore::new())
    }

    /// Creates a reconciler whose sections are sorted by `comparator` from
    /// the start.
    pub fn with_comparator<V>(view: &Arc<V>, ui: UiHandle, comparator: Comparator<T>) -> Result<Self>
    where
        V: AnimatableView + 'static,
    {
        Self::build(
            view,
            ui,
            PipelineConfig::default(),
            SectionStore::with_comparator(comparator),
        )
    }

    fn build<V>(
        view: &Arc<V>,
        ui: UiHandle,
        config: PipelineConfig,
        store: SectionStore<T>,
    ) -> Result<Self>
    where
        V: AnimatableView + 'static,
    {
        let pipeline = SerialPipeline::with_config(config, ui.clone())?;
        let view: Weak<dyn AnimatableView> = Arc::downgrade(view) as Weak<dyn AnimatableView>;
        Ok(Self {
            store: Arc::new(WorkerOwned::new(store, &ui)),
            pipeline,
            view,
            ui,
        })
    }

    /// Adds values. Values already present are ignored.
    ///
    /// An empty input resolves immediately without queuing a unit.
    pub fn add<I>(&self, values: I) -> Result<UnitHandle>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        self.ensure_running()?;
        if values.is_empty() {
            return Ok(UnitHandle::finished());
        }
        tracing::debug!(target: targets::RECONCILER, count = values.len(), "add requested");
        self.submit("add", move |store| store.add(values))
    }

    /// Adds a single value.
    pub fn add_one(&self, value: T) -> Result<UnitHandle> {
        self.add([value])
    }

    /// Removes values. Values not present are ignored.
    ///
    /// An empty input resolves immediately without queuing a unit.
    pub fn remove<I>(&self, values: I) -> Result<UnitHandle>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        self.ensure_running()?;
        if values.is_empty() {
            return Ok(UnitHandle::finished());
        }
        tracing::debug!(target: targets::RECONCILER, count = values.len(), "remove requested");
        self.submit("remove", move |store| store.remove(values))
    }

    /// Removes a single value.
    pub fn remove_one(&self, value: T) -> Result<UnitHandle> {
        self.remove([value])
    }

    /// Moves one item without re-sorting.
    ///
    /// Set `by_user` when the view already shows the move, for example after
    /// an interactive drag; the model is then updated without touching the
    /// view.
    pub fn move_item(&self, from: IndexPath, to: IndexPath, by_user: bool) -> Result<UnitHandle> {
        tracing::debug!(target: targets::RECONCILER, %from, %to, by_user, "move requested");
        self.submit("move", move |store| store.move_item(from, to, by_user))
    }

    /// Replaces the comparator and animates every item to its new position.
    ///
    /// `None` keeps the current order for existing items and insertion order
    /// for new ones.
    pub fn set_comparator(&self, comparator: Option<Comparator<T>>) -> Result<UnitHandle> {
        tracing::debug!(target: targets::RECONCILER, clear = comparator.is_none(), "comparator change requested");
        self.submit("reorder", move |store| store.set_comparator(comparator))
    }

    /// Cancels all pending work and stops accepting new work.
    ///
    /// Queued units never run. A unit already computing finishes its compute
    /// phase but its edits are never applied. Every later submission fails
    /// with [`PipelineError::Stopped`].
    pub fn stop(&self) {
        tracing::debug!(target: targets::RECONCILER, pending = self.pipeline.pending_units(), "stop requested");
        self.pipeline.stop();
    }

    /// Whether the reconciler still accepts work.
    pub fn is_running(&self) -> bool {
        self.pipeline.is_running()
    }

    /// Whether no unit is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.pipeline.is_idle()
    }

    /// Number of units waiting to run.
    pub fn pending_units(&self) -> usize {
        self.pipeline.pending_units()
    }

    /// Number of sections in the model.
    ///
    /// # Panics
    ///
    /// Panics if called on the UI thread while a compute phase is running.
    pub fn number_of_sections(&self) -> usize {
        self.store.read(SectionStore::section_count)
    }

    /// Number of items in `section`, or 0 if there is no such section.
    ///
    /// # Panics
    ///
    /// Panics if called on the UI thread while a compute phase is running.
    pub fn number_of_items(&self, section: usize) -> usize {
        self.store.read(|store| store.item_count(section))
    }

    /// The value at `path`.
    ///
    /// # Panics
    ///
    /// Panics if called on the UI thread while a compute phase is running.
    pub fn get(&self, path: IndexPath) -> Option<T> {
        self.store.read(|store| store.get(path).cloned())
    }

    /// The key of `section`.
    pub fn section_key(&self, section: usize) -> Option<T::Key> {
        self.store.read(|store| store.section_key(section).cloned())
    }

    /// The current path of `value`.
    pub fn position_of(&self, value: &T) -> Option<IndexPath> {
        self.store.read(|store| store.position_of(value))
    }

    /// Copies out the current layout, section by section.
    pub fn snapshot(&self) -> Vec<(T::Key, Vec<T>)> {
        self.store.read(SectionStore::snapshot)
    }

    /// The UI queue apply phases are delivered to.
    pub fn ui(&self) -> &UiHandle {
        &self.ui
    }

    fn ensure_running(&self) -> Result<()> {
        if self.pipeline.is_running() {
            Ok(())
        } else {
            Err(PipelineError::Stopped)
        }
    }

    /// Queues a unit that runs `diff` against the store and applies the
    /// resulting script to the view.
    fn submit<F>(&self, label: &'static str, diff: F) -> Result<UnitHandle>
    where
        F: FnOnce(&mut SectionStore<T>) -> Option<EditScript> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let view = self.view.clone();
        let unit = WorkUnit::new(
            move |token: &WorkerToken| store.write(token, diff),
            move |script: EditScript, done: Completion| apply_script(&view, script, done),
        )
        .with_label(label);
        self.pipeline.submit(unit)
    }
}

/// Issues `script` to the view as one batch and finishes the unit when the
/// batch completes.
fn apply_script(view: &Weak<dyn AnimatableView>, script: EditScript, done: Completion) {
    let Some(view) = view.upgrade() else {
        tracing::debug!(target: targets::RECONCILER, unit = %done.unit_id(), "view dropped; edits discarded");
        done.finish();
        return;
    };

    tracing::debug!(target: targets::RECONCILER, unit = %done.unit_id(), edits = script.len(), "applying edits");

    let target: &dyn AnimatableView = view.as_ref();
    view.begin_batch(
        Box::new(move || script.apply_to(target)),
        Box::new(move |finished| {
            tracing::trace!(target: targets::RECONCILER, unit = %done.unit_id(), finished, "batch complete");
            done.finish();
        }),
    );
}

impl<T: SectionValue> fmt::Debug for Reconciler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("pipeline", &self.pipeline)
            .field("view_alive", &(self.view.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(EditScript: Send, Sync);
static_assertions::assert_impl_all!(Weak<dyn AnimatableView>: Send, Sync);
