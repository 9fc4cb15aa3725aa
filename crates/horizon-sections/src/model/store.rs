//! The section store and the diff algorithms that mutate it.
//!
//! Every mutating operation runs to completion and returns the edit script
//! that brings a view showing the previous layout in sync with the new one.
//! `None` means nothing observable changed and the view must not be touched.
//!
//! The store itself is single-threaded. The reconciler wraps it in
//! [`WorkerOwned`](horizon_sections_core::WorkerOwned) so that these methods
//! only ever run inside a pipeline compute phase.

use std::collections::{HashMap, HashSet};
use std::fmt;

use horizon_sections_core::logging::targets;
use horizon_sections_core::thread_check::panic_contract_violation;

use super::edit::{Edit, EditScript};
use super::index::IndexPath;
use super::item::{ItemWrapper, SectionValue};
use super::move_record::MoveRecord;
use super::section::{Comparator, Section};

/// Ordered sections of ordered items.
///
/// Sections are sorted by key, descending. Items within a section are sorted
/// by the active comparator, or kept in insertion order without one.
pub struct SectionStore<T: SectionValue> {
    sections: Vec<Section<T>>,
    comparator: Option<Comparator<T>>,
}

impl<T: SectionValue> Default for SectionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SectionValue> SectionStore<T> {
    /// Creates an empty store without a comparator.
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            comparator: None,
        }
    }

    /// Creates an empty store with an initial comparator.
    pub fn with_comparator(comparator: Comparator<T>) -> Self {
        Self {
            sections: Vec::new(),
            comparator: Some(comparator),
        }
    }

    /// The active comparator.
    pub fn comparator(&self) -> Option<&Comparator<T>> {
        self.comparator.as_ref()
    }

    /// The sections, in display order.
    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of items in `section`, or 0 if there is no such section.
    pub fn item_count(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, Section::len)
    }

    /// Total number of items across all sections.
    pub fn total_items(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    /// The key of `section`.
    pub fn section_key(&self, section: usize) -> Option<&T::Key> {
        self.sections.get(section).map(Section::key)
    }

    /// The value at `path`.
    pub fn get(&self, path: IndexPath) -> Option<&T> {
        self.sections
            .get(path.section())
            .and_then(|section| section.items().get(path.row()))
            .map(ItemWrapper::value)
    }

    /// Whether `value` is stored.
    pub fn contains(&self, value: &T) -> bool {
        self.position_of(value).is_some()
    }

    /// The current path of `value`.
    ///
    /// Looks in the section for the value's key first. A manual move may
    /// have put it under another key, so the other sections are searched
    /// after that.
    pub fn position_of(&self, value: &T) -> Option<IndexPath> {
        let home = self.find_section(&value.section_key()).ok();
        let found = home
            .and_then(|section| self.sections[section].position_of(value).map(|row| (section, row)))
            .or_else(|| {
                self.sections
                    .iter()
                    .enumerate()
                    .filter(|&(section, _)| Some(section) != home)
                    .find_map(|(section, items)| items.position_of(value).map(|row| (section, row)))
            });
        found.map(|(section, row)| IndexPath::new(section, row))
    }

    /// Copies out the current layout.
    pub fn snapshot(&self) -> Vec<(T::Key, Vec<T>)> {
        self.sections
            .iter()
            .map(|section| {
                (
                    section.key().clone(),
                    section.items().iter().map(|i| i.value().clone()).collect(),
                )
            })
            .collect()
    }

    /// Adds values, ignoring duplicates.
    ///
    /// Duplicates within `values` collapse to their first occurrence, and
    /// values already stored are skipped. New items are placed among the
    /// existing ones without moving them, so the script needs no moves.
    /// New sections are reported as
    /// section inserts (their items are covered by the section insert); new
    /// items in existing sections are reported as item inserts. Section
    /// inserts come first, ascending, then item inserts ascending by path.
    /// All indices address the layout after the pass.
    pub fn add<I>(&mut self, values: I) -> Option<EditScript>
    where
        I: IntoIterator<Item = T>,
    {
        let input: Vec<T> = values.into_iter().collect();
        let keep: Vec<bool> = {
            let mut seen: HashSet<&T> = self
                .sections
                .iter()
                .flat_map(|section| section.items().iter().map(ItemWrapper::value))
                .collect();
            input.iter().map(|value| seen.insert(value)).collect()
        };
        let fresh: Vec<T> = input
            .into_iter()
            .zip(keep)
            .filter_map(|(value, keep)| keep.then_some(value))
            .collect();

        if fresh.is_empty() {
            tracing::debug!(target: targets::STORE, "add: nothing new");
            return None;
        }

        for value in fresh {
            let section = self.locate_or_create(value.section_key());
            self.sections[section].append(ItemWrapper::new(value));
        }

        self.sort_sections();

        let mut section_inserts = Vec::new();
        let mut item_inserts = Vec::new();
        for (section_index, section) in self.sections.iter_mut().enumerate() {
            if section.is_new() {
                section_inserts.push(Edit::InsertSection(section_index));
                section.mark_settled();
                section.items_mut().iter_mut().for_each(ItemWrapper::mark_settled);
                continue;
            }
            for (row, item) in section.items_mut().iter_mut().enumerate() {
                if item.is_new() {
                    item_inserts.push(Edit::InsertItem(IndexPath::new(section_index, row)));
                    item.mark_settled();
                }
            }
        }

        tracing::debug!(
            target: targets::STORE,
            sections = section_inserts.len(),
            items = item_inserts.len(),
            "add: diff computed"
        );

        let mut script = EditScript::from(section_inserts);
        script.extend(item_inserts);
        Some(script)
    }

    /// Removes values. Values that are not stored are ignored.
    ///
    /// Sections left empty are dropped and reported as section removals;
    /// item removals inside dropped sections are subsumed. Surviving items
    /// keep their order. Section removals come first, then item removals.
    /// Both are emitted in descending order and address the layout before
    /// the pass.
    pub fn remove<I>(&mut self, values: I) -> Option<EditScript>
    where
        I: IntoIterator<Item = T>,
    {
        let doomed: HashSet<T> = values.into_iter().collect();
        if doomed.is_empty() {
            return None;
        }

        let mut removed_sections = Vec::new();
        let mut removed_items = Vec::new();

        let previous = std::mem::take(&mut self.sections);
        for (section_index, mut section) in previous.into_iter().enumerate() {
            let before = section.len();
            let mut row = 0;
            let mut paths = Vec::new();
            section.items_mut().retain(|item| {
                let keep = !doomed.contains(item.value());
                if !keep {
                    paths.push(IndexPath::new(section_index, row));
                }
                row += 1;
                keep
            });

            if section.is_empty() {
                removed_sections.push(section_index);
                continue;
            }
            if section.len() != before {
                removed_items.extend(paths);
            }
            self.sections.push(section);
        }

        if removed_sections.is_empty() && removed_items.is_empty() {
            tracing::debug!(target: targets::STORE, "remove: nothing to remove");
            return None;
        }

        removed_sections.sort_unstable_by(|a, b| b.cmp(a));
        removed_items.sort_unstable_by(|a, b| b.cmp(a));

        tracing::debug!(
            target: targets::STORE,
            sections = removed_sections.len(),
            items = removed_items.len(),
            "remove: diff computed"
        );

        let mut script: EditScript = removed_sections
            .into_iter()
            .map(Edit::RemoveSection)
            .collect::<Vec<_>>()
            .into();
        script.extend(removed_items.into_iter().map(Edit::RemoveItem));
        Some(script)
    }

    /// Moves one item from `from` to `to` without sorting.
    ///
    /// `to` addresses the layout after the item has been taken out of
    /// `from`. When `by_user` is set the view already shows the move, so the
    /// model is updated silently and `None` is returned. Moves with an
    /// out-of-range path are ignored.
    ///
    /// A move that empties its source section drops that section. The script
    /// then removes the section and inserts the item at its new path, since a
    /// batch cannot move an item out of a section it removes.
    pub fn move_item(&mut self, from: IndexPath, to: IndexPath, by_user: bool) -> Option<EditScript> {
        if from == to {
            return None;
        }
        if let Err(reason) = self.validate_move(from, to) {
            tracing::warn!(target: targets::STORE, %from, %to, reason, "move ignored");
            return None;
        }

        let item = self.sections[from.section()].items_mut().remove(from.row());
        self.sections[to.section()].items_mut().insert(to.row(), item);

        let emptied = self.sections[from.section()].is_empty();
        if emptied {
            self.sections.remove(from.section());
        }

        tracing::debug!(target: targets::STORE, %from, %to, by_user, emptied, "move applied");

        if by_user {
            return None;
        }
        if emptied {
            let section = if from.section() < to.section() {
                to.section() - 1
            } else {
                to.section()
            };
            return Some(EditScript::from(vec![
                Edit::RemoveSection(from.section()),
                Edit::InsertItem(IndexPath::new(section, to.row())),
            ]));
        }
        Some(EditScript::from(vec![Edit::MoveItem { from, to }]))
    }

    /// Replaces the comparator and reorders every section.
    pub fn set_comparator(&mut self, comparator: Option<Comparator<T>>) -> Option<EditScript> {
        self.comparator = comparator;
        self.reorder()
    }

    /// Re-sorts every section from scratch and reports the resulting moves.
    ///
    /// Each item's position is recorded before the sort and matched by value
    /// afterwards. One move is emitted per item whose position changed,
    /// ascending by destination; sources address the layout before the pass
    /// and destinations the layout after it.
    ///
    /// # Panics
    ///
    /// Panics if an item appears after the sort that was not present before
    /// it. That would mean the store is corrupted.
    pub fn reorder(&mut self) -> Option<EditScript> {
        let mut records = Vec::with_capacity(self.total_items());
        let mut lookup = HashMap::with_capacity(self.total_items());
        for (section_index, section) in self.sections.iter().enumerate() {
            for (row, item) in section.items().iter().enumerate() {
                lookup.insert(item.value().clone(), records.len());
                records.push(MoveRecord::new(
                    item.value().clone(),
                    IndexPath::new(section_index, row),
                ));
            }
        }

        let comparator = self.comparator.clone();
        for section in &mut self.sections {
            section.sort_by(comparator.as_ref());
        }
        self.sections.sort_by(|a, b| b.key().cmp(a.key()));

        for (section_index, section) in self.sections.iter().enumerate() {
            for (row, item) in section.items().iter().enumerate() {
                let path = IndexPath::new(section_index, row);
                match lookup.get(item.value()) {
                    Some(&record) => records[record].resolve(path),
                    None => missing_move_record::<T>(path),
                }
            }
        }

        let mut moves: Vec<&MoveRecord<T>> = records.iter().filter(|r| r.is_move()).collect();
        moves.sort_by_key(|record| record.to());

        tracing::debug!(target: targets::STORE, items = records.len(), moves = moves.len(), "reorder: diff computed");

        if moves.is_empty() {
            return None;
        }
        Some(
            moves
                .into_iter()
                .map(|record| Edit::MoveItem {
                    from: record.from(),
                    to: record.to(),
                })
                .collect::<Vec<_>>()
                .into(),
        )
    }

    /// Binary search for `key` in the descending section order.
    fn find_section(&self, key: &T::Key) -> Result<usize, usize> {
        self.sections.binary_search_by(|section| key.cmp(section.key()))
    }

    /// Returns the index of the section for `key`, creating it in key order
    /// if needed.
    fn locate_or_create(&mut self, key: T::Key) -> usize {
        match self.find_section(&key) {
            Ok(index) => index,
            Err(index) => {
                tracing::trace!(target: targets::STORE, ?key, index, "section created");
                self.sections.insert(index, Section::new(key));
                index
            }
        }
    }

    /// Orders new and dirty sections and re-establishes key order.
    fn sort_sections(&mut self) {
        let comparator = self.comparator.clone();
        let mut sorted = 0usize;
        for section in &mut self.sections {
            if section.sort_if_needed(comparator.as_ref()) {
                sorted += 1;
            }
        }
        self.sections.sort_by(|a, b| b.key().cmp(a.key()));
        tracing::trace!(target: targets::STORE, sorted, total = self.sections.len(), "sections sorted");
    }

    fn validate_move(&self, from: IndexPath, to: IndexPath) -> Result<(), &'static str> {
        let source = self
            .sections
            .get(from.section())
            .ok_or("source section out of range")?;
        if from.row() >= source.len() {
            return Err("source row out of range");
        }
        let target = self
            .sections
            .get(to.section())
            .ok_or("destination section out of range")?;

        if from.section() == to.section() {
            if to.row() >= source.len() {
                return Err("destination row out of range");
            }
        } else if to.row() > target.len() {
            return Err("destination row out of range");
        }
        Ok(())
    }
}

#[cold]
#[inline(never)]
fn missing_move_record<T>(path: IndexPath) -> ! {
    panic_contract_violation(
        &format!(
            "reorder found an item at {path} with no position recorded before the sort \
             (value type {})",
            std::any::type_name::<T>()
        ),
        "Every item present after a sort must have been present before it. The\n\
         section store has been mutated outside a compute phase.",
    )
}

impl<T: SectionValue + fmt::Debug> fmt::Debug for SectionStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionStore")
            .field("sections", &self.sections)
            .field("has_comparator", &self.comparator.is_some())
            .finish()
    }
}
