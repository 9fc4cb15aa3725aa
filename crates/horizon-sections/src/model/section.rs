//! A keyed, ordered group of items.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::item::{ItemWrapper, SectionValue};

/// Ordering predicate: returns `true` if the first value sorts before the
/// second.
///
/// Must describe a strict weak ordering. Values it considers equivalent keep
/// their relative insertion order.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// An ordered list of items sharing one section key.
///
/// Sections are plain data. The store decides when they are created,
/// re-sorted and dropped.
pub struct Section<T: SectionValue> {
    key: T::Key,
    items: Vec<ItemWrapper<T>>,
    is_new: bool,
    is_order_invalidated: bool,
}

impl<T: SectionValue> Section<T> {
    /// Creates an empty, new section.
    pub fn new(key: T::Key) -> Self {
        Self {
            key,
            items: Vec::new(),
            is_new: true,
            is_order_invalidated: false,
        }
    }

    /// The section key.
    pub fn key(&self) -> &T::Key {
        &self.key
    }

    /// The items, in display order.
    pub fn items(&self) -> &[ItemWrapper<T>] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ItemWrapper<T>> {
        &mut self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the section has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether no insertion edit has been emitted for this section yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Clears the new flag once the section insert has been emitted.
    pub fn mark_settled(&mut self) {
        self.is_new = false;
    }

    /// Whether the item order may be stale.
    pub fn is_order_invalidated(&self) -> bool {
        self.is_order_invalidated
    }

    /// Marks the item order as stale.
    ///
    /// The next [`sort_if_needed`](Self::sort_if_needed) places the new items.
    pub fn invalidate_order(&mut self) {
        self.is_order_invalidated = true;
    }

    /// Appends an item and marks the order stale.
    pub fn append(&mut self, item: ItemWrapper<T>) {
        self.items.push(item);
        self.is_order_invalidated = true;
    }

    /// Returns the row of `value`, if present.
    pub fn position_of(&self, value: &T) -> Option<usize> {
        self.items.iter().position(|item| item.value() == value)
    }

    /// Stable-sorts the items and clears the dirty flag.
    ///
    /// Without a comparator the current order is kept.
    pub fn sort_by(&mut self, comparator: Option<&Comparator<T>>) {
        if let Some(before) = comparator {
            self.items
                .sort_by(|a, b| ordering(before.as_ref(), a.value(), b.value()));
        }
        self.is_order_invalidated = false;
    }

    /// Places new items among the settled ones.
    ///
    /// Settled items keep their relative order, even if a manual move has
    /// left them out of comparator order. Each new item goes to the first
    /// row whose item it sorts before. On a section already in comparator
    /// order this matches a stable sort. Clears the dirty flag.
    pub fn place_new_items(&mut self, comparator: Option<&Comparator<T>>) {
        if let Some(before) = comparator {
            let (fresh, settled): (Vec<ItemWrapper<T>>, Vec<ItemWrapper<T>>) =
                std::mem::take(&mut self.items)
                    .into_iter()
                    .partition(ItemWrapper::is_new);
            self.items = settled;
            for item in fresh {
                let row = self
                    .items
                    .iter()
                    .position(|existing| before(item.value(), existing.value()))
                    .unwrap_or(self.items.len());
                self.items.insert(row, item);
            }
        }
        self.is_order_invalidated = false;
    }

    /// Orders the section if it is new or has new items.
    ///
    /// A new section is sorted outright; a stale one only places its new
    /// items. Returns whether any work was done.
    pub fn sort_if_needed(&mut self, comparator: Option<&Comparator<T>>) -> bool {
        if self.is_new {
            self.sort_by(comparator);
            true
        } else if self.is_order_invalidated {
            self.place_new_items(comparator);
            true
        } else {
            false
        }
    }
}

/// Derive a total ordering from a "sorts before" predicate.
fn ordering<T>(before: &(dyn Fn(&T, &T) -> bool + Send + Sync), a: &T, b: &T) -> Ordering {
    if before(a, b) {
        Ordering::Less
    } else if before(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

impl<T: SectionValue + fmt::Debug> fmt::Debug for Section<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} => {:?}", self.key, self.items)
    }
}
