//! Tracked array.
//!
//! Element reads are tracked per index. Structural changes (push, pop,
//! insert, remove) dirty the collection tag together with the tag of every
//! index whose element moved.

use std::cell::RefCell;
use std::fmt::{self, Debug};

use super::{default_equals, Equals};
use crate::reactive::{Runtime, Tag};

/// A vector whose reads are tracked per index.
pub struct TrackedArray<T> {
    runtime: Runtime,
    items: RefCell<Vec<T>>,
    index_tags: RefCell<Vec<Option<Tag>>>,
    collection: Tag,
    equals: Equals<T>,
}

impl<T: PartialEq + 'static> TrackedArray<T> {
    /// Create an empty array on the current runtime.
    pub fn new() -> Self {
        Self::with_equals(default_equals::<T>)
    }

    /// Create an array holding `items`.
    pub fn from_items<I: IntoIterator<Item = T>>(items: I) -> Self {
        let array = Self::new();
        array.items.borrow_mut().extend(items);
        array
    }
}

impl<T> TrackedArray<T> {
    /// Create an empty array that uses `equals` to skip redundant writes.
    pub fn with_equals(equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let runtime = Runtime::current();
        Self {
            collection: runtime.mutable_tag(),
            runtime,
            items: RefCell::new(Vec::new()),
            index_tags: RefCell::new(Vec::new()),
            equals: Box::new(equals),
        }
    }

    fn index_tag(&self, index: usize) -> Tag {
        let mut tags = self.index_tags.borrow_mut();
        if tags.len() <= index {
            tags.resize(index + 1, None);
        }
        tags[index]
            .get_or_insert_with(|| self.runtime.mutable_tag())
            .clone()
    }

    /// Consume the tag of `index`, creating it only if someone is tracking.
    fn consume_index(&self, index: usize) {
        let current = Runtime::current();
        if current.is_tracking() {
            current.consume(&self.index_tag(index));
        }
    }

    /// Forget the tags of indices past the end. Callers dirty them first.
    fn prune(&self) {
        let len = self.items.borrow().len();
        self.index_tags.borrow_mut().truncate(len);
    }

    /// Dirty the tags of every tracked index from `start` on.
    fn dirty_from(&self, start: usize) {
        let tags: Vec<Tag> = self
            .index_tags
            .borrow()
            .iter()
            .skip(start)
            .flatten()
            .cloned()
            .collect();
        for tag in tags {
            tag.update();
        }
    }

    /// Run `f` on the element at `index`.
    ///
    /// Out-of-range reads depend on the collection instead, so they notice
    /// the array growing. The array is borrowed while `f` runs, so `f` must
    /// not write to it.
    pub fn with<R>(&self, index: usize, f: impl FnOnce(Option<&T>) -> R) -> R {
        if index < self.items.borrow().len() {
            self.consume_index(index);
        } else {
            self.collection.consume();
        }
        f(self.items.borrow().get(index))
    }

    /// Replace the element at `index`, returning false when out of range.
    pub fn set(&self, index: usize, value: T) -> bool {
        {
            let mut items = self.items.borrow_mut();
            match items.get_mut(index) {
                None => return false,
                Some(existing) if (self.equals)(&*existing, &value) => return true,
                Some(existing) => *existing = value,
            }
        }
        if let Some(Some(tag)) = self.index_tags.borrow().get(index).cloned() {
            tag.update();
        }
        true
    }

    /// Append an element.
    pub fn push(&self, value: T) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        self.dirty_from(index);
        self.collection.update();
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<T> {
        let (value, index) = {
            let mut items = self.items.borrow_mut();
            let value = items.pop()?;
            (value, items.len())
        };
        self.dirty_from(index);
        self.prune();
        self.collection.update();
        Some(value)
    }

    /// Insert at `index`, shifting later elements.
    ///
    /// Returns false when `index` is past the end.
    pub fn insert(&self, index: usize, value: T) -> bool {
        {
            let mut items = self.items.borrow_mut();
            if index > items.len() {
                return false;
            }
            items.insert(index, value);
        }
        self.dirty_from(index);
        self.collection.update();
        true
    }

    /// Remove the element at `index`, shifting later elements.
    pub fn remove(&self, index: usize) -> Option<T> {
        let value = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.dirty_from(index);
        self.prune();
        self.collection.update();
        Some(value)
    }

    /// Number of elements. Depends only on the collection.
    pub fn len(&self) -> usize {
        self.collection.consume();
        self.items.borrow().len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every element.
    pub fn clear(&self) {
        let was_empty = {
            let mut items = self.items.borrow_mut();
            let was_empty = items.is_empty();
            items.clear();
            was_empty
        };
        if !was_empty {
            self.dirty_from(0);
            self.prune();
            self.collection.update();
        }
    }

    #[cfg(test)]
    fn index_tag_count(&self) -> usize {
        self.index_tags.borrow().len()
    }
}

impl<T: Clone> TrackedArray<T> {
    /// The element at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.with(index, |item| item.cloned())
    }

    /// Visit every element in order.
    ///
    /// `f` sees a copy taken before the first call, so it may write to the
    /// array.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        self.collection.consume();
        let items = self.items.borrow().clone();
        for index in 0..items.len() {
            self.consume_index(index);
        }
        for (index, item) in items.iter().enumerate() {
            f(index, item);
        }
    }

    /// Copy out every element.
    pub fn to_vec(&self) -> Vec<T> {
        let mut items = Vec::new();
        self.for_each(|_, item| items.push(item.clone()));
        items
    }
}

impl<T: PartialEq + 'static> Default for TrackedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq + 'static> FromIterator<T> for TrackedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

impl<T: Debug> Debug for TrackedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}
