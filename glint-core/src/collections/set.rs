//! Tracked set.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::reactive::{Runtime, Tag};

/// An insertion-ordered set whose membership checks are tracked per value.
pub struct TrackedSet<T> {
    runtime: Runtime,
    values: RefCell<IndexSet<T>>,
    value_tags: RefCell<IndexMap<T, Tag>>,
    collection: Tag,
}

impl<T: Eq + Hash + Clone> TrackedSet<T> {
    /// Create an empty set on the current runtime.
    pub fn new() -> Self {
        let runtime = Runtime::current();
        Self {
            collection: runtime.mutable_tag(),
            runtime,
            values: RefCell::new(IndexSet::new()),
            value_tags: RefCell::new(IndexMap::new()),
        }
    }

    /// Create a set holding `values`.
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let set = Self::new();
        set.values.borrow_mut().extend(values);
        set
    }

    fn value_tag(&self, value: &T) -> Tag {
        self.value_tags
            .borrow_mut()
            .entry(value.clone())
            .or_insert_with(|| self.runtime.mutable_tag())
            .clone()
    }

    fn dirty_value(&self, value: &T) {
        let tag = self.value_tags.borrow().get(value).cloned();
        if let Some(tag) = tag {
            tag.update();
        }
    }

    /// Whether `value` is a member. Depends only on `value`.
    ///
    /// Untracked checks allocate no tag.
    pub fn has(&self, value: &T) -> bool {
        let current = Runtime::current();
        if current.is_tracking() {
            current.consume(&self.value_tag(value));
        }
        self.values.borrow().contains(value)
    }

    /// Add `value`, returning whether it was newly inserted.
    pub fn add(&self, value: T) -> bool {
        let inserted = self.values.borrow_mut().insert(value.clone());
        if inserted {
            self.dirty_value(&value);
            self.collection.update();
        }
        inserted
    }

    /// Remove `value`, returning whether it was present.
    pub fn delete(&self, value: &T) -> bool {
        let removed = self.values.borrow_mut().shift_remove(value);
        if removed {
            self.dirty_value(value);
            self.value_tags.borrow_mut().shift_remove(value);
            self.collection.update();
        }
        removed
    }

    /// Number of members. Depends only on the collection.
    pub fn len(&self) -> usize {
        self.collection.consume();
        self.values.borrow().len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every member in insertion order.
    ///
    /// `f` sees a copy taken before the first call, so it may write to the
    /// set.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.collection.consume();
        let values: Vec<T> = self.values.borrow().iter().cloned().collect();
        for value in &values {
            f(value);
        }
    }

    /// Members in insertion order.
    pub fn values(&self) -> Vec<T> {
        let mut values = Vec::new();
        self.for_each(|value| values.push(value.clone()));
        values
    }

    /// Remove every member.
    pub fn clear(&self) {
        let removed: Vec<T> = self.values.borrow_mut().drain(..).collect();
        if removed.is_empty() {
            return;
        }
        // Checks for absent values are dirtied too; their tags go as well.
        let tags: Vec<Tag> = self.value_tags.borrow_mut().drain(..).map(|(_, tag)| tag).collect();
        for tag in tags {
            tag.update();
        }
        self.collection.update();
    }

    #[cfg(test)]
    fn value_tag_count(&self) -> usize {
        self.value_tags.borrow().len()
    }
}

impl<T: Eq + Hash + Clone> Default for TrackedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for TrackedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T: Debug> Debug for TrackedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.borrow().iter()).finish()
    }
}
