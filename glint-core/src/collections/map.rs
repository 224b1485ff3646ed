//! Tracked map.
//!
//! Storage is insertion ordered, so enumeration is deterministic. Tags are
//! created lazily: one per key that has been read while tracked, plus one
//! for the collection as a whole. A key's tag is dropped when the key is
//! deleted or the map is cleared.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::Hash;

use indexmap::IndexMap;

use super::{default_equals, Equals};
use crate::reactive::{Runtime, Tag};

/// A map whose reads are tracked per key.
pub struct TrackedMap<K, V> {
    runtime: Runtime,
    values: RefCell<IndexMap<K, V>>,
    key_tags: RefCell<IndexMap<K, Tag>>,
    collection: Tag,
    equals: Equals<V>,
}

impl<K, V> TrackedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + 'static,
{
    /// Create an empty map on the current runtime.
    pub fn new() -> Self {
        Self::with_equals(default_equals::<V>)
    }

    /// Create a map pre-filled with `entries`.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let map = Self::new();
        map.values.borrow_mut().extend(entries);
        map
    }
}

impl<K, V> TrackedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty map that uses `equals` to skip redundant writes.
    ///
    /// Pass `|_, _| false` to dirty on every write.
    pub fn with_equals(equals: impl Fn(&V, &V) -> bool + 'static) -> Self {
        let runtime = Runtime::current();
        Self {
            collection: runtime.mutable_tag(),
            runtime,
            values: RefCell::new(IndexMap::new()),
            key_tags: RefCell::new(IndexMap::new()),
            equals: Box::new(equals),
        }
    }

    fn key_tag(&self, key: &K) -> Tag {
        self.key_tags
            .borrow_mut()
            .entry(key.clone())
            .or_insert_with(|| self.runtime.mutable_tag())
            .clone()
    }

    /// Consume the tag of `key`, creating it only if someone is tracking.
    fn consume_key(&self, key: &K) {
        let current = Runtime::current();
        if current.is_tracking() {
            current.consume(&self.key_tag(key));
        }
    }

    fn dirty_key(&self, key: &K) {
        let tag = self.key_tags.borrow().get(key).cloned();
        if let Some(tag) = tag {
            tag.update();
        }
    }

    /// Whether `key` is present. Depends only on `key`.
    pub fn has(&self, key: &K) -> bool {
        self.consume_key(key);
        self.values.borrow().contains_key(key)
    }

    /// Run `f` on the value stored at `key`.
    ///
    /// The map is borrowed while `f` runs, so `f` must not write to it.
    pub fn with<R>(&self, key: &K, f: impl FnOnce(Option<&V>) -> R) -> R {
        self.consume_key(key);
        let values = self.values.borrow();
        let value = values.get(key);
        if value.is_none() {
            self.collection.consume();
        }
        f(value)
    }

    /// Store `value` at `key`.
    ///
    /// Writing a value equal to the stored one changes nothing.
    pub fn set(&self, key: K, value: V) {
        let inserted = {
            let mut values = self.values.borrow_mut();
            match values.get_mut(&key) {
                Some(existing) if (self.equals)(&*existing, &value) => return,
                Some(existing) => {
                    *existing = value;
                    false
                }
                None => {
                    values.insert(key.clone(), value);
                    true
                }
            }
        };

        self.dirty_key(&key);
        if inserted {
            self.collection.update();
        }
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.values.borrow_mut().shift_remove(key).is_some();
        if removed {
            self.dirty_key(key);
            self.key_tags.borrow_mut().shift_remove(key);
            self.collection.update();
        }
        removed
    }

    /// Number of entries. Depends only on the collection.
    pub fn len(&self) -> usize {
        self.collection.consume();
        self.values.borrow().len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.collection.consume();
        self.values.borrow().keys().cloned().collect()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let was_empty = {
            let mut values = self.values.borrow_mut();
            let was_empty = values.is_empty();
            values.clear();
            was_empty
        };
        if was_empty {
            return;
        }

        let tags: Vec<Tag> = self.key_tags.borrow_mut().drain(..).map(|(_, tag)| tag).collect();
        for tag in tags {
            tag.update();
        }
        self.collection.update();
    }

    #[cfg(test)]
    fn key_tag_count(&self) -> usize {
        self.key_tags.borrow().len()
    }
}

impl<K, V> TrackedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// The value at `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.with(key, |value| value.cloned())
    }

    /// Visit every entry in insertion order.
    ///
    /// Consumes the collection tag and the tag of every visited key. `f`
    /// sees a snapshot taken before the first call, so it may write to the
    /// map.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        self.collection.consume();
        let entries: Vec<(K, V)> = self
            .values
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, _) in &entries {
            self.consume_key(key);
        }
        for (key, value) in &entries {
            f(key, value);
        }
    }

    /// Values in insertion order.
    pub fn values(&self) -> Vec<V> {
        let mut values = Vec::new();
        self.for_each(|_, value| values.push(value.clone()));
        values
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut entries = Vec::new();
        self.for_each(|key, value| entries.push((key.clone(), value.clone())));
        entries
    }
}

impl<K, V> Default for TrackedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for TrackedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<K: Debug, V: Debug> Debug for TrackedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.borrow().iter()).finish()
    }
}
