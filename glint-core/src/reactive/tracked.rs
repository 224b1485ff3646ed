//! Tracked fields and local copies.
//!
//! [`Tracked`] pairs one mutable tag with one storage slot: reads consume
//! the tag, writes update it. [`LocalCopy`] layers a locally writable cell on
//! top of an upstream computation and returns whichever changed last.

use std::cell::RefCell;
use std::fmt::{self, Debug};

use super::cache::Cache;
use super::runtime::Runtime;
use super::tag::Tag;

/// A value together with the tag that describes it.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// The observed value.
    pub value: T,
    /// The tag that was current for `value`.
    pub tag: Tag,
}

impl<T> Snapshot<T> {
    /// Pair a value with its tag.
    pub fn new(value: T, tag: Tag) -> Self {
        Self { value, tag }
    }

    /// Transform the value, keeping the tag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        Snapshot {
            value: f(self.value),
            tag: self.tag,
        }
    }
}

/// Return the snapshot whose tag changed most recently.
///
/// Every tag is consumed, whichever snapshot wins, so a computation reading
/// through this is invalidated by a change to any source. On equal revisions
/// the earliest snapshot wins.
pub fn most_recent<T, I>(first: Snapshot<T>, rest: I) -> Snapshot<T>
where
    I: IntoIterator<Item = Snapshot<T>>,
{
    let runtime = Runtime::current();
    runtime.consume(&first.tag);

    let mut winner = first;
    let mut newest = winner.tag.revision();
    for candidate in rest {
        runtime.consume(&candidate.tag);
        let revision = candidate.tag.revision();
        if revision > newest {
            newest = revision;
            winner = candidate;
        }
    }
    winner
}

/// A tracked storage slot.
///
/// `Tracked` is not shared by itself; wrap it in an `Rc` to read it from a
/// cache closure.
pub struct Tracked<T> {
    value: RefCell<T>,
    tag: Tag,
}

impl<T> Tracked<T> {
    /// Create a tracked slot on the current runtime.
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            tag: Tag::mutable(),
        }
    }

    /// Create a tracked slot on `runtime`.
    pub fn new_in(runtime: &Runtime, value: T) -> Self {
        Self {
            value: RefCell::new(value),
            tag: runtime.mutable_tag(),
        }
    }

    /// Read the value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.tag.consume();
        f(&self.value.borrow())
    }

    /// Read the value without recording a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Store a new value, then mark the slot as changed.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.tag.update();
    }

    /// Modify the value in place, then mark the slot as changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
        self.tag.update();
    }

    /// The slot's tag.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }
}

impl<T: Clone> Tracked<T> {
    /// Read the value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the value and its tag together.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot::new(self.get(), self.tag.clone())
    }
}

impl<T: Debug> Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value.borrow())
            .field("revision", &self.tag.revision())
            .finish()
    }
}

/// An upstream computation with a local override.
///
/// Reads return whichever of the two changed last. Writes only ever touch
/// the local cell; the next upstream change takes over again.
pub struct LocalCopy<T> {
    upstream: Cache<T>,
    local: Tracked<Option<T>>,
}

impl<T: Clone + 'static> LocalCopy<T> {
    /// Create a local copy of `upstream` on the current runtime.
    pub fn new<F>(upstream: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            upstream: Cache::new(upstream),
            local: Tracked::new(None),
        }
    }

    /// Read the most recent of the upstream and local values.
    pub fn read(&self) -> T {
        let upstream_value = self.upstream.get();
        let upstream_tag = self.upstream.tag().unwrap_or_else(Tag::constant);
        let upstream = Snapshot::new(Some(upstream_value.clone()), upstream_tag);
        let local = self.local.snapshot();

        most_recent(upstream, [local])
            .value
            .unwrap_or(upstream_value)
    }

    /// Override the value locally.
    pub fn write(&self, value: T) {
        self.local.set(Some(value));
    }
}
