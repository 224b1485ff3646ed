//! Cache Implementation
//!
//! A cache memoizes a zero-argument computation. It remembers the last value,
//! the tag captured while computing it and the clock revision at capture
//! time, and recomputes only when that tag has moved past the captured
//! revision.
//!
//! # How Caches Work
//!
//! 1. Creating a cache runs nothing.
//!
//! 2. On read, if the captured tag is still valid, the captured tag is
//!    consumed into the caller's frame and the cached value is returned.
//!
//! 3. Otherwise the computation runs under a fresh tracking frame, and the
//!    committed tag and the current revision become the new entry.
//!
//! 4. If the computation fails, the entry is cleared. The next read starts
//!    from scratch instead of returning a value that is known to be stale.
//!
//! Invalidation is pulled on read, never pushed on write. A cache that is not
//! read after its inputs change does no work, and any number of writes
//! between two reads collapse into a single recomputation.

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::TrackFrame;
use super::revision::Revision;
use super::runtime::Runtime;
use super::tag::Tag;
use crate::error::{Error, Result};

struct CacheEntry<T> {
    value: T,
    tag: Tag,
    revision: Revision,
}

struct CacheInner<T, E> {
    runtime: Runtime,
    label: String,
    compute: Box<dyn Fn() -> std::result::Result<T, E>>,
    entry: RefCell<Option<CacheEntry<T>>>,
}

/// A memoized computation.
///
/// # Type Parameters
///
/// - `T`: the computed value. Reads hand out clones, so keep it cheap to
///   clone (wrap large values in `Rc`).
/// - `E`: the error a fallible computation may return. Infallible caches
///   use the default.
///
/// Clones share the same entry.
pub struct Cache<T, E = Infallible> {
    inner: Rc<CacheInner<T, E>>,
}

impl<T: Clone + 'static> Cache<T> {
    /// Create a cache for an infallible computation on the current runtime.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::try_new(move || Ok(compute()))
    }

    /// Read the value, recomputing if a dependency changed.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T: Clone + 'static, E: 'static> Cache<T, E> {
    /// Create a cache for a fallible computation on the current runtime.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + 'static,
    {
        Self::build(Runtime::current(), std::any::type_name::<F>().to_owned(), Box::new(compute))
    }

    fn build(
        runtime: Runtime,
        label: String,
        compute: Box<dyn Fn() -> std::result::Result<T, E>>,
    ) -> Self {
        Self {
            inner: Rc::new(CacheInner {
                runtime,
                label,
                compute,
                entry: RefCell::new(None),
            }),
        }
    }

    /// Replace the debug label used in logs and errors.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        match Rc::try_unwrap(self.inner) {
            Ok(inner) => Self::build(inner.runtime, label.into(), inner.compute),
            // Already shared: keep the existing label rather than split the entry.
            Err(inner) => Self { inner },
        }
    }

    /// The debug label of this cache.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Read the value, recomputing if a dependency changed.
    ///
    /// A failed computation clears the entry, consumes nothing and returns
    /// the error. The computation runs with the cache's runtime entered, so
    /// its reads are recorded even when the caller never entered it.
    ///
    /// # Panics
    ///
    /// If the caller is tracking under a different runtime than the one the
    /// cache was created with.
    pub fn try_get(&self) -> std::result::Result<T, E> {
        let inner = &*self.inner;
        let caller = Runtime::current();

        if let Some(entry) = inner.entry.borrow().as_ref() {
            if entry.tag.validate(entry.revision) {
                caller.consume(&entry.tag);
                return Ok(entry.value.clone());
            }
        }

        // Drop the stale entry first so a panicking computation leaves the
        // cache empty too.
        inner.entry.borrow_mut().take();

        tracing::debug!(cache = %inner.label, "recomputing cache");
        let entered = inner.runtime.enter();
        let frame = TrackFrame::begin(&inner.runtime);
        let result = (inner.compute)();
        let tag = match result {
            Ok(_) => Some(frame.commit()),
            Err(_) => {
                frame.discard();
                None
            }
        };
        drop(entered);

        match (result, tag) {
            (Ok(value), Some(tag)) => {
                // Committing consumed the tag into this runtime's frames
                // already; a caller on another runtime still needs it.
                if !caller.ptr_eq(&inner.runtime) {
                    caller.consume(&tag);
                }
                let revision = inner.runtime.current_revision();
                *inner.entry.borrow_mut() = Some(CacheEntry {
                    value: value.clone(),
                    tag,
                    revision,
                });
                Ok(value)
            }
            (result, _) => {
                tracing::debug!(cache = %inner.label, "cache computation failed; entry cleared");
                result
            }
        }
    }

    /// Whether the last computation had no dependencies at all.
    ///
    /// A cache that has never been computed, or whose last computation
    /// failed, is not constant.
    pub fn is_const(&self) -> bool {
        self.inner
            .entry
            .borrow()
            .as_ref()
            .is_some_and(|entry| entry.tag.is_constant())
    }

    /// The tag captured by the last successful computation.
    pub fn tag(&self) -> Option<Tag> {
        self.inner.entry.borrow().as_ref().map(|entry| entry.tag.clone())
    }

    /// Whether a value is cached, valid or not.
    pub fn has_value(&self) -> bool {
        self.inner.entry.borrow().is_some()
    }

    /// Whether a read would return the cached value without recomputing.
    pub fn is_valid(&self) -> bool {
        self.inner
            .entry
            .borrow()
            .as_ref()
            .is_some_and(|entry| entry.tag.validate(entry.revision))
    }

    fn belongs_to(&self, runtime: &Runtime) -> bool {
        self.inner.runtime.ptr_eq(runtime)
    }
}

impl Runtime {
    /// Create a cache bound to this runtime.
    pub fn create_cache<T, F>(&self, compute: F) -> Cache<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Cache::build(
            self.clone(),
            std::any::type_name::<F>().to_owned(),
            Box::new(move || Ok(compute())),
        )
    }

    /// Read a cache created by this runtime.
    pub fn get_cache<T: Clone + 'static>(&self, cache: &Cache<T>) -> Result<T> {
        if !cache.belongs_to(self) {
            return Err(Error::InvalidCacheHandle {
                label: cache.label().to_owned(),
            });
        }
        Ok(cache.get())
    }
}

impl<T, E> Clone for Cache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug, E> Debug for Cache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.inner.entry.borrow();
        f.debug_struct("Cache")
            .field("label", &self.inner.label)
            .field("value", &entry.as_ref().map(|entry| &entry.value))
            .field("revision", &entry.as_ref().map(|entry| entry.revision))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
