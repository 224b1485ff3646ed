//! Reactive Runtime
//!
//! The runtime is the context object that owns every piece of process-wide
//! reactive state: the revision clock, the tracking frame stack, the
//! destroyable meta store and the hooks installed by the embedder.
//!
//! # How It Works
//!
//! 1. Each thread has a stack of entered runtimes. [`Runtime::current`]
//!    returns the innermost one, falling back to a lazily created default
//!    runtime for the thread.
//!
//! 2. Tags, caches and tracked collections bind to the current runtime when
//!    they are created. Mutable tags advance their own runtime's clock.
//!
//! 3. Reads are consumed into the frames of whichever runtime is current when
//!    the read happens.
//!
//! Independent runtimes never share revisions, which lets tests build a
//! fresh runtime each and never observe each other.
//!
//! # Thread Safety
//!
//! None. The runtime is built from `Rc` and `RefCell` and is neither `Send`
//! nor `Sync`; reentrancy (nested frames, nested destruction) is the only
//! form of concurrency it deals with.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::FrameStack;
use super::revision::{Clock, Revision};
use super::tag::Tag;
use crate::config::RuntimeConfig;
use crate::destroyable::{DestroyTask, DestroyableStore};
use crate::error::{Error, Result};

/// Hooks supplied by the embedder.
///
/// The runtime only promises *that* a hook is called, with which arguments
/// and in which relative order. When the scheduled work actually runs is up
/// to the implementation.
pub trait GlobalContext {
    /// A tracked mutation happened; anything rendered from tracked state may
    /// need to be revalidated. Batching is the embedder's concern.
    fn schedule_revalidate(&self);

    /// Run `task` at some later point.
    fn schedule_destroy(&self, task: DestroyTask);

    /// Run `finalizer` after the destructors scheduled before it.
    fn schedule_destroyed(&self, finalizer: Box<dyn FnOnce()>);
}

pub(crate) struct RuntimeInner {
    pub(crate) clock: Rc<Clock>,
    pub(crate) frames: FrameStack,
    pub(crate) destroyables: RefCell<DestroyableStore>,
    pub(crate) config: RuntimeConfig,
    context: OnceCell<Rc<dyn GlobalContext>>,
}

/// Handle to a reactive runtime. Clones share the same state.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Runtime>> = const { RefCell::new(Vec::new()) };
    static DEFAULT_RUNTIME: Runtime = Runtime::new();
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let frames = FrameStack::new(config.dedupe_consumed_tags);
        let destroyables = DestroyableStore::new(config.destroyable_sweep_threshold);
        Self {
            inner: Rc::new(RuntimeInner {
                clock: Rc::new(Clock::new()),
                frames,
                destroyables: RefCell::new(destroyables),
                config,
                context: OnceCell::new(),
            }),
        }
    }

    /// The runtime current on this thread.
    pub fn current() -> Runtime {
        RUNTIME_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(|| DEFAULT_RUNTIME.with(Runtime::clone))
    }

    /// Make this runtime current until the returned guard is dropped.
    pub fn enter(&self) -> RuntimeGuard {
        RUNTIME_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        RuntimeGuard {
            runtime: self.clone(),
        }
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn clock(&self) -> &Rc<Clock> {
        &self.inner.clock
    }

    /// The last issued revision.
    pub fn current_revision(&self) -> Revision {
        self.inner.clock.current()
    }

    /// Advance the clock. Normally only reached through [`Tag::update`].
    pub fn advance_revision(&self) -> Revision {
        self.inner.clock.advance()
    }

    /// Create a mutable tag bound to this runtime.
    pub fn mutable_tag(&self) -> Tag {
        Tag::mutable_in(self)
    }

    /// Record `tag` as a dependency of the running computation, if any.
    ///
    /// # Panics
    ///
    /// If a frame is active and `tag` was created by another runtime. Its
    /// revisions come from a different clock and cannot be validated here.
    pub fn consume(&self, tag: &Tag) {
        if self.is_tracking() && !tag.belongs_to(self) {
            panic!(
                "{tag:?} belongs to another runtime and cannot be consumed into this runtime's tracking frame"
            );
        }
        self.inner.frames.consume(tag);
    }

    /// Whether a tracking frame is active.
    pub fn is_tracking(&self) -> bool {
        self.inner.frames.is_active()
    }

    /// Push an empty tracking frame.
    ///
    /// Prefer [`Runtime::track`], which cannot leave the stack unbalanced.
    pub fn begin_track_frame(&self) {
        self.inner.frames.begin();
    }

    /// Pop the current frame and return the tag combining everything it
    /// consumed. The tag is also consumed into the parent frame.
    pub fn end_track_frame(&self) -> Result<Tag> {
        self.inner.frames.commit()
    }

    /// Run `f` under a tracking frame and return its result with the tag
    /// that describes its dependencies.
    ///
    /// The runtime is entered while `f` runs, so reads inside `f` land in
    /// this runtime's frame.
    pub fn track<T>(&self, f: impl FnOnce() -> T) -> (T, Tag) {
        let _entered = self.enter();
        let frame = super::context::TrackFrame::begin(self);
        let value = f();
        (value, frame.commit())
    }

    /// Run `f` without recording any of its reads.
    pub fn untrack<T>(&self, f: impl FnOnce() -> T) -> T {
        let _entered = self.enter();
        let frame = super::context::TrackFrame::begin(self);
        let value = f();
        frame.discard();
        value
    }

    /// Install the embedder hooks. Allowed exactly once per runtime.
    pub fn set_global_context(&self, context: Rc<dyn GlobalContext>) -> Result<()> {
        self.inner
            .context
            .set(context)
            .map_err(|_| Error::GlobalContextSetTwice)?;
        tracing::debug!("global context installed");
        Ok(())
    }

    /// The installed embedder hooks.
    pub fn global_context(&self, operation: &'static str) -> Result<Rc<dyn GlobalContext>> {
        self.inner
            .context
            .get()
            .cloned()
            .ok_or(Error::GlobalContextNotSet { operation })
    }

    /// Ask the embedder to revalidate.
    ///
    /// # Panics
    ///
    /// If no global context is installed and `debug_checks` is on. Without
    /// debug checks the request is dropped with a warning.
    pub(crate) fn schedule_revalidate(&self) {
        match self.inner.context.get() {
            Some(context) => context.schedule_revalidate(),
            None if self.inner.config.debug_checks => panic!(
                "{}",
                Error::GlobalContextNotSet {
                    operation: "revalidate"
                }
            ),
            None => tracing::warn!("tracked state mutated before a global context was set"),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("revision", &self.current_revision())
            .field("tracking", &self.is_tracking())
            .field("has_global_context", &self.inner.context.get().is_some())
            .finish()
    }
}

/// Guard returned by [`Runtime::enter`].
pub struct RuntimeGuard {
    runtime: Runtime,
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        RUNTIME_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(popped) = popped {
                debug_assert!(
                    popped.ptr_eq(&self.runtime),
                    "runtime guards dropped out of order"
                );
            }
        });
    }
}

/// A fresh runtime with a [`DeferredContext`](crate::deferred::DeferredContext)
/// installed, so tests can mutate tracked state.
#[cfg(test)]
pub(crate) fn test_runtime() -> Runtime {
    let runtime = Runtime::new();
    runtime
        .set_global_context(Rc::new(crate::deferred::DeferredContext::new()))
        .unwrap();
    runtime
}
