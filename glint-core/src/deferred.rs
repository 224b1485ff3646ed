//! Deferred Global Context
//!
//! A [`GlobalContext`] that queues destruction work until it is flushed.
//!
//! # Ordering
//!
//! [`DeferredContext::flush`] drains the destructor queue before touching the
//! finalizer queue, and goes back to destructors whenever running a
//! finalizer queued more. Every destructor scheduled before a finalizer has
//! therefore run by the time that finalizer runs.
//!
//! Revalidation requests are only counted; rendering is somebody else's job.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use crate::destroyable::DestroyTask;
use crate::reactive::GlobalContext;

/// Queues destructors and finalizers until [`flush`](Self::flush).
#[derive(Default)]
pub struct DeferredContext {
    destructors: RefCell<VecDeque<DestroyTask>>,
    finalizers: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    revalidations: Cell<usize>,
}

impl DeferredContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued destructor, then every queued finalizer, until both
    /// queues are empty. Returns the number of callbacks run.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.destructors.borrow_mut().pop_front();
            if let Some(task) = task {
                task.run();
                ran += 1;
                continue;
            }

            let finalizer = self.finalizers.borrow_mut().pop_front();
            match finalizer {
                Some(finalizer) => {
                    finalizer();
                    ran += 1;
                }
                None => break,
            }
        }
        tracing::trace!(ran, "deferred context flushed");
        ran
    }

    /// Number of callbacks waiting for a flush.
    pub fn pending(&self) -> usize {
        self.destructors.borrow().len() + self.finalizers.borrow().len()
    }

    /// Number of revalidation requests received so far.
    pub fn revalidations(&self) -> usize {
        self.revalidations.get()
    }
}

impl GlobalContext for DeferredContext {
    fn schedule_revalidate(&self) {
        self.revalidations.set(self.revalidations.get() + 1);
    }

    fn schedule_destroy(&self, task: DestroyTask) {
        self.destructors.borrow_mut().push_back(task);
    }

    fn schedule_destroyed(&self, finalizer: Box<dyn FnOnce()>) {
        self.finalizers.borrow_mut().push_back(finalizer);
    }
}

impl fmt::Debug for DeferredContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredContext")
            .field("pending_destructors", &self.destructors.borrow().len())
            .field("pending_finalizers", &self.finalizers.borrow().len())
            .field("revalidations", &self.revalidations.get())
            .finish()
    }
}
