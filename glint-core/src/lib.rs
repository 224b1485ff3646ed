//! Glint Core
//!
//! This crate provides the core runtime for the Glint rendering library.
//! It implements:
//!
//! - Revision-based reactivity (tags, tracking frames, memoized caches)
//! - Tracked fields and tracked collections
//! - A destroyable ownership graph with embedder hooks and leak checking
//! - An ordering DAG with cycle detection
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Revisions, tags, tracking frames, caches and tracked fields
//! - `collections`: Map, array and set wrappers with per-entry tags
//! - `destroyable`: Parent/child ownership and destructor scheduling
//! - `graph`: Keyed DAG with "before" and "after" constraints
//! - `deferred`: A queueing [`GlobalContext`] for embedders and tests
//!
//! Everything is single threaded. A [`Runtime`] owns the clock, the frame
//! stack and the destroyable store; free functions and constructors use the
//! runtime entered on the current thread.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use glint_core::{Cache, DeferredContext, Runtime, Tracked};
//!
//! // Writes ask the embedder to revalidate, so install hooks first.
//! let runtime = Runtime::new();
//! runtime.set_global_context(Rc::new(DeferredContext::new()))?;
//! let _guard = runtime.enter();
//!
//! let count = Rc::new(Tracked::new(1));
//! let doubled = Cache::new({
//!     let count = Rc::clone(&count);
//!     move || count.get() * 2
//! });
//!
//! assert_eq!(doubled.get(), 2);
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! # Ok::<(), glint_core::Error>(())
//! ```

pub mod collections;
pub mod config;
pub mod deferred;
pub mod destroyable;
pub mod error;
pub mod graph;
pub mod reactive;

pub use collections::{TrackedArray, TrackedMap, TrackedSet};
pub use config::RuntimeConfig;
pub use deferred::DeferredContext;
pub use destroyable::{DestroyTask, DestroyableState, DestructorHandle};
pub use error::{Error, Result};
pub use graph::Dag;
pub use reactive::{
    most_recent, Cache, Clock, GlobalContext, LocalCopy, Revision, Runtime, RuntimeGuard,
    Snapshot, Tag, TrackFrame, Tracked,
};
