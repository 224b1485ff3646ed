//! Reactive Primitives
//!
//! This module implements revision-based dependency tracking: tags, tracking
//! frames, memoized caches and tracked fields.
//!
//! # Concepts
//!
//! ## Revisions and Tags
//!
//! Every runtime owns a clock. A tag records the revision at which the state
//! it stands for last changed. Mutable tags are updated by writes; combinator
//! tags report the newest revision among their children.
//!
//! ## Tracking Frames
//!
//! While a computation runs, every tag it reads is consumed into the active
//! frame. Committing the frame yields one tag standing for all of those
//! reads, and also hands that tag to the enclosing frame.
//!
//! ## Caches
//!
//! A cache remembers its value together with the committed tag and the
//! revision at which it was captured. It stays valid until that tag moves
//! past the captured revision.
//!
//! # Implementation Notes
//!
//! Validity is checked when a value is read, by comparing revisions. Nothing
//! is notified on write, so there are no reverse edges to maintain and any
//! number of writes between two reads cost a single recomputation.

mod cache;
mod context;
mod revision;
mod runtime;
mod tag;
mod tracked;

pub use cache::Cache;
pub use context::TrackFrame;
pub use revision::{Clock, Revision};
pub use runtime::{GlobalContext, Runtime, RuntimeGuard};
#[cfg(test)]
pub(crate) use runtime::test_runtime;
pub use tag::Tag;
pub use tracked::{most_recent, LocalCopy, Snapshot, Tracked};
