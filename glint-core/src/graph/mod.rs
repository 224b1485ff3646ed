//! Ordering Graph
//!
//! This module implements a small keyed DAG used to order things that
//! declare "before" and "after" relationships to each other.
//!
//! # Overview
//!
//! - Vertices are keyed by string and carry an optional value. A key that is
//!   only referenced by a constraint exists as a placeholder until it is
//!   added.
//! - Edges point from a vertex to its prerequisites.
//! - Traversal yields every vertex after all of its prerequisites.
//!
//! Cycles are rejected when the offending edge is added, never during
//! traversal.

mod dag;
mod vertex;

pub use dag::Dag;
