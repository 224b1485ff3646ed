//! Revisions and the revision clock.
//!
//! A revision is a point in logical time. Every mutation of tracked state
//! advances the clock of the runtime that owns the state, so comparing two
//! revisions tells whether something changed in between.

use std::cell::Cell;
use std::fmt;

/// A point on a runtime's logical clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    /// Revision of the constant tag. Lower than any revision the clock issues.
    pub const CONSTANT: Revision = Revision(0);

    /// The revision a clock starts at, and the one fresh mutable tags carry.
    pub const INITIAL: Revision = Revision(1);

    /// Get the raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Monotonic revision counter.
///
/// Overflow is not handled; a `u64` outlives any realistic process.
#[derive(Debug)]
pub struct Clock {
    current: Cell<u64>,
}

impl Clock {
    /// Create a clock positioned at [`Revision::INITIAL`].
    pub fn new() -> Self {
        Self {
            current: Cell::new(Revision::INITIAL.0),
        }
    }

    /// The last issued revision. Does not advance the clock.
    pub fn current(&self) -> Revision {
        Revision(self.current.get())
    }

    /// Advance the clock and return the new revision.
    pub fn advance(&self) -> Revision {
        let next = self.current.get() + 1;
        self.current.set(next);
        Revision(next)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
