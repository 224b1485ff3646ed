//! Tracked Collections
//!
//! Containers whose reads are consumed and whose writes update tags, at the
//! finest granularity the operation allows:
//!
//! - Reading one slot (a key, an index, a member) depends on that slot only.
//! - Size and enumeration depend on a collection-wide tag, which is updated
//!   only by structural changes. Enumeration additionally depends on every
//!   slot it visits, where values can change without the structure changing.
//! - Writing a value equal to the stored one dirties nothing. Maps and
//!   arrays take a custom comparator; one that always returns `false` makes
//!   every write dirty.

mod array;
mod map;
mod set;

pub use array::TrackedArray;
pub use map::TrackedMap;
pub use set::TrackedSet;

pub(crate) type Equals<V> = Box<dyn Fn(&V, &V) -> bool>;

pub(crate) fn default_equals<V: PartialEq>(a: &V, b: &V) -> bool {
    a == b
}
