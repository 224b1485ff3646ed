//! DAG Vertices
//!
//! This module defines the vertices that live in the ordering graph.

use smallvec::SmallVec;

/// A vertex in the ordering graph.
///
/// Edges are stored on the vertex that must come *later*: `incoming` lists
/// the indices of every vertex that has to be visited before this one.
#[derive(Debug, Clone)]
pub(crate) struct Vertex<V> {
    /// Payload. `None` while the vertex is only a forward reference.
    value: Option<V>,

    /// Indices of prerequisite vertices, in insertion order, without
    /// duplicates.
    incoming: SmallVec<[usize; 4]>,

    /// Set once some other vertex depends on this one. Traversal starts
    /// from vertices without it.
    out: bool,
}

impl<V> Vertex<V> {
    /// Create a placeholder vertex.
    pub(crate) fn placeholder() -> Self {
        Self {
            value: None,
            incoming: SmallVec::new(),
            out: false,
        }
    }

    /// The vertex payload, if it has been added.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub(crate) fn set_value(&mut self, value: V) {
        self.value = Some(value);
    }

    /// Indices of the vertices that must be visited first.
    pub fn incoming(&self) -> &[usize] {
        &self.incoming
    }

    /// Whether another vertex depends on this one.
    pub fn has_dependents(&self) -> bool {
        self.out
    }

    /// Record `index` as a prerequisite. Returns false if it already was.
    pub(crate) fn add_incoming(&mut self, index: usize) -> bool {
        if self.incoming.contains(&index) {
            return false;
        }
        self.incoming.push(index);
        true
    }

    pub(crate) fn mark_out(&mut self) {
        self.out = true;
    }

    /// Undo edge insertions back to a recorded state.
    pub(crate) fn restore(&mut self, incoming_len: usize, out: bool) {
        self.incoming.truncate(incoming_len);
        self.out = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_no_value() {
        let vertex: Vertex<i32> = Vertex::placeholder();
        assert!(vertex.value().is_none());
        assert!(!vertex.has_dependents());
        assert!(vertex.incoming().is_empty());
    }

    #[test]
    fn incoming_edges_are_deduplicated() {
        let mut vertex: Vertex<i32> = Vertex::placeholder();
        assert!(vertex.add_incoming(3));
        assert!(!vertex.add_incoming(3));
        assert!(vertex.add_incoming(1));
        assert_eq!(vertex.incoming(), &[3, 1]);
    }

    #[test]
    fn restore_rolls_back_edges() {
        let mut vertex: Vertex<i32> = Vertex::placeholder();
        vertex.add_incoming(0);
        vertex.add_incoming(1);
        vertex.mark_out();

        vertex.restore(1, false);
        assert_eq!(vertex.incoming(), &[0]);
        assert!(!vertex.has_dependents());
    }
}
