//! Ordering DAG
//!
//! Keys are added with "before" and "after" constraints, and the DAG yields
//! every key in an order that satisfies all of them.
//!
//! # Algorithm
//!
//! Edges are stored on the later vertex, pointing at its prerequisites.
//!
//! 1. Adding an edge first checks that it does not close a cycle: a self
//!    edge, then the prerequisites one level down, and only then a full
//!    depth-first search. A cycle is rejected right there, with the path
//!    spelled out, and the DAG is left as it was before the call.
//! 2. Traversal runs an explicit-stack depth-first search into
//!    prerequisites, starting from every vertex nothing depends on, and
//!    emits vertices as the search leaves them. Post-order over prerequisite
//!    edges is a topological order.
//!
//! Vertices live in insertion order and the search visits edges in insertion
//! order, so the same sequence of `add` calls always yields the same order.

use indexmap::IndexMap;

use super::vertex::Vertex;
use crate::error::{Error, Result};

/// A step of the iterative depth-first search.
#[derive(Debug, Clone, Copy)]
enum Step {
    Enter(usize),
    Exit(usize),
}

/// Scratch state for one search.
struct Search {
    visited: Vec<bool>,
    stack: Vec<Step>,
    path: Vec<usize>,
    result: Vec<usize>,
}

impl Search {
    fn new(len: usize) -> Self {
        Self {
            visited: vec![false; len],
            stack: Vec::new(),
            path: Vec::new(),
            result: Vec::with_capacity(len),
        }
    }
}

/// Undo log for one `add` call.
struct Journal {
    len: usize,
    touched: Vec<(usize, usize, bool)>,
}

/// A DAG of keyed values with ordering constraints.
#[derive(Debug, Clone)]
pub struct Dag<V> {
    vertices: IndexMap<String, Vertex<V>>,
}

impl<V> Dag<V> {
    /// Create an empty DAG.
    pub fn new() -> Self {
        Self {
            vertices: IndexMap::new(),
        }
    }

    /// Add `key` with `value`.
    ///
    /// Every key in `before` is visited after `key`; every key in `after` is
    /// visited before it. Keys that do not exist yet are created as
    /// placeholders, to be filled by a later `add`. Adding an existing key
    /// replaces its value and keeps its edges.
    ///
    /// A call that would close a cycle fails and changes nothing.
    pub fn add(&mut self, key: &str, value: V, before: &[&str], after: &[&str]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::DagMissingKey { context: "key" });
        }
        if before.iter().any(|key| key.is_empty()) {
            return Err(Error::DagMissingKey { context: "before" });
        }
        if after.iter().any(|key| key.is_empty()) {
            return Err(Error::DagMissingKey { context: "after" });
        }

        let mut journal = Journal {
            len: self.vertices.len(),
            touched: Vec::new(),
        };

        if let Err(error) = self.add_edges(key, before, after, &mut journal) {
            self.rollback(journal);
            tracing::debug!(key, %error, "rejected DAG edge");
            return Err(error);
        }

        let index = self.vertex_index(key);
        self.vertices[index].set_value(value);
        Ok(())
    }

    fn add_edges(
        &mut self,
        key: &str,
        before: &[&str],
        after: &[&str],
        journal: &mut Journal,
    ) -> Result<()> {
        let vertex = self.vertex_index(key);
        for later in before {
            let later = self.vertex_index(later);
            self.add_edge(vertex, later, journal)?;
        }
        for earlier in after {
            let earlier = self.vertex_index(earlier);
            self.add_edge(earlier, vertex, journal)?;
        }
        Ok(())
    }

    /// The index of `key`, creating a placeholder if needed.
    fn vertex_index(&mut self, key: &str) -> usize {
        if let Some(index) = self.vertices.get_index_of(key) {
            return index;
        }
        let (index, _) = self
            .vertices
            .insert_full(key.to_owned(), Vertex::placeholder());
        index
    }

    fn key(&self, index: usize) -> &str {
        self.vertices
            .get_index(index)
            .map_or("", |(key, _)| key.as_str())
    }

    /// Add an edge: `earlier` must be visited before `later`.
    fn add_edge(&mut self, earlier: usize, later: usize, journal: &mut Journal) -> Result<()> {
        self.check(earlier, later)?;
        if self.vertices[later].incoming().contains(&earlier) {
            return Ok(());
        }

        self.record(later, journal);
        self.record(earlier, journal);
        self.vertices[later].add_incoming(earlier);
        self.vertices[earlier].mark_out();
        tracing::trace!(earlier = self.key(earlier), later = self.key(later), "DAG edge added");
        Ok(())
    }

    fn record(&self, index: usize, journal: &mut Journal) {
        if index >= journal.len || journal.touched.iter().any(|(i, _, _)| *i == index) {
            return;
        }
        let vertex = &self.vertices[index];
        journal
            .touched
            .push((index, vertex.incoming().len(), vertex.has_dependents()));
    }

    fn rollback(&mut self, journal: Journal) {
        for (index, incoming_len, out) in journal.touched.into_iter().rev() {
            self.vertices[index].restore(incoming_len, out);
        }
        self.vertices.truncate(journal.len);
    }

    /// Fail if `later` is already a (transitive) prerequisite of `earlier`.
    fn check(&self, earlier: usize, later: usize) -> Result<()> {
        let target = self.key(later);
        if earlier == later {
            return Err(Error::DagCycleDetected {
                path: format!("{target} <- {target}"),
            });
        }

        let incoming = self.vertices[earlier].incoming();
        if incoming.is_empty() {
            return Ok(());
        }

        if incoming.contains(&later) {
            return Err(Error::DagCycleDetected {
                path: format!("{target} <- {} <- {target}", self.key(earlier)),
            });
        }

        let mut search = Search::new(self.vertices.len());
        self.visit(earlier, Some(later), &mut search);
        if search.path.is_empty() {
            return Ok(());
        }

        let mut path = target.to_owned();
        for index in &search.path {
            path.push_str(" <- ");
            path.push_str(self.key(*index));
        }
        Err(Error::DagCycleDetected { path })
    }

    /// Depth-first search into prerequisites, starting at `start`.
    ///
    /// With a `target`, the search stops on reaching it and leaves the path
    /// from `start` to `target` in `search.path`.
    fn visit(&self, start: usize, target: Option<usize>, search: &mut Search) {
        search.stack.push(Step::Enter(start));
        while let Some(step) = search.stack.pop() {
            match step {
                Step::Enter(index) => {
                    if search.visited[index] {
                        continue;
                    }
                    search.visited[index] = true;
                    search.path.push(index);
                    if target == Some(index) {
                        break;
                    }
                    search.stack.push(Step::Exit(index));
                    for &prerequisite in self.vertices[index].incoming().iter().rev() {
                        if !search.visited[prerequisite] {
                            search.stack.push(Step::Enter(prerequisite));
                        }
                    }
                }
                Step::Exit(index) => {
                    search.path.pop();
                    search.result.push(index);
                }
            }
        }
        search.stack.clear();
    }

    /// Vertex indices in topological order.
    fn walk(&self) -> Vec<usize> {
        let mut search = Search::new(self.vertices.len());
        for (index, vertex) in self.vertices.values().enumerate() {
            if vertex.has_dependents() {
                continue;
            }
            self.visit(index, None, &mut search);
        }
        search.result
    }

    /// Call `callback` with every key and value in topological order.
    ///
    /// Placeholders that were never added get `None`.
    pub fn each<'a>(&'a self, mut callback: impl FnMut(&'a str, Option<&'a V>)) {
        for index in self.walk() {
            if let Some((key, vertex)) = self.vertices.get_index(index) {
                callback(key, vertex.value());
            }
        }
    }

    /// Every key and value in topological order.
    pub fn topsort(&self) -> Vec<(&str, Option<&V>)> {
        let mut ordered = Vec::with_capacity(self.vertices.len());
        self.each(|key, value| ordered.push((key, value)));
        ordered
    }

    /// Every key in topological order.
    pub fn keys(&self) -> Vec<&str> {
        self.topsort().into_iter().map(|(key, _)| key).collect()
    }

    /// The value stored for `key`, if it was added.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.vertices.get(key).and_then(Vertex::value)
    }

    /// Whether `key` exists, as a full vertex or a placeholder.
    pub fn contains(&self, key: &str) -> bool {
        self.vertices.contains_key(key)
    }

    /// Number of vertices, placeholders included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the DAG has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl<V> Default for Dag<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[&str], key: &str) -> usize {
        order.iter().position(|k| *k == key).unwrap()
    }

    #[test]
    fn before_and_after_constraints_are_honored() {
        let mut dag = Dag::new();
        dag.add("b", 2, &[], &["a"]).unwrap();
        dag.add("a", 1, &[], &[]).unwrap();
        dag.add("c", 3, &[], &["b"]).unwrap();

        assert_eq!(dag.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn forward_references_are_filled_in() {
        let mut dag = Dag::new();
        dag.add("x", 1, &["y"], &[]).unwrap();
        assert!(dag.contains("y"));
        assert_eq!(dag.get("y"), None);

        dag.add("y", 2, &[], &[]).unwrap();
        assert_eq!(dag.topsort(), vec![("x", Some(&1)), ("y", Some(&2))]);
    }

    #[test]
    fn readding_a_key_replaces_its_value() {
        let mut dag = Dag::new();
        dag.add("a", 1, &["b"], &[]).unwrap();
        dag.add("a", 10, &[], &[]).unwrap();
        assert_eq!(dag.get("a"), Some(&10));
        assert_eq!(dag.keys(), vec!["a", "b"]);
    }

    #[test]
    fn self_edges_are_cycles() {
        let mut dag: Dag<i32> = Dag::new();
        let err = dag.add("a", 1, &["a"], &[]).unwrap_err();
        assert_eq!(err.to_string(), "cycle detected: a <- a");
        assert!(dag.is_empty());
    }

    #[test]
    fn shallow_cycles_are_reported() {
        let mut dag = Dag::new();
        dag.add("a", 1, &["b"], &[]).unwrap();
        let err = dag.add("b", 2, &["a"], &[]).unwrap_err();
        assert_eq!(err.to_string(), "cycle detected: a <- b <- a");
    }

    #[test]
    fn deep_cycles_report_the_full_path() {
        let mut dag = Dag::new();
        dag.add("a", 1, &["b"], &[]).unwrap();
        dag.add("b", 2, &["c"], &[]).unwrap();
        dag.add("c", 3, &["d"], &[]).unwrap();
        let err = dag.add("d", 4, &["a"], &[]).unwrap_err();
        assert_eq!(err.to_string(), "cycle detected: a <- d <- c <- b <- a");
    }

    #[test]
    fn rejected_calls_leave_the_dag_untouched() {
        let mut dag = Dag::new();
        dag.add("a", 1, &["b"], &[]).unwrap();

        // `c` is created and wired before the cycle through `a` is found.
        let err = dag.add("b", 2, &["c", "a"], &[]).unwrap_err();
        assert!(matches!(err, Error::DagCycleDetected { .. }));

        assert_eq!(dag.len(), 2);
        assert!(!dag.contains("c"));
        assert_eq!(dag.get("b"), None);
        assert_eq!(dag.topsort(), vec![("a", Some(&1)), ("b", None)]);
    }

    #[test]
    fn missing_keys_are_rejected() {
        let mut dag = Dag::new();
        assert!(matches!(
            dag.add("", 1, &[], &[]),
            Err(Error::DagMissingKey { context: "key" })
        ));
        assert!(matches!(
            dag.add("a", 1, &[""], &[]),
            Err(Error::DagMissingKey { context: "before" })
        ));
        assert!(matches!(
            dag.add("a", 1, &[], &[""]),
            Err(Error::DagMissingKey { context: "after" })
        ));
        assert!(dag.is_empty());
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut dag = Dag::new();
        dag.add("a", 1, &["b", "b"], &[]).unwrap();
        dag.add("b", 2, &[], &["a"]).unwrap();
        assert_eq!(dag.keys(), vec!["a", "b"]);
    }

    #[test]
    fn diamond_orders_every_constraint() {
        let mut dag = Dag::new();
        dag.add("top", (), &["left", "right"], &[]).unwrap();
        dag.add("left", (), &["bottom"], &[]).unwrap();
        dag.add("right", (), &["bottom"], &[]).unwrap();
        dag.add("bottom", (), &[], &[]).unwrap();

        let order = dag.keys();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "top") < position(&order, "left"));
        assert!(position(&order, "top") < position(&order, "right"));
        assert!(position(&order, "left") < position(&order, "bottom"));
        assert!(position(&order, "right") < position(&order, "bottom"));
    }

    #[test]
    fn traversal_is_deterministic() {
        let build = || {
            let mut dag = Dag::new();
            for (key, before) in [("e", "a"), ("d", "b"), ("c", "a"), ("b", "a")] {
                dag.add(key, (), &[before], &[]).unwrap();
            }
            dag.add("f", (), &[], &[]).unwrap();
            dag
        };
        let first: Vec<String> = build().keys().into_iter().map(str::to_owned).collect();
        for _ in 0..10 {
            let again: Vec<String> = build().keys().into_iter().map(str::to_owned).collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn each_hands_out_references_into_the_dag() {
        let mut dag = Dag::new();
        dag.add("late", 2, &[], &["early"]).unwrap();
        dag.add("early", 1, &[], &[]).unwrap();

        let mut borrowed: Vec<(&str, Option<&i32>)> = Vec::new();
        dag.each(|key, value| borrowed.push((key, value)));
        assert_eq!(borrowed, vec![("early", Some(&1)), ("late", Some(&2))]);
        assert_eq!(dag.topsort(), borrowed);
    }
}
