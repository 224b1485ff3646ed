//! Integration Tests for the Reactivity Core
//!
//! These tests verify that caches, tracked state, destroyables and the DAG
//! behave correctly together through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glint_core::{
    most_recent, Cache, Dag, DeferredContext, DestroyableState, Error, Runtime, RuntimeConfig,
    Snapshot, TrackedMap, Tracked,
};

/// A runtime whose hooks are installed, so tracked state can change.
fn runtime() -> Runtime {
    let runtime = Runtime::new();
    runtime
        .set_global_context(Rc::new(DeferredContext::new()))
        .unwrap();
    runtime
}

fn counted<T: Clone + 'static>(
    calls: &Rc<Cell<usize>>,
    compute: impl Fn() -> T + 'static,
) -> Cache<T> {
    let calls = calls.clone();
    Cache::new(move || {
        calls.set(calls.get() + 1);
        compute()
    })
}

/// Test that a pure computation runs once while nothing changes.
#[test]
fn cache_without_mutation_computes_once() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let calls = Rc::new(Cell::new(0));

    let cache = runtime.create_cache({
        let calls = calls.clone();
        move || {
            calls.set(calls.get() + 1);
            42
        }
    });

    for _ in 0..5 {
        assert_eq!(runtime.get_cache(&cache).unwrap(), 42);
    }
    assert_eq!(calls.get(), 1);
    assert!(cache.is_const());
}

/// Test that a runtime's caches track reads without entering it first.
#[test]
fn runtime_cache_invalidates_without_entering() {
    let runtime = runtime();
    let calls = Rc::new(Cell::new(0));
    let x = Rc::new(Tracked::new_in(&runtime, 1));

    let cache = runtime.create_cache({
        let (x, calls) = (x.clone(), calls.clone());
        move || {
            calls.set(calls.get() + 1);
            x.get()
        }
    });

    assert_eq!(runtime.get_cache(&cache).unwrap(), 1);
    assert_eq!(runtime.get_cache(&cache).unwrap(), 1);
    x.set(2);
    assert_eq!(runtime.get_cache(&cache).unwrap(), 2);
    assert_eq!(calls.get(), 2);
}

/// Test that state from one runtime cannot be read silently by another.
#[test]
#[should_panic(expected = "belongs to another runtime")]
fn cross_runtime_read_is_rejected() {
    let owner = runtime();
    let reader = runtime();
    let x = Rc::new(Tracked::new_in(&owner, 1));

    let cache = reader.create_cache({
        let x = x.clone();
        move || x.get()
    });
    let _ = reader.get_cache(&cache);
}

/// Test that mutating tracked state needs the embedder hooks.
#[test]
#[should_panic(expected = "global context was not set")]
fn mutation_before_global_context_panics() {
    let runtime = Runtime::with_config(RuntimeConfig {
        debug_checks: true,
        ..RuntimeConfig::default()
    });
    let x = Tracked::new_in(&runtime, 1);
    x.set(2);
}

/// Test that writes invalidate and reads in between do not.
#[test]
fn cache_recomputes_only_after_mutation() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let calls = Rc::new(Cell::new(0));
    let x = Rc::new(Tracked::new(1));

    let cache = counted(&calls, {
        let x = x.clone();
        move || x.get() + 100
    });

    assert_eq!(cache.get(), 101);
    assert_eq!(cache.get(), 101);
    assert_eq!(calls.get(), 1);

    // Several writes between two reads cost one recomputation.
    x.set(2);
    x.set(3);
    assert_eq!(cache.get(), 103);
    assert_eq!(cache.get(), 103);
    assert_eq!(calls.get(), 2);
}

/// Test that an outer cache is invalidated through an inner one.
#[test]
fn nested_caches_propagate_dependencies() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let x = Rc::new(Tracked::new(2));
    let inner_calls = Rc::new(Cell::new(0));
    let outer_calls = Rc::new(Cell::new(0));

    let inner = counted(&inner_calls, {
        let x = x.clone();
        move || x.get() * 10
    });
    let outer = counted(&outer_calls, {
        let inner = inner.clone();
        move || inner.get() + 1
    });

    assert_eq!(outer.get(), 21);
    assert_eq!(outer.get(), 21);
    assert_eq!((inner_calls.get(), outer_calls.get()), (1, 1));

    x.set(3);
    assert_eq!(outer.get(), 31);
    assert_eq!((inner_calls.get(), outer_calls.get()), (2, 2));
}

/// Test that a failed computation is retried on the next read.
#[test]
fn failed_computation_is_not_cached() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let fail = Rc::new(Cell::new(true));

    let cache: Cache<i32, String> = Cache::try_new({
        let fail = fail.clone();
        move || {
            if fail.get() {
                Err("not ready".to_owned())
            } else {
                Ok(7)
            }
        }
    });

    assert_eq!(cache.try_get(), Err("not ready".to_owned()));
    assert!(!cache.has_value());
    assert!(!runtime.is_tracking());

    fail.set(false);
    assert_eq!(cache.try_get(), Ok(7));
}

/// Test that a cache from another runtime is rejected.
#[test]
fn foreign_cache_handle_is_rejected() {
    let first = Runtime::new();
    let second = Runtime::new();
    let cache = first.create_cache(|| 1).with_label("first-runtime");

    match second.get_cache(&cache) {
        Err(Error::InvalidCacheHandle { label }) => assert_eq!(label, "first-runtime"),
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Test that setting an equal value dirties nothing.
#[test]
fn map_equal_set_does_not_invalidate() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let calls = Rc::new(Cell::new(0));
    let map = Rc::new(TrackedMap::from_entries([("k", 1)]));

    let cache = counted(&calls, {
        let map = map.clone();
        move || map.get(&"k")
    });

    assert_eq!(cache.get(), Some(1));
    map.set("k", 1);
    assert_eq!(cache.get(), Some(1));
    assert_eq!(calls.get(), 1);
}

/// Test that a comparator reporting inequality forces invalidation.
#[test]
fn map_custom_equals_forces_invalidation() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let calls = Rc::new(Cell::new(0));
    let map = Rc::new(TrackedMap::with_equals(|_: &i32, _: &i32| false));
    map.set("k", 1);

    let cache = counted(&calls, {
        let map = map.clone();
        move || map.get(&"k")
    });

    assert_eq!(cache.get(), Some(1));
    map.set("k", 1);
    assert_eq!(cache.get(), Some(1));
    assert_eq!(calls.get(), 2);
}

/// Test that reads of one key ignore writes to another.
#[test]
fn map_keys_are_tracked_individually() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let calls = Rc::new(Cell::new(0));
    let map = Rc::new(TrackedMap::from_entries([("foo", 1), ("bar", 2)]));

    let cache = counted(&calls, {
        let map = map.clone();
        move || map.get(&"foo")
    });

    assert_eq!(cache.get(), Some(1));
    map.set("bar", 20);
    assert_eq!(cache.get(), Some(1));
    assert_eq!(calls.get(), 1);

    map.set("foo", 10);
    assert_eq!(cache.get(), Some(10));
    assert_eq!(calls.get(), 2);

    map.delete(&"foo");
    assert_eq!(cache.get(), None);
    assert_eq!(calls.get(), 3);
}

/// Test tie-breaking and dependency recording of `most_recent`.
#[test]
fn most_recent_ties_and_consumption() {
    let runtime = runtime();
    let _guard = runtime.enter();
    let a = Rc::new(Tracked::new("a"));
    let b = Rc::new(Tracked::new("b"));

    assert_eq!(most_recent(a.snapshot(), [b.snapshot()]).value, "a");
    b.set("b");
    assert_eq!(most_recent(a.snapshot(), [b.snapshot()]).value, "b");

    a.set("a");
    let calls = Rc::new(Cell::new(0));
    let cache = counted(&calls, {
        let (a, b) = (a.clone(), b.clone());
        move || most_recent(a.snapshot(), [b.snapshot()]).value
    });

    assert_eq!(cache.get(), "a");
    // The losing side is still a dependency.
    b.set("b2");
    assert_eq!(cache.get(), "b2");
    a.set("a2");
    assert_eq!(cache.get(), "a2");
    assert_eq!(calls.get(), 3);

    let constant = Snapshot::new("c", glint_core::Tag::constant());
    assert_eq!(most_recent(constant, [a.snapshot()]).value, "a2");
}

struct Node {
    name: &'static str,
}

fn node(name: &'static str) -> Rc<Node> {
    Rc::new(Node { name })
}

fn with_context() -> (Runtime, Rc<DeferredContext>) {
    let runtime = Runtime::new();
    let context = Rc::new(DeferredContext::new());
    runtime.set_global_context(context.clone()).unwrap();
    (runtime, context)
}

/// Test cascading destruction and idempotence.
#[test]
fn destroy_cascades_once() {
    let (runtime, context) = with_context();
    runtime.enable_destroyable_tracking().unwrap();

    let parent = node("parent");
    let children = [node("child1"), node("child2")];
    let calls = Rc::new(RefCell::new(Vec::new()));

    for child in &children {
        runtime.associate_destroyable_child(&parent, child).unwrap();
    }
    for object in children.iter().chain([&parent]) {
        let calls = calls.clone();
        runtime
            .register_destructor(object, move |node: &Node| calls.borrow_mut().push(node.name))
            .unwrap();
    }

    runtime.destroy(&parent).unwrap();
    for child in &children {
        assert_eq!(runtime.destroyable_state(child), DestroyableState::Destroying);
    }

    runtime.destroy(&parent).unwrap();
    context.flush();

    assert_eq!(*calls.borrow(), vec!["child1", "child2", "parent"]);
    for object in children.iter().chain([&parent]) {
        assert!(runtime.is_destroyed(object));
    }

    runtime.destroy(&parent).unwrap();
    assert_eq!(context.flush(), 0);
    assert_eq!(calls.borrow().len(), 3);

    runtime.assert_destroyables_destroyed().unwrap();
}

/// Test that a dying object rejects new destructors.
#[test]
fn register_after_destroy_is_rejected() {
    let (runtime, context) = with_context();
    let object = node("late");
    let called = Rc::new(Cell::new(false));

    runtime.destroy(&object).unwrap();
    let result = runtime.register_destructor(&object, {
        let called = called.clone();
        move |_: &Node| called.set(true)
    });
    assert!(matches!(result, Err(Error::AlreadyDestroying { .. })));

    context.flush();
    assert!(!called.get());
    assert!(matches!(
        runtime.register_destructor(&object, |_: &Node| {}),
        Err(Error::AlreadyDestroying { .. })
    ));
}

/// Test that the embedder hooks are required and set once.
#[test]
fn global_context_is_required_and_unique() {
    let runtime = Runtime::new();
    let object = node("orphan");
    assert!(matches!(
        runtime.destroy(&object),
        Err(Error::GlobalContextNotSet { .. })
    ));
    assert!(!runtime.is_destroying(&object));

    runtime
        .set_global_context(Rc::new(DeferredContext::new()))
        .unwrap();
    assert!(matches!(
        runtime.set_global_context(Rc::new(DeferredContext::new())),
        Err(Error::GlobalContextSetTwice)
    ));
}

/// Test topological order along a chain.
#[test]
fn dag_orders_a_chain() {
    let mut dag = Dag::new();
    dag.add("C", 3, &[], &["B"]).unwrap();
    dag.add("A", 1, &["B"], &[]).unwrap();
    dag.add("B", 2, &["C"], &[]).unwrap();

    assert_eq!(dag.keys(), vec!["A", "B", "C"]);
}

/// Test that a rejected edge leaves the DAG usable and unchanged.
#[test]
fn dag_cycle_is_rejected_atomically() {
    let mut dag = Dag::new();
    dag.add("a", 1, &["b"], &[]).unwrap();

    let err = dag.add("b", 2, &["a"], &[]).unwrap_err();
    assert!(matches!(err, Error::DagCycleDetected { .. }));
    assert_eq!(err.to_string(), "cycle detected: a <- b <- a");

    let mut visited = Vec::new();
    dag.each(|key, value| visited.push((key.to_owned(), value.copied())));
    assert_eq!(
        visited,
        vec![("a".to_owned(), Some(1)), ("b".to_owned(), None)]
    );
}

/// Test that a forward reference is filled by a later add.
#[test]
fn dag_resolves_forward_references() {
    let mut dag = Dag::new();
    dag.add("a", 1, &["b"], &[]).unwrap();
    dag.add("b", 2, &[], &[]).unwrap();

    assert_eq!(dag.topsort(), vec![("a", Some(&1)), ("b", Some(&2))]);
}
