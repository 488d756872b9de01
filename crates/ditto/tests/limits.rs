//! Resource-limit enforcement during clones: allocation count, memory,
//! and recursion depth.

use ditto::{
    CloneError, Cloner, FieldType, Heap, LimitedTracker, ResourceError, ResourceLimits, ResourceTracker, TypeDef,
    TypeRegistry, Value,
};
use pretty_assertions::assert_eq;

fn node_registry() -> (TypeRegistry, ditto::TypeId) {
    let mut registry = TypeRegistry::new();
    let node = registry
        .register(TypeDef::object("Node").field("next", FieldType::Any))
        .expect("register should succeed");
    (registry, node)
}

/// Builds a chain of `len` nodes and returns the head.
fn build_chain(heap: &mut Heap<LimitedTracker>, node: ditto::TypeId, len: usize) -> Value {
    let mut last = Value::Null;
    for _ in 0..len {
        let id = heap.allocate_object(node, vec![last.clone()]).expect("allocate should succeed");
        last = Value::Ref(id);
    }
    last
}

#[test]
fn allocation_limit_aborts_the_clone() {
    let (registry, node) = node_registry();
    let cloner: Cloner<LimitedTracker> = Cloner::new(registry);
    let limits = ResourceLimits::new().max_allocations(6);
    let mut heap = Heap::new(LimitedTracker::new(limits));

    // 4 source nodes fit; cloning them needs 4 more and hits the cap.
    let head = build_chain(&mut heap, node, 4);
    let err = cloner
        .clone_value(&head, &mut heap)
        .expect_err("the clone should exhaust the allocation budget");
    assert!(
        matches!(err, CloneError::Resource(ResourceError::Allocation { limit: 6, .. })),
        "got {err:?}"
    );
}

#[test]
fn memory_limit_aborts_allocation() {
    let (_registry, node) = node_registry();
    let limits = ResourceLimits::new().max_memory(64);
    let mut heap = Heap::new(LimitedTracker::new(limits));

    let mut err = None;
    let mut last = Value::Null;
    for _ in 0..100 {
        match heap.allocate_object(node, vec![last.clone()]) {
            Ok(id) => last = Value::Ref(id),
            Err(e) => {
                err = Some(e);
                break;
            }
        }
    }
    let err = err.expect("the memory budget should run out");
    assert!(matches!(err, ResourceError::Memory { limit: 64, .. }), "got {err:?}");
}

#[test]
fn depth_limit_stops_deep_recursion() {
    let (registry, node) = node_registry();
    let cloner: Cloner<LimitedTracker> = Cloner::new(registry);
    let limits = ResourceLimits::new().max_clone_depth(10);
    let mut heap = Heap::new(LimitedTracker::new(limits));

    let head = build_chain(&mut heap, node, 50);
    let err = cloner
        .clone_value(&head, &mut heap)
        .expect_err("a 50-deep chain should exceed a depth limit of 10");
    assert!(
        matches!(err, CloneError::Resource(ResourceError::Depth { limit: 10, depth: 11 })),
        "got {err:?}"
    );
}

#[test]
fn clones_within_the_limits_succeed() {
    let (registry, node) = node_registry();
    let cloner: Cloner<LimitedTracker> = Cloner::new(registry);
    let limits = ResourceLimits::new().max_allocations(100).max_clone_depth(100);
    let mut heap = Heap::new(LimitedTracker::new(limits));

    let head = build_chain(&mut heap, node, 10);
    let cloned = cloner.clone_value(&head, &mut heap).expect("clone should fit");
    assert_ne!(cloned, head);
    assert_eq!(
        heap.tracker().allocation_count(),
        Some(20),
        "ten source nodes and ten cloned nodes"
    );
}
