//! Plan-cache behavior: one build per type per cache, test-only resets,
//! and concurrent first use.

use std::sync::Arc;
use std::thread;

use ditto::{
    CloneError, Cloner, FieldType, Heap, NoLimitTracker, PlanKind, RecordingTracer, TraceEvent, TypeDef,
    TypeRegistry, Value,
};
use pretty_assertions::assert_eq;

fn node_registry() -> (TypeRegistry, ditto::TypeId) {
    let mut registry = TypeRegistry::new();
    let node = registry
        .register(TypeDef::object("Node").field("label", FieldType::Str).field("next", FieldType::Any))
        .expect("register should succeed");
    (registry, node)
}

/// Cloning many instances of one type builds its plan exactly once.
#[test]
fn plan_builds_once_per_type() {
    let (registry, node) = node_registry();
    let cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let mut heap = Heap::new(NoLimitTracker);
    let mut tracer = RecordingTracer::new();

    for n in 0..5 {
        let id = heap
            .allocate_object(node, vec![Value::str(format!("n{n}")), Value::Null])
            .expect("allocate should succeed");
        cloner
            .clone_value_traced(&Value::Ref(id), &mut heap, &mut tracer)
            .expect("clone should succeed");
    }

    assert_eq!(tracer.plan_builds(), 1, "five clones of one type should build one plan");
    assert_eq!(
        tracer.events()[0],
        TraceEvent::PlanBuilt {
            type_name: "Node".to_owned(),
            kind: PlanKind::NewDeep,
        }
    );
}

/// Deep and shallow merge plans are cached independently of each other and
/// of the new-clone plan.
#[test]
fn merge_plans_are_cached_per_kind() {
    let (registry, node) = node_registry();
    let cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let mut heap = Heap::new(NoLimitTracker);
    let mut tracer = RecordingTracer::new();

    let source = heap
        .allocate_object(node, vec![Value::str("src"), Value::Null])
        .expect("allocate should succeed");
    let target = heap
        .allocate_object(node, vec![Value::str("dst"), Value::Null])
        .expect("allocate should succeed");

    for _ in 0..3 {
        cloner
            .clone_into_traced(&Value::Ref(source), &Value::Ref(target), true, &mut heap, &mut tracer)
            .expect("deep merge should succeed");
        cloner
            .clone_into_traced(&Value::Ref(source), &Value::Ref(target), false, &mut heap, &mut tracer)
            .expect("shallow merge should succeed");
    }

    let kinds: Vec<PlanKind> = tracer
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::PlanBuilt { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![PlanKind::MergeDeep, PlanKind::MergeShallow],
        "each merge kind should build its plan once"
    );
}

/// Clearing the caches forces a rebuild, which is how an override change
/// becomes visible after the fact.
#[test]
fn clearing_caches_rebuilds_plans() {
    let (registry, node) = node_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let mut heap = Heap::new(NoLimitTracker);

    let id = heap
        .allocate_object(node, vec![Value::str("n"), Value::Null])
        .expect("allocate should succeed");
    let before = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    assert_ne!(before, Value::Ref(id), "the default plan clones the object");

    // Installing the override alone does nothing: the stale plan wins.
    cloner.set_atomic_override(Box::new(move |_, ty| (ty == node).then_some(true)));
    let stale = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    assert_ne!(stale, Value::Ref(id), "the cached plan should still be in effect");

    cloner.clear_plan_caches();
    let fresh = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    assert_eq!(fresh, Value::Ref(id), "after the reset the override should apply");
}

/// A plan build that fails is cached like a success: the same error comes
/// back without a rebuild, until the caches are reset.
#[test]
fn failed_plan_builds_are_cached() {
    let mut registry = TypeRegistry::new();
    registry
        .register(TypeDef::object("Solo").field("n", FieldType::Int))
        .expect("register should succeed");

    // A second registry with more types issues an id the first registry
    // never will.
    let mut other = TypeRegistry::new();
    other
        .register(TypeDef::object("Solo").field("n", FieldType::Int))
        .expect("register should succeed");
    let foreign = other
        .register(TypeDef::object("Extra").field("n", FieldType::Int))
        .expect("register should succeed");

    let cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(foreign, vec![Value::Int(1)]).expect("allocate should succeed");

    let mut tracer = RecordingTracer::new();
    let first = cloner
        .clone_value_traced(&Value::Ref(id), &mut heap, &mut tracer)
        .expect_err("an unregistered type cannot be cloned");
    assert!(matches!(first, CloneError::UnsupportedType { .. }), "got {first:?}");

    let second = cloner
        .clone_value_traced(&Value::Ref(id), &mut heap, &mut tracer)
        .expect_err("the failure should persist");
    assert_eq!(second, first, "the cached failure should come back verbatim");
    assert_eq!(tracer.plan_builds(), 1, "the failed build should be cached, not retried");

    cloner.clear_plan_caches();
    cloner
        .clone_value_traced(&Value::Ref(id), &mut heap, &mut tracer)
        .expect_err("the type is still unregistered");
    assert_eq!(tracer.plan_builds(), 2, "a cache reset should force a rebuild");
}

/// Concurrent first-time clones of the same types race on plan
/// construction; every thread must still succeed.
#[test]
fn concurrent_first_use_is_safe() {
    let (registry, node) = node_registry();
    let cloner: Arc<Cloner<NoLimitTracker>> = Arc::new(Cloner::new(registry));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cloner = Arc::clone(&cloner);
            thread::spawn(move || {
                let mut heap = Heap::new(NoLimitTracker);
                let mut last = Value::Null;
                for n in 0..16 {
                    let id = heap
                        .allocate_object(node, vec![Value::str(format!("t{t}-n{n}")), last.clone()])
                        .expect("allocate should succeed");
                    last = Value::Ref(id);
                }
                let cloned = cloner.clone_value(&last, &mut heap).expect("clone should succeed");
                assert_ne!(cloned, last, "each thread should get a fresh copy");
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread should not panic");
    }
}
