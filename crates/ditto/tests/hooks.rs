//! Customization hooks: the atomicity override, pre-clone substitution,
//! and post-clone transformation.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ditto::{
    CloneError, Cloner, FieldType, Heap, HeapData, NoLimitTracker, StructValue, TypeDef, TypeKind, TypeRegistry,
    Value,
};
use pretty_assertions::assert_eq;

fn leaf_registry() -> (TypeRegistry, ditto::TypeId) {
    let mut registry = TypeRegistry::new();
    let leaf = registry
        .register(TypeDef::object("Leaf").field("n", FieldType::Int))
        .expect("register should succeed");
    (registry, leaf)
}

/// Forcing a normally-cloneable object type atomic makes clones share it.
#[test]
fn override_can_force_a_type_atomic() {
    let (registry, leaf) = leaf_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_atomic_override(Box::new(move |_, id| (id == leaf).then_some(true)));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(leaf, vec![Value::Int(1)]).expect("allocate should succeed");

    let cloned = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    assert_eq!(cloned, Value::Ref(id), "an atomic-forced type should be shared");
    assert_eq!(heap.len(), 1, "no allocation should happen");
}

/// Forcing an opaque type non-atomic duplicates its handle into a fresh
/// slot.
#[test]
fn override_can_force_an_opaque_type_cloneable() {
    let mut registry = TypeRegistry::new();
    let handle = registry.register(TypeDef::opaque("Handle")).expect("register should succeed");

    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_atomic_override(Box::new(|registry, id| {
        matches!(registry.get(id).kind(), TypeKind::Opaque).then_some(false)
    }));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_opaque(handle, 77).expect("allocate should succeed");

    let cloned = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    let clone_id = cloned.as_ref_id().expect("clone should be a ref");

    assert_ne!(clone_id, id, "a non-atomic-forced opaque should get a fresh slot");
    let HeapData::Opaque(op) = heap.get(clone_id) else {
        panic!("clone should be opaque");
    };
    assert_eq!(op.token(), 77, "the handle token should be duplicated");
}

/// A deferring override (always `None`) leaves default classification
/// untouched.
#[test]
fn deferring_override_changes_nothing() {
    let (registry, leaf) = leaf_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_atomic_override(Box::new(|_, _| None));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(leaf, vec![Value::Int(1)]).expect("allocate should succeed");
    let cloned = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    assert_ne!(cloned, Value::Ref(id), "objects should still be cloned by default");
}

/// The pre-clone hook can substitute the result; the substitute is
/// recorded, so every reference to the source resolves to it.
#[test]
fn pre_clone_substitute_is_recorded_in_the_identity_map() {
    let mut registry = TypeRegistry::new();
    let leaf = registry
        .register(TypeDef::object("Leaf").field("n", FieldType::Int))
        .expect("register should succeed");
    let root = registry
        .register(
            TypeDef::object("Root")
                .field("left", FieldType::Named(leaf))
                .field("right", FieldType::Named(leaf)),
        )
        .expect("register should succeed");

    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_hook = Arc::clone(&calls);
    cloner.set_pre_clone_hook(Box::new(move |id, heap, _| {
        let HeapData::Object(obj) = heap.get(id) else {
            return Ok(None);
        };
        if obj.type_id() == leaf {
            calls_in_hook.fetch_add(1, Ordering::SeqCst);
            return Ok(Some(Value::str("substituted")));
        }
        Ok(None)
    }));

    let mut heap = Heap::new(NoLimitTracker);
    let leaf_id = heap.allocate_object(leaf, vec![Value::Int(1)]).expect("allocate should succeed");
    let root_id = heap
        .allocate_object(root, vec![Value::Ref(leaf_id), Value::Ref(leaf_id)])
        .expect("allocate should succeed");

    let cloned = cloner
        .clone_value(&Value::Ref(root_id), &mut heap)
        .expect("clone should succeed");
    let clone_id = cloned.as_ref_id().expect("clone should be a ref");

    let HeapData::Object(obj) = heap.get(clone_id) else {
        panic!("clone should be an object");
    };
    assert_eq!(obj.field(0), Some(&Value::str("substituted")));
    assert_eq!(obj.field(1), Some(&Value::str("substituted")));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "the shared leaf should hit the hook once");
}

/// The post-clone hook sees the finished clone and can replace it.
#[test]
fn post_clone_transform_replaces_the_result() {
    let (registry, leaf) = leaf_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_post_clone_hook(Box::new(|_, cloned, heap, _| {
        // Wrap every cloned object in a tuple alongside a marker.
        let wrapped = heap.allocate_tuple([Value::str("wrapped"), cloned])?;
        Ok(Value::Ref(wrapped))
    }));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(leaf, vec![Value::Int(4)]).expect("allocate should succeed");

    let cloned = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");
    let wrapper = cloned.as_ref_id().expect("result should be a ref");
    let HeapData::Tuple(tup) = heap.get(wrapper) else {
        panic!("post hook should have wrapped the clone in a tuple");
    };
    assert_eq!(tup.get(0), Some(&Value::str("wrapped")));
    assert!(
        tup.get(1).and_then(Value::as_ref_id).is_some_and(|inner| inner != id),
        "the wrapped value should be the fresh clone"
    );
}

/// Hooks never fire for atomic slots.
#[test]
fn hooks_skip_atomic_slots() {
    let mut registry = TypeRegistry::new();
    let handle = registry.register(TypeDef::opaque("Handle")).expect("register should succeed");

    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let calls = Arc::new(AtomicUsize::new(0));
    let pre_calls = Arc::clone(&calls);
    cloner.set_pre_clone_hook(Box::new(move |_, _, _| {
        pre_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_opaque(handle, 1).expect("allocate should succeed");
    cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 0, "atomic slots bypass the hooks");
}

/// Hooks observe arena slots only: an inline struct clone bypasses them,
/// while references inside the struct still reach them.
#[test]
fn hooks_skip_inline_struct_values() {
    let mut registry = TypeRegistry::new();
    let leaf = registry
        .register(TypeDef::object("Leaf").field("n", FieldType::Int))
        .expect("register should succeed");
    let pair = registry
        .register(
            TypeDef::value_type("Pair")
                .field("n", FieldType::Int)
                .field("inner", FieldType::Named(leaf)),
        )
        .expect("register should succeed");

    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    let calls = Arc::new(AtomicUsize::new(0));
    let pre_calls = Arc::clone(&calls);
    cloner.set_pre_clone_hook(Box::new(move |_, _, _| {
        pre_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }));

    let mut heap = Heap::new(NoLimitTracker);
    let inner = heap.allocate_object(leaf, vec![Value::Int(2)]).expect("allocate should succeed");
    let value = Value::structure(StructValue::new(pair, vec![Value::Int(1), Value::Ref(inner)]));

    cloner.clone_value(&value, &mut heap).expect("clone should succeed");

    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "only the arena-backed leaf should reach the hook, not the inline struct"
    );
}

/// A failing hook aborts the whole operation with a hook error.
#[test]
fn hook_errors_propagate() {
    let (registry, leaf) = leaf_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_pre_clone_hook(Box::new(|_, _, _| Err(CloneError::hook("refused"))));

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(leaf, vec![Value::Int(1)]).expect("allocate should succeed");

    let err = cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect_err("the hook failure should surface");
    assert_eq!(err, CloneError::Hook("refused".to_owned()));
}

/// Cleared hooks stop firing.
#[test]
fn cleared_hooks_stop_firing() {
    let (registry, leaf) = leaf_registry();
    let mut cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
    cloner.set_pre_clone_hook(Box::new(|_, _, _| Err(CloneError::hook("should not run"))));
    cloner.clear_pre_clone_hook();

    let mut heap = Heap::new(NoLimitTracker);
    let id = heap.allocate_object(leaf, vec![Value::Int(1)]).expect("allocate should succeed");
    cloner
        .clone_value(&Value::Ref(id), &mut heap)
        .expect("clone should succeed after the hook is cleared");
}
