//! The deep-clone engine.
//!
//! [`Cloner`] owns the type registry, the plan caches, and the
//! customization hooks; the heap being cloned is passed per call. Clones
//! are driven by cached per-type plans: the first clone of a type builds
//! its plan, every later clone replays it.

use std::sync::Arc;

use crate::{
    classify::AtomicTypeOverride,
    error::{CloneError, CloneResult},
    heap::{Heap, HeapData, HeapId},
    plan::{ArrayPlan, ClonePlan, FieldStep, PlanCaches, TypeKey, build_clone_plan},
    registry::{TypeId, TypeRegistry},
    resource::ResourceTracker,
    state::CloneState,
    tracer::{CloneTracer, NoopTracer, PlanKind},
    types::{Array, StructValue, Tuple},
    value::Value,
};

/// Pre-clone hook: runs before a slot is structurally cloned and may
/// substitute the result.
///
/// Returning `Ok(Some(value))` short-circuits the clone; the substitute is
/// recorded in the identity map, so every other reference to the same slot
/// in this operation resolves to it. Returning `Ok(None)` proceeds with the
/// structural clone.
///
/// Hooks observe arena slots only: inline [`Value::Struct`] clones have no
/// slot identity and bypass both hooks. A value type that must be
/// intercepted has to be boxed into the arena first.
pub type PreCloneHook<T> =
    Box<dyn Fn(HeapId, &mut Heap<T>, &mut CloneState) -> CloneResult<Option<Value>> + Send + Sync>;

/// Post-clone hook: runs after a slot is structurally cloned and may
/// replace the result.
///
/// The identity map keeps the untransformed clone: references that resolved
/// through it before or during the transform are not rewritten. Like the
/// pre-clone hook, this fires for arena slots only; inline [`Value::Struct`]
/// clones bypass it.
pub type PostCloneHook<T> =
    Box<dyn Fn(HeapId, Value, &mut Heap<T>, &mut CloneState) -> CloneResult<Value> + Send + Sync>;

/// A deep-clone engine bound to one type registry.
///
/// Plan caches live inside the engine, so hooks and overrides are scoped to
/// it: two engines over the same registry with different overrides never
/// see each other's plans. Cloning takes `&self`; a `Cloner` behind an
/// `Arc` can serve clones of independent heaps from multiple threads.
pub struct Cloner<T: ResourceTracker> {
    registry: TypeRegistry,
    caches: PlanCaches,
    atomic_override: Option<AtomicTypeOverride>,
    pre_clone: Option<PreCloneHook<T>>,
    post_clone: Option<PostCloneHook<T>>,
}

impl<T: ResourceTracker> std::fmt::Debug for Cloner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloner")
            .field("registry", &self.registry)
            .field("caches", &self.caches)
            .field("atomic_override", &self.atomic_override.is_some())
            .field("pre_clone", &self.pre_clone.is_some())
            .field("post_clone", &self.post_clone.is_some())
            .finish()
    }
}

impl<T: ResourceTracker> Cloner<T> {
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            caches: PlanCaches::default(),
            atomic_override: None,
            pre_clone: None,
            post_clone: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Installs the atomicity override.
    ///
    /// Plans already cached are not rebuilt; install overrides before the
    /// first clone that touches the types they cover, or call
    /// [`Cloner::clear_plan_caches`] after changing them.
    pub fn set_atomic_override(&mut self, over: AtomicTypeOverride) {
        self.atomic_override = Some(over);
    }

    pub fn clear_atomic_override(&mut self) {
        self.atomic_override = None;
    }

    /// Installs the pre-clone substitution hook.
    pub fn set_pre_clone_hook(&mut self, hook: PreCloneHook<T>) {
        self.pre_clone = Some(hook);
    }

    pub fn clear_pre_clone_hook(&mut self) {
        self.pre_clone = None;
    }

    /// Installs the post-clone transform hook.
    pub fn set_post_clone_hook(&mut self, hook: PostCloneHook<T>) {
        self.post_clone = Some(hook);
    }

    pub fn clear_post_clone_hook(&mut self) {
        self.post_clone = None;
    }

    /// Drops all cached plans, successes and failures alike.
    ///
    /// Intended for tests that change overrides between clones; production
    /// hosts never need it.
    pub fn clear_plan_caches(&self) {
        self.caches.clear();
    }

    /// Deep-clones a value, preserving shared references and cycles within
    /// this single call.
    ///
    /// # Errors
    /// Fails on resource limits, hook failures, and types the plan builder
    /// rejects. Plan failures are cached: the same type keeps failing until
    /// [`Cloner::clear_plan_caches`].
    pub fn clone_value(&self, value: &Value, heap: &mut Heap<T>) -> CloneResult<Value> {
        self.clone_value_traced(value, heap, &mut NoopTracer)
    }

    /// [`Cloner::clone_value`] with an observer.
    ///
    /// # Errors
    /// Same as [`Cloner::clone_value`].
    pub fn clone_value_traced(
        &self,
        value: &Value,
        heap: &mut Heap<T>,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let mut state = CloneState::new();
        self.clone_value_inner(value, heap, &mut state, tracer)
    }

    pub(crate) fn clone_value_inner(
        &self,
        value: &Value,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        match value {
            Value::Struct(sv) => Ok(Value::Struct(Box::new(self.clone_struct_value(sv, heap, state, tracer)?))),
            Value::Ref(id) => self.clone_ref(*id, heap, state, tracer),
            // Immediates are atomic by construction.
            _ => Ok(value.clone()),
        }
    }

    /// Clones an inline value-type instance field by field. Inline structs
    /// have no identity, so there is no identity-map bookkeeping here.
    fn clone_struct_value(
        &self,
        sv: &StructValue,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<StructValue> {
        let plan = self.plan_for(&TypeKey::Named(sv.type_id()), tracer)?;
        let steps = match &*plan {
            ClonePlan::Atomic => return Ok(sv.clone()),
            ClonePlan::Fields { steps } => steps,
            ClonePlan::Array(_) | ClonePlan::Tuple => {
                panic!("Cloner::clone_struct_value: named type produced a non-field plan")
            }
        };
        let mut copy = sv.clone();
        for step in steps {
            let original = copy
                .field(step.index)
                .cloned()
                .ok_or_else(|| self.missing_field_error(sv.type_id(), step.index))?;
            let cloned = self.clone_value_inner(&original, heap, state, tracer)?;
            copy.set_field(step.index, cloned);
        }
        Ok(copy)
    }

    fn clone_ref(
        &self,
        id: HeapId,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let depth = state.enter();
        if let Err(err) = heap.tracker().check_clone_depth(depth) {
            state.leave();
            return Err(err.into());
        }
        let result = self.clone_ref_inner(id, heap, state, tracer);
        state.leave();
        result
    }

    fn clone_ref_inner(
        &self,
        id: HeapId,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let key = heap.get(id).type_key();
        let plan = self.plan_for(&key, tracer)?;

        // Atomic check precedes the identity map: atomic slots are shared
        // without ever entering it.
        if matches!(&*plan, ClonePlan::Atomic) {
            tracer.on_atomic_shared(id);
            return Ok(Value::Ref(id));
        }

        if let Some(known) = state.get_known_ref(id) {
            let known = known.clone();
            tracer.on_identity_hit(id);
            return Ok(known);
        }

        if let Some(hook) = &self.pre_clone {
            if let Some(substitute) = hook(id, heap, state)? {
                state.add_known_ref(id, substitute.clone());
                tracer.on_pre_clone_hook(id, true);
                return Ok(substitute);
            }
            tracer.on_pre_clone_hook(id, false);
        }

        let cloned = match &*plan {
            ClonePlan::Atomic => unreachable!("Cloner::clone_ref_inner: atomic plan handled above"),
            ClonePlan::Fields { steps } => self.clone_slot_fields(id, steps, heap, state, tracer)?,
            ClonePlan::Tuple => self.clone_tuple(id, heap, state, tracer)?,
            ClonePlan::Array(array_plan) => self.clone_array(id, *array_plan, heap, state, tracer)?,
        };

        if let Some(hook) = &self.post_clone {
            let transformed = hook(id, cloned, heap, state)?;
            tracer.on_post_clone_hook(id);
            return Ok(transformed);
        }
        Ok(cloned)
    }

    /// Shallow-copies a field-bearing slot, records the copy in the
    /// identity map, then re-clones the plan's fields in place. Recording
    /// before the field walk is what terminates cycles.
    fn clone_slot_fields(
        &self,
        id: HeapId,
        steps: &[FieldStep],
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let copy = heap.get(id).shallow_copy();
        let clone_id = heap.allocate(copy)?;
        state.add_known_ref(id, Value::Ref(clone_id));
        tracer.on_object_cloned(id, clone_id);

        for step in steps {
            // Pull the field value out before recursing so the heap borrow
            // is released.
            let original = slot_field(heap.get(clone_id), step.index)
                .cloned()
                .ok_or_else(|| self.missing_slot_field_error(heap, clone_id, step.index))?;
            let cloned = self.clone_value_inner(&original, heap, state, tracer)?;
            slot_set_field(heap.get_mut(clone_id), step.index, cloned);
        }
        Ok(Value::Ref(clone_id))
    }

    /// Clones every tuple component, then builds the new tuple and records
    /// it. Tuples are immutable, so the identity entry can only be added
    /// after construction; components that need the in-progress tuple's
    /// identity cannot exist, because an immutable tuple can only reference
    /// slots that existed before it did.
    fn clone_tuple(
        &self,
        id: HeapId,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let components = match heap.get(id) {
            HeapData::Tuple(tup) => tup.components().to_vec(),
            _ => panic!("Cloner::clone_tuple: slot is not a tuple"),
        };
        let mut cloned = Vec::with_capacity(components.len());
        for component in &components {
            cloned.push(self.clone_value_inner(component, heap, state, tracer)?);
        }
        let clone_id = heap.allocate(HeapData::Tuple(Tuple::new(cloned)))?;
        state.add_known_ref(id, Value::Ref(clone_id));
        tracer.on_object_cloned(id, clone_id);
        Ok(Value::Ref(clone_id))
    }

    fn clone_array(
        &self,
        id: HeapId,
        array_plan: ArrayPlan,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        let source = match heap.get(id) {
            HeapData::Array(arr) => arr.clone(),
            _ => panic!("Cloner::clone_array: slot is not an array"),
        };

        // Atomic elements: the memberwise copy is already correct.
        if array_plan == ArrayPlan::AtomicElements {
            let clone_id = heap.allocate(HeapData::Array(source))?;
            state.add_known_ref(id, Value::Ref(clone_id));
            tracer.on_object_cloned(id, clone_id);
            return Ok(Value::Ref(clone_id));
        }

        // Allocate a null-filled array of the same shape first, so cycles
        // through array elements resolve to the clone under construction.
        let clone_id = heap.allocate(HeapData::Array(source.filled_like(Value::Null)))?;
        state.add_known_ref(id, Value::Ref(clone_id));
        tracer.on_object_cloned(id, clone_id);

        match array_plan {
            ArrayPlan::AtomicElements => unreachable!("Cloner::clone_array: atomic elements handled above"),
            ArrayPlan::OneDimStruct | ArrayPlan::OneDimClass => {
                for offset in 0..source.len() {
                    self.clone_element(&source, offset, clone_id, heap, state, tracer)?;
                }
            }
            ArrayPlan::TwoDim => {
                // The rank-2 fast path assumes zero lower bounds; instances
                // with displaced bounds take the general walk.
                if source.is_zero_based() {
                    let (rows, cols) = (source.lengths()[0], source.lengths()[1]);
                    for row in 0..rows {
                        for col in 0..cols {
                            self.clone_element(&source, row * cols + col, clone_id, heap, state, tracer)?;
                        }
                    }
                } else {
                    self.clone_array_general(&source, clone_id, heap, state, tracer)?;
                }
            }
            ArrayPlan::General => self.clone_array_general(&source, clone_id, heap, state, tracer)?,
        }
        Ok(Value::Ref(clone_id))
    }

    /// Walk for arrays of any rank and lower bounds. Storage is flat
    /// row-major regardless of rank, so visiting flat offsets in order is
    /// the same traversal the index-tuple order would produce.
    fn clone_array_general(
        &self,
        source: &Array,
        clone_id: HeapId,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<()> {
        // A zero-length dimension means there is nothing to visit.
        if source.has_zero_length_dim() {
            return Ok(());
        }
        for offset in 0..source.len() {
            self.clone_element(source, offset, clone_id, heap, state, tracer)?;
        }
        Ok(())
    }

    fn clone_element(
        &self,
        source: &Array,
        offset: usize,
        clone_id: HeapId,
        heap: &mut Heap<T>,
        state: &mut CloneState,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<()> {
        let cloned = self.clone_value_inner(&source.elems()[offset], heap, state, tracer)?;
        match heap.get_mut(clone_id) {
            HeapData::Array(arr) => arr.set_elem(offset, cloned),
            _ => panic!("Cloner::clone_element: clone slot is not an array"),
        }
        Ok(())
    }

    pub(crate) fn plan_for(&self, key: &TypeKey, tracer: &mut impl CloneTracer) -> CloneResult<Arc<ClonePlan>> {
        let mut built = false;
        let plan = self.caches.new_deep.get_or_build(key, || {
            built = true;
            build_clone_plan(&self.registry, key, self.atomic_override.as_ref())
        });
        if built {
            tracer.on_plan_built(&key.describe(&self.registry), PlanKind::NewDeep);
        }
        plan
    }

    pub(crate) fn caches(&self) -> &PlanCaches {
        &self.caches
    }

    pub(crate) fn atomic_override(&self) -> Option<&AtomicTypeOverride> {
        self.atomic_override.as_ref()
    }

    fn missing_field_error(&self, ty: TypeId, index: usize) -> CloneError {
        CloneError::unsupported(
            self.registry.name(ty),
            format!("instance has no field at index {index} its type declares"),
        )
    }

    fn missing_slot_field_error(&self, heap: &Heap<T>, id: HeapId, index: usize) -> CloneError {
        let type_name = heap
            .get(id)
            .type_id()
            .map_or_else(|| "<unnamed>".to_owned(), |ty| self.registry.name(ty).to_owned());
        CloneError::unsupported(
            type_name,
            format!("instance has no field at index {index} its type declares"),
        )
    }
}

/// Field access across the two field-bearing payload kinds.
pub(crate) fn slot_field(data: &HeapData, index: usize) -> Option<&Value> {
    match data {
        HeapData::Object(obj) => obj.field(index),
        HeapData::Boxed(sv) => sv.field(index),
        HeapData::Array(_) | HeapData::Tuple(_) | HeapData::Opaque(_) => None,
    }
}

pub(crate) fn slot_set_field(data: &mut HeapData, index: usize, value: Value) {
    match data {
        HeapData::Object(obj) => obj.set_field(index, value),
        HeapData::Boxed(sv) => sv.set_field(index, value),
        _ => panic!("Cloner::slot_set_field: slot is not a field-bearing payload"),
    }
}
