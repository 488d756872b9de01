//! Merge-clone: copying a source instance's state into an existing target.
//!
//! Unlike a new clone, the target slot already exists and keeps its
//! identity; only its fields change. Read-only fields were fixed at the
//! target's construction and are left untouched.

use crate::{
    cloner::{Cloner, slot_field, slot_set_field},
    error::{CloneError, CloneResult},
    heap::{Heap, HeapData, HeapId},
    plan::{MergePlan, TypeKey, build_merge_plan},
    registry::TypeId,
    resource::ResourceTracker,
    state::CloneState,
    tracer::{CloneTracer, NoopTracer, PlanKind},
    value::Value,
};

impl<T: ResourceTracker> Cloner<T> {
    /// Copies the source's fields into the target instance.
    ///
    /// The target keeps its slot identity; on success the returned value is
    /// a `Ref` to it. `deep` controls whether reference-typed fields are
    /// cloned or shared. A null target merges to null; read-only target
    /// fields keep their current values.
    ///
    /// # Errors
    /// - [`CloneError::NullSource`] for a null source with a non-null target.
    /// - [`CloneError::StringTarget`] when either operand is a string.
    /// - [`CloneError::UnsupportedTarget`] when either operand is not an
    ///   object or boxed-struct instance.
    /// - [`CloneError::TypeMismatch`] when the target's type is not the
    ///   source's type or a type derived from it.
    pub fn clone_into(&self, source: &Value, target: &Value, deep: bool, heap: &mut Heap<T>) -> CloneResult<Value> {
        self.clone_into_traced(source, target, deep, heap, &mut NoopTracer)
    }

    /// [`Cloner::clone_into`] with an observer.
    ///
    /// # Errors
    /// Same as [`Cloner::clone_into`].
    pub fn clone_into_traced(
        &self,
        source: &Value,
        target: &Value,
        deep: bool,
        heap: &mut Heap<T>,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<Value> {
        if target.is_null() {
            return Ok(Value::Null);
        }
        if source.is_null() {
            return Err(CloneError::NullSource);
        }
        if matches!(source, Value::Str(_)) || matches!(target, Value::Str(_)) {
            return Err(CloneError::StringTarget);
        }
        let (Some(source_id), Some(target_id)) = (source.as_ref_id(), target.as_ref_id()) else {
            let kind = if source.as_ref_id().is_none() { source } else { target };
            return Err(CloneError::UnsupportedTarget {
                kind: kind.kind_name().to_owned(),
            });
        };

        let source_ty = self.instance_type(heap, source_id)?;
        let target_ty = self.instance_type(heap, target_id)?;
        if !self.registry().is_assignable(source_ty, target_ty) {
            return Err(CloneError::TypeMismatch {
                from: TypeKey::Named(source_ty).describe(self.registry()),
                to: TypeKey::Named(target_ty).describe(self.registry()),
            });
        }

        // The plan is keyed by the source's type: its field layout is a
        // prefix of the target's, since the target derives from it.
        let plan = self.merge_plan_for(source_ty, deep, tracer)?;
        let steps = match &*plan {
            MergePlan::Atomic => return Ok(Value::Ref(target_id)),
            MergePlan::Object { steps } => steps,
        };

        let mut state = CloneState::new();
        // Source self-references resolve to the target, so a graph that
        // points back at its root stays consistent after the merge.
        state.add_known_ref(source_id, Value::Ref(target_id));

        for step in steps {
            if step.readonly {
                continue;
            }
            let original = slot_field(heap.get(source_id), step.index)
                .cloned()
                .ok_or_else(|| self.merge_field_error(source_ty, step.index))?;
            let value = if step.recurse {
                self.clone_value_inner(&original, heap, &mut state, tracer)?
            } else {
                original
            };
            slot_set_field(heap.get_mut(target_id), step.index, value);
        }
        Ok(Value::Ref(target_id))
    }

    /// The registered type of a merge operand, which must be a
    /// field-bearing slot.
    fn instance_type(&self, heap: &Heap<T>, id: HeapId) -> CloneResult<TypeId> {
        match heap.get(id) {
            HeapData::Object(obj) => Ok(obj.type_id()),
            HeapData::Boxed(sv) => Ok(sv.type_id()),
            other => Err(CloneError::UnsupportedTarget {
                kind: <&'static str>::from(other).to_owned(),
            }),
        }
    }

    fn merge_plan_for(
        &self,
        ty: TypeId,
        deep: bool,
        tracer: &mut impl CloneTracer,
    ) -> CloneResult<std::sync::Arc<MergePlan>> {
        let key = TypeKey::Named(ty);
        let (table, kind) = if deep {
            (&self.caches().merge_deep, PlanKind::MergeDeep)
        } else {
            (&self.caches().merge_shallow, PlanKind::MergeShallow)
        };
        let mut built = false;
        let plan = table.get_or_build(&key, || {
            built = true;
            build_merge_plan(self.registry(), &key, deep, self.atomic_override())
        });
        if built {
            tracer.on_plan_built(&key.describe(self.registry()), kind);
        }
        plan
    }

    fn merge_field_error(&self, ty: TypeId, index: usize) -> CloneError {
        CloneError::unsupported(
            self.registry().name(ty),
            format!("instance has no field at index {index} its type declares"),
        )
    }
}
