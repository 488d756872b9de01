//! Per-type clone plans and the caches that hold them.
//!
//! A plan records, once per type, every decision the clone walk would
//! otherwise re-derive per instance: which fields need recursion, which
//! array fast path applies, whether the whole type is atomic. Plans are
//! built on first use under a compute-once cell, so concurrent first
//! clones of the same type build the plan exactly once and every later
//! clone is a lock-free-after-read-lock lookup.

use std::sync::{Arc, OnceLock, RwLock};

use ahash::AHashMap;

use crate::{
    classify::{AtomicTypeOverride, field_type_is_atomic, type_is_atomic},
    error::{CloneError, CloneResult},
    registry::{FieldType, TypeDef, TypeId, TypeKind, TypeRegistry},
};

/// Cache key for a cloneable shape.
///
/// Registered types key by id; arrays key by element type and rank, so all
/// `int[]` instances share one plan regardless of length or lower bounds;
/// tuples share a single plan since arity is resolved per instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Named(TypeId),
    Array { elem: FieldType, rank: u8 },
    Tuple,
}

impl TypeKey {
    /// Human-readable name for tracer output and error messages.
    pub(crate) fn describe(&self, registry: &TypeRegistry) -> String {
        match self {
            Self::Named(id) => registry
                .try_get(*id)
                .map_or_else(|| format!("type#{idx}", idx = id.index()), |def| def.name().to_owned()),
            Self::Array { elem, rank } => format!("{elem}[rank {rank}]"),
            Self::Tuple => "tuple".to_owned(),
        }
    }
}

/// One field the deep-clone walk must visit.
///
/// Fields whose declared type is atomic are absent: the shallow copy that
/// seeds every clone already carried their values over. Read-only fields
/// are not special here; a brand-new clone is still under construction, so
/// writing them is a construction-time write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldStep {
    /// Index into the instance's flattened field storage.
    pub index: usize,
}

/// Strategy for cloning an array, picked once per element type and rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayPlan {
    /// Every element is atomic: the shallow copy is already correct.
    AtomicElements,
    /// Rank 1, value-type elements: clone each element in place.
    OneDimStruct,
    /// Rank 1, reference or dynamic elements.
    OneDimClass,
    /// Rank 2, zero lower bounds. Falls back to [`ArrayPlan::General`] at
    /// clone time when an instance has nonzero lower bounds.
    TwoDim,
    /// Any rank, any lower bounds; row-major index walk.
    General,
}

/// How to deep-clone a brand-new instance of one type.
#[derive(Debug, Clone)]
pub(crate) enum ClonePlan {
    /// Share the original; no new slot.
    Atomic,
    /// Shallow-copy the instance, then re-clone exactly these fields.
    Fields { steps: Vec<FieldStep> },
    Array(ArrayPlan),
    /// Clone every component, then rebuild the tuple.
    Tuple,
}

/// One field the merge-clone walk must visit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergeStep {
    /// Index into the instance's flattened field storage.
    pub index: usize,
    /// Deep merges clone this field; shallow merges copy the reference.
    pub recurse: bool,
    /// Read-only target fields keep their current value.
    pub readonly: bool,
}

/// How to merge one type's fields into an existing target instance.
#[derive(Debug, Clone)]
pub(crate) enum MergePlan {
    /// Atomic source types merge as the target unchanged.
    Atomic,
    Object { steps: Vec<MergeStep> },
}

/// A compute-once plan cache.
///
/// Double-checked: a read lock resolves the common hit, a short write lock
/// installs an empty cell on miss, and the plan itself is built outside
/// both locks under the cell's `OnceLock`, so a slow plan build never
/// blocks clones of unrelated types. Build failures are cached too: an
/// uncloneable type stays uncloneable until [`PlanTable::clear`].
#[derive(Debug)]
pub(crate) struct PlanTable<P> {
    cells: RwLock<AHashMap<TypeKey, Arc<OnceLock<CloneResult<Arc<P>>>>>>,
}

// Not derived: the derive would demand `P: Default`, and plans have no
// meaningful default value.
impl<P> Default for PlanTable<P> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(AHashMap::new()),
        }
    }
}

impl<P> PlanTable<P> {
    /// Returns the cached plan for `key`, building it on first use.
    pub(crate) fn get_or_build(
        &self,
        key: &TypeKey,
        build: impl FnOnce() -> CloneResult<P>,
    ) -> CloneResult<Arc<P>> {
        let cell = {
            let cells = self.cells.read().expect("PlanTable::get_or_build: lock poisoned");
            cells.get(key).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut cells = self.cells.write().expect("PlanTable::get_or_build: lock poisoned");
                Arc::clone(cells.entry(key.clone()).or_default())
            }
        };
        cell.get_or_init(|| build().map(Arc::new)).clone()
    }

    /// Drops every cached plan. Intended for tests that change type
    /// definitions or overrides between clones.
    pub(crate) fn clear(&self) {
        self.cells.write().expect("PlanTable::clear: lock poisoned").clear();
    }
}

/// The engine's three plan caches. New-clone and merge-clone plans differ
/// in shape, and deep and shallow merges differ in recursion, so each gets
/// its own table.
#[derive(Debug, Default)]
pub(crate) struct PlanCaches {
    pub new_deep: PlanTable<ClonePlan>,
    pub merge_deep: PlanTable<MergePlan>,
    pub merge_shallow: PlanTable<MergePlan>,
}

impl PlanCaches {
    pub(crate) fn clear(&self) {
        self.new_deep.clear();
        self.merge_deep.clear();
        self.merge_shallow.clear();
    }
}

/// Builds the deep-clone plan for a shape.
pub(crate) fn build_clone_plan(
    registry: &TypeRegistry,
    key: &TypeKey,
    over: Option<&AtomicTypeOverride>,
) -> CloneResult<ClonePlan> {
    match key {
        TypeKey::Named(id) => {
            let Some(def) = registry.try_get(*id) else {
                return Err(CloneError::unsupported(key.describe(registry), "unregistered type id"));
            };
            if type_is_atomic(registry, *id, over) {
                return Ok(ClonePlan::Atomic);
            }
            match def.kind() {
                // Enum or opaque forced non-atomic by an override: the
                // shallow copy already duplicates all state.
                TypeKind::Enum { .. } | TypeKind::Opaque => Ok(ClonePlan::Fields { steps: Vec::new() }),
                TypeKind::Object { .. } | TypeKind::Struct { .. } => {
                    let fields = registry.flattened_fields(*id)?;
                    let steps = fields
                        .iter()
                        .enumerate()
                        .filter(|(_, field)| !field_type_is_atomic(registry, field.field_type(), over))
                        .map(|(index, _)| FieldStep { index })
                        .collect();
                    Ok(ClonePlan::Fields { steps })
                }
            }
        }
        TypeKey::Array { elem, rank } => {
            let plan = if field_type_is_atomic(registry, elem, over) {
                ArrayPlan::AtomicElements
            } else {
                match (rank, elem) {
                    (1, FieldType::Named(id))
                        if matches!(registry.try_get(*id).map(TypeDef::kind), Some(TypeKind::Struct { .. })) =>
                    {
                        ArrayPlan::OneDimStruct
                    }
                    (1, _) => ArrayPlan::OneDimClass,
                    (2, _) => ArrayPlan::TwoDim,
                    _ => ArrayPlan::General,
                }
            };
            Ok(ClonePlan::Array(plan))
        }
        TypeKey::Tuple => Ok(ClonePlan::Tuple),
    }
}

/// Builds the merge-clone plan for a shape.
///
/// Merge targets are always object or boxed-struct instances, so array and
/// tuple keys never reach this builder.
pub(crate) fn build_merge_plan(
    registry: &TypeRegistry,
    key: &TypeKey,
    deep: bool,
    over: Option<&AtomicTypeOverride>,
) -> CloneResult<MergePlan> {
    let TypeKey::Named(id) = key else {
        return Err(CloneError::unsupported(
            key.describe(registry),
            "merge-clone targets must be object or struct instances",
        ));
    };
    if type_is_atomic(registry, *id, over) {
        return Ok(MergePlan::Atomic);
    }
    let fields = registry.flattened_fields(*id)?;
    let steps = fields
        .iter()
        .enumerate()
        .map(|(index, field)| MergeStep {
            index,
            recurse: deep && !field_type_is_atomic(registry, field.field_type(), over),
            readonly: field.is_readonly(),
        })
        .collect();
    Ok(MergePlan::Object { steps })
}
