use std::collections::BTreeMap;

use crate::{
    plan::TypeKey,
    registry::{FieldType, TypeId},
    resource::{ResourceError, ResourceTracker},
    types::{Array, Object, Opaque, StructValue, Tuple},
    value::Value,
};

/// Identifier of an arena slot.
///
/// Slot ids are the engine's notion of object identity: two values are "the
/// same object" exactly when they are `Ref`s to the same `HeapId`. Ids are
/// never reused, so identity-map entries stay valid for the life of the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload stored in an arena slot.
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum HeapData {
    /// A reference-type instance.
    Object(Object),
    /// A value-type instance erased into the arena, where it gains identity.
    Boxed(StructValue),
    /// An array of any rank.
    Array(Array),
    /// A fixed-arity immutable tuple.
    Tuple(Tuple),
    /// An opaque host handle.
    Opaque(Opaque),
}

impl HeapData {
    /// Rough payload size for resource accounting.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        match self {
            Self::Object(obj) => obj.estimate_size(),
            Self::Boxed(sv) => sv.estimate_size(),
            Self::Array(arr) => arr.estimate_size(),
            Self::Tuple(tup) => tup.estimate_size(),
            Self::Opaque(op) => op.estimate_size(),
        }
    }

    /// The plan-cache key this payload's clone behavior is cached under.
    pub(crate) fn type_key(&self) -> TypeKey {
        match self {
            Self::Object(obj) => TypeKey::Named(obj.type_id()),
            Self::Boxed(sv) => TypeKey::Named(sv.type_id()),
            Self::Array(arr) => TypeKey::Array {
                elem: arr.elem().clone(),
                rank: u8::try_from(arr.rank()).expect("HeapData::type_key: array rank exceeds u8"),
            },
            Self::Tuple(_) => TypeKey::Tuple,
            Self::Opaque(op) => TypeKey::Named(op.type_id()),
        }
    }

    /// Field-for-field copy of the payload. `Ref` fields still point at the
    /// original targets; the clone engine overwrites them step by step.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// The registered type id, for payloads that carry one.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Self::Object(obj) => Some(obj.type_id()),
            Self::Boxed(sv) => Some(sv.type_id()),
            Self::Opaque(op) => Some(op.type_id()),
            Self::Array(_) | Self::Tuple(_) => None,
        }
    }
}

/// Snapshot of heap usage, grouped by payload kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Number of live arena slots.
    pub live_objects: usize,
    /// Live slot counts keyed by payload kind name.
    pub objects_by_type: BTreeMap<&'static str, usize>,
}

/// Slot arena for reference-type values.
///
/// Slots are append-only: the engine allocates clones but never frees
/// sources, so a `HeapId` handed out once stays valid. The tracker is
/// consulted before every allocation; with [`NoLimitTracker`] those checks
/// compile away.
///
/// [`NoLimitTracker`]: crate::resource::NoLimitTracker
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Heap<T: ResourceTracker> {
    entries: Vec<HeapData>,
    tracker: T,
}

impl<T: ResourceTracker + Default> Default for Heap<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ResourceTracker> Heap<T> {
    #[must_use]
    pub fn new(tracker: T) -> Self {
        Self {
            entries: Vec::new(),
            tracker,
        }
    }

    #[must_use]
    pub fn with_capacity(tracker: T, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            tracker,
        }
    }

    /// Allocates a new slot.
    ///
    /// # Errors
    /// Returns the tracker's error when an allocation or memory limit would
    /// be exceeded; the slot is not allocated in that case.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(|| data.estimate_size())?;
        let id = HeapId(self.entries.len());
        self.entries.push(data);
        Ok(id)
    }

    /// Allocates an object instance.
    ///
    /// # Errors
    /// Same as [`Heap::allocate`].
    pub fn allocate_object(&mut self, ty: TypeId, fields: Vec<Value>) -> Result<HeapId, ResourceError> {
        self.allocate(HeapData::Object(Object::new(ty, fields)))
    }

    /// Allocates a boxed value-type instance.
    ///
    /// # Errors
    /// Same as [`Heap::allocate`].
    pub fn allocate_boxed(&mut self, sv: StructValue) -> Result<HeapId, ResourceError> {
        self.allocate(HeapData::Boxed(sv))
    }

    /// Allocates a zero-based rank-1 array.
    ///
    /// # Errors
    /// Same as [`Heap::allocate`].
    pub fn allocate_array(&mut self, elem: FieldType, elems: Vec<Value>) -> Result<HeapId, ResourceError> {
        self.allocate(HeapData::Array(Array::one_dim(elem, elems)))
    }

    /// Allocates a tuple.
    ///
    /// # Errors
    /// Same as [`Heap::allocate`].
    pub fn allocate_tuple(&mut self, components: impl IntoIterator<Item = Value>) -> Result<HeapId, ResourceError> {
        self.allocate(HeapData::Tuple(Tuple::new(components)))
    }

    /// Allocates an opaque host handle.
    ///
    /// # Errors
    /// Same as [`Heap::allocate`].
    pub fn allocate_opaque(&mut self, ty: TypeId, token: u64) -> Result<HeapId, ResourceError> {
        self.allocate(HeapData::Opaque(Opaque::new(ty, token)))
    }

    /// Returns the payload of a slot.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.entries.get(id.index()).expect("Heap::get: unknown heap id")
    }

    /// Returns the payload of a slot mutably.
    ///
    /// # Panics
    /// Panics if the id did not come from this heap.
    #[must_use]
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.entries.get_mut(id.index()).expect("Heap::get_mut: unknown heap id")
    }

    /// Returns the payload of a slot, if the id is valid for this heap.
    #[must_use]
    pub fn try_get(&self, id: HeapId) -> Option<&HeapData> {
        self.entries.get(id.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Computes usage statistics over all live slots.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        for entry in &self.entries {
            *objects_by_type.entry(entry.into()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.entries.len(),
            objects_by_type,
        }
    }
}
