use std::mem;

use crate::{registry::TypeId, value::Value};

/// A reference-type instance: a runtime type plus its flattened field
/// storage (base-type fields first, then own fields).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Object {
    ty: TypeId,
    fields: Vec<Value>,
}

impl Object {
    #[must_use]
    pub fn new(ty: TypeId, fields: Vec<Value>) -> Self {
        Self { ty, fields }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the field at `index`, if the instance has that many fields.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Overwrites the field at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set_field(&mut self, index: usize, value: Value) {
        self.fields[index] = value;
    }

    /// Rough payload size for resource accounting.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        mem::size_of::<Self>() + self.fields.len() * mem::size_of::<Value>()
    }
}

/// A value-type instance. Stored inline in [`Value::Struct`] or, when
/// erased into a mixed container, boxed in the arena where it gains slot
/// identity.
///
/// [`Value::Struct`]: crate::value::Value::Struct
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructValue {
    ty: TypeId,
    fields: Vec<Value>,
}

impl StructValue {
    #[must_use]
    pub fn new(ty: TypeId, fields: Vec<Value>) -> Self {
        Self { ty, fields }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the field at `index`, if the instance has that many fields.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Overwrites the field at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set_field(&mut self, index: usize, value: Value) {
        self.fields[index] = value;
    }

    #[must_use]
    pub fn estimate_size(&self) -> usize {
        mem::size_of::<Self>() + self.fields.len() * mem::size_of::<Value>()
    }
}

/// An opaque host handle with arena identity.
///
/// Opaque types are atomic by default: cloning shares the same arena slot.
/// An atomic-type override returning `false` forces a structural clone,
/// which duplicates the handle token into a fresh slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Opaque {
    ty: TypeId,
    token: u64,
}

impl Opaque {
    #[must_use]
    pub fn new(ty: TypeId, token: u64) -> Self {
        Self { ty, token }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    /// The host-side handle value.
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[must_use]
    pub fn estimate_size(&self) -> usize {
        mem::size_of::<Self>()
    }
}
