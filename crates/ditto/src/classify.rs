//! Atomicity classification.
//!
//! An atomic type is one where duplicating an instance can never be
//! observed, so cloning it shares the original. Scalars, strings, enum
//! values, and function references are atomic by construction; opaque
//! handles are atomic by default; objects and structs never are. An
//! engine-level override can flip the verdict for any registered type.

use crate::registry::{FieldType, TypeDef, TypeId, TypeKind, TypeRegistry};

/// Engine-level atomicity override.
///
/// Consulted before the default classification; `None` defers to it.
/// Plans are built once per type and cached, so the override must be
/// installed before the first clone touching the types it covers.
pub type AtomicTypeOverride = Box<dyn Fn(&TypeRegistry, TypeId) -> Option<bool> + Send + Sync>;

/// Classifies a registered type, consulting the override first.
pub(crate) fn type_is_atomic(registry: &TypeRegistry, id: TypeId, over: Option<&AtomicTypeOverride>) -> bool {
    if let Some(over) = over
        && let Some(verdict) = over(registry, id)
    {
        return verdict;
    }
    match registry.try_get(id).map(TypeDef::kind) {
        Some(TypeKind::Enum { .. } | TypeKind::Opaque) => true,
        // Ids the registry does not know fall through to the structural
        // path, whose plan build reports them as unsupported.
        Some(TypeKind::Object { .. } | TypeKind::Struct { .. }) | None => false,
    }
}

/// Classifies a declared field or element type.
///
/// `Any` is never atomic: the plan cannot know what the field will hold, so
/// dispatch happens per value at clone time.
pub(crate) fn field_type_is_atomic(
    registry: &TypeRegistry,
    ty: &FieldType,
    over: Option<&AtomicTypeOverride>,
) -> bool {
    match ty {
        FieldType::Any | FieldType::Array { .. } | FieldType::Tuple => false,
        FieldType::Bool | FieldType::Int | FieldType::Float | FieldType::Char | FieldType::Str | FieldType::Func => {
            true
        }
        FieldType::Enum(id) | FieldType::Named(id) => type_is_atomic(registry, *id, over),
    }
}
