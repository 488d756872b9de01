use std::sync::Arc;

use crate::{heap::HeapId, registry::TypeId, types::StructValue};

/// Opaque identifier of a host-side function or delegate.
///
/// Function references close over host state the engine cannot duplicate,
/// so they are always shared, never cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FuncId(u32);

impl FuncId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value of a registered enumeration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EnumValue {
    /// The enumeration's registered type.
    pub ty: TypeId,
    /// Zero-based variant ordinal.
    pub ordinal: u32,
}

impl EnumValue {
    #[must_use]
    pub fn new(ty: TypeId, ordinal: u32) -> Self {
        Self { ty, ordinal }
    }
}

/// Primary value type for runtime object graphs.
///
/// This enum uses a hybrid design: immediate values (scalars, strings, enum
/// values, function handles) are stored inline, value-type instances travel
/// inline as `Struct`, and reference types live in the arena and are
/// addressed via `Ref(HeapId)`.
///
/// Strings are immutable and shared through `Arc`, so "cloning" one aliases
/// the same backing storage — the observable behavior the atomic-type rules
/// require.
///
/// NOTE: derived `PartialEq` compares `Ref` values by arena identity, not by
/// pointed-to content. Structural comparison is a host concern.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// The absent value. Cloning null yields null.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    /// An immutable shared string.
    Str(Arc<str>),
    /// A value of a registered enumeration type.
    Enum(EnumValue),
    /// An opaque function/delegate reference; shared by policy.
    Func(FuncId),
    /// A value-type instance stored inline. Two `Struct` values are never
    /// the same identity; they clone field-by-field with no identity-map
    /// bookkeeping.
    Struct(Box<StructValue>),
    /// A reference-type instance stored in the arena.
    Ref(HeapId),
}

impl Value {
    /// Builds a string value.
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// Builds an inline struct value.
    #[must_use]
    pub fn structure(sv: StructValue) -> Self {
        Self::Struct(Box::new(sv))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the arena id for reference values.
    #[must_use]
    pub fn as_ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns whether the value is immediate and atomic by construction:
    /// cloning it can never observably matter.
    #[must_use]
    pub fn is_atomic_immediate(&self) -> bool {
        match self {
            Self::Null
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Char(_)
            | Self::Str(_)
            | Self::Enum(_)
            | Self::Func(_) => true,
            Self::Struct(_) | Self::Ref(_) => false,
        }
    }

    /// Short kind name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Char(_) => "char",
            Self::Str(_) => "str",
            Self::Enum(_) => "enum",
            Self::Func(_) => "func",
            Self::Struct(_) => "struct",
            Self::Ref(_) => "ref",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::str(v)
    }
}
