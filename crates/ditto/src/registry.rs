use std::fmt;

use indexmap::IndexMap;

use crate::error::{CloneError, CloneResult};

/// Identifier of a registered runtime type.
///
/// Ids are dense indices into the registry's insertion-ordered table, so a
/// registry round-tripped through serialization keeps its ids stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The statically declared type of a field or array element.
///
/// `Any` means the field can hold any runtime value and clone dispatch must
/// inspect the value itself. Everything else lets the plan builder decide
/// atomicity once, at plan-construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    /// Unconstrained; dispatch per runtime value.
    Any,
    Bool,
    Int,
    Float,
    Char,
    Str,
    /// An opaque function/delegate reference.
    Func,
    /// A registered enumeration type.
    Enum(TypeId),
    /// A registered object, struct, or opaque type.
    Named(TypeId),
    /// An array of the given element type and rank.
    Array { elem: Box<FieldType>, rank: u8 },
    /// A fixed-arity immutable tuple.
    Tuple,
}

impl FieldType {
    /// Shorthand for a rank-1 array of `elem`.
    #[must_use]
    pub fn array_of(elem: FieldType) -> Self {
        Self::Array {
            elem: Box::new(elem),
            rank: 1,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Char => write!(f, "char"),
            Self::Str => write!(f, "str"),
            Self::Func => write!(f, "func"),
            Self::Enum(id) => write!(f, "enum#{idx}", idx = id.index()),
            Self::Named(id) => write!(f, "type#{idx}", idx = id.index()),
            Self::Array { elem, rank } => write!(f, "{elem}[rank {rank}]"),
            Self::Tuple => write!(f, "tuple"),
        }
    }
}

/// A declared field of an object or struct type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDef {
    name: String,
    ty: FieldType,
    readonly: bool,
}

impl FieldDef {
    /// Creates a writable field.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            readonly: false,
        }
    }

    /// Marks the field as read-only (settable only at construction time).
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }
}

/// Shape classification of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    /// A reference type with arena identity. Fields of base types come
    /// first in instance storage, so a derived instance's field layout is a
    /// strict extension of its base's layout.
    Object {
        base: Option<TypeId>,
        fields: Vec<FieldDef>,
    },
    /// A value type stored inline; no identity, no inheritance.
    Struct { fields: Vec<FieldDef> },
    /// An enumeration; instances are immediate and always atomic.
    Enum { variants: Vec<String> },
    /// An opaque host handle; atomic unless an override forces cloning.
    Opaque,
}

impl TypeKind {
    /// Variant name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Object { .. } => "object",
            Self::Struct { .. } => "struct",
            Self::Enum { .. } => "enum",
            Self::Opaque => "opaque",
        }
    }
}

/// A runtime type description, registered once per process in a
/// [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeDef {
    name: String,
    kind: TypeKind,
}

impl TypeDef {
    /// Starts an object (reference) type definition.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Object {
                base: None,
                fields: Vec::new(),
            },
        }
    }

    /// Starts a value (struct) type definition.
    #[must_use]
    pub fn value_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Struct { fields: Vec::new() },
        }
    }

    /// Defines an enumeration type with the given variant names.
    #[must_use]
    pub fn enumeration(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Defines an opaque host-handle type.
    #[must_use]
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Opaque,
        }
    }

    /// Sets the base type of an object definition.
    ///
    /// # Panics
    /// Panics if called on a non-object definition.
    #[must_use]
    pub fn base(mut self, base_id: TypeId) -> Self {
        match &mut self.kind {
            TypeKind::Object { base, .. } => *base = Some(base_id),
            _ => panic!("TypeDef::base: only object types have a base type"),
        }
        self
    }

    /// Appends a writable field to an object or struct definition.
    ///
    /// # Panics
    /// Panics if called on an enum or opaque definition.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push_field(FieldDef::new(name, ty))
    }

    /// Appends a read-only field to an object or struct definition.
    ///
    /// # Panics
    /// Panics if called on an enum or opaque definition.
    #[must_use]
    pub fn readonly_field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push_field(FieldDef::new(name, ty).readonly())
    }

    fn push_field(mut self, def: FieldDef) -> Self {
        match &mut self.kind {
            TypeKind::Object { fields, .. } | TypeKind::Struct { fields } => fields.push(def),
            _ => panic!("TypeDef::field: only object and struct types have fields"),
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }
}

/// Process-lifetime table of runtime type descriptions.
///
/// Insertion order defines [`TypeId`] values. Types are never removed; the
/// table is bounded by the number of distinct runtime types the host ever
/// registers.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDef>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type definition and returns its id.
    ///
    /// # Errors
    /// Returns [`CloneError::DuplicateType`] if the name is already taken.
    ///
    /// # Panics
    /// Panics if the table outgrows `u32` ids.
    pub fn register(&mut self, def: TypeDef) -> CloneResult<TypeId> {
        if self.types.contains_key(def.name()) {
            return Err(CloneError::DuplicateType(def.name().to_owned()));
        }
        let id = TypeId(u32::try_from(self.types.len()).expect("TypeRegistry::register: type table overflow"));
        self.types.insert(def.name().to_owned(), def);
        Ok(id)
    }

    /// Returns the definition for a type id.
    ///
    /// # Panics
    /// Panics if the id was not produced by this registry.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &TypeDef {
        self.try_get(id).expect("TypeRegistry::get: unknown type id")
    }

    /// Returns the definition for a type id, if registered.
    #[must_use]
    pub fn try_get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get_index(id.index()).map(|(_, def)| def)
    }

    /// Looks up a type id by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        // Indices fit u32 because register() enforces it.
        self.types
            .get_index_of(name)
            .and_then(|idx| u32::try_from(idx).ok())
            .map(TypeId)
    }

    /// Returns the name of a registered type.
    ///
    /// # Panics
    /// Panics if the id was not produced by this registry.
    #[must_use]
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).name()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns the base type of an object type, if any.
    #[must_use]
    pub fn base_of(&self, id: TypeId) -> Option<TypeId> {
        match self.try_get(id).map(TypeDef::kind) {
            Some(TypeKind::Object { base, .. }) => *base,
            _ => None,
        }
    }

    /// Returns whether a value of runtime type `from` can be written over a
    /// target of runtime type `to`: the target's type must be the source's
    /// type or derive from it.
    #[must_use]
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        let mut current = Some(to);
        // Bounded by table size to stay safe against base-chain cycles.
        for _ in 0..=self.types.len() {
            match current {
                Some(id) if id == from => return true,
                Some(id) => current = self.base_of(id),
                None => return false,
            }
        }
        false
    }

    /// Returns the full declared field list of a type, own and inherited,
    /// base-first — the order instance storage uses.
    ///
    /// # Errors
    /// Returns [`CloneError::UnsupportedType`] for unregistered ids and
    /// base-chain cycles.
    pub fn flattened_fields(&self, id: TypeId) -> CloneResult<Vec<&FieldDef>> {
        let def = self
            .try_get(id)
            .ok_or_else(|| CloneError::unsupported(format!("type#{idx}", idx = id.index()), "unregistered type id"))?;
        match def.kind() {
            TypeKind::Struct { fields } => Ok(fields.iter().collect()),
            TypeKind::Enum { .. } | TypeKind::Opaque => Ok(Vec::new()),
            TypeKind::Object { .. } => {
                // Walk the base chain root-first so derived layouts extend
                // their base's layout.
                let mut chain = Vec::new();
                let mut current = Some(id);
                while let Some(ty) = current {
                    if chain.len() > self.types.len() {
                        return Err(CloneError::unsupported(def.name(), "base-type chain contains a cycle"));
                    }
                    chain.push(ty);
                    current = self.base_of(ty);
                }
                let mut fields = Vec::new();
                for ty in chain.into_iter().rev() {
                    if let TypeKind::Object { fields: own, .. } = self.get(ty).kind() {
                        fields.extend(own.iter());
                    }
                }
                Ok(fields)
            }
        }
    }
}
