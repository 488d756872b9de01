use std::fmt;

use crate::resource::ResourceError;

/// Result alias used throughout the cloning engine.
pub type CloneResult<T> = Result<T, CloneError>;

/// Error raised by clone operations, plan construction, and registration.
///
/// Plan construction errors are cached alongside the plan slot, so a type
/// that fails to build a plan stays unsupported for the life of the process
/// (until a test-only cache reset). The error type is `Clone` for exactly
/// that reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneError {
    /// `clone_into` was called with a null source and a non-null target.
    NullSource,
    /// `clone_into` target's runtime type is not assignable from the
    /// source's runtime type.
    TypeMismatch { from: String, to: String },
    /// Strings are atomic and must never be merge-clone operands.
    StringTarget,
    /// The value kind cannot be a merge-clone operand (arrays, tuples,
    /// immediates).
    UnsupportedTarget { kind: String },
    /// The plan builder could not produce a clone plan for this type.
    UnsupportedType { type_name: String, reason: String },
    /// A type name was registered twice.
    DuplicateType(String),
    /// An array was constructed with inconsistent rank, lengths, or
    /// element count.
    InvalidShape(String),
    /// A resource limit was exceeded during the operation.
    Resource(ResourceError),
    /// A caller-supplied hook failed.
    Hook(String),
}

impl CloneError {
    /// Convenience constructor for hook implementations.
    #[must_use]
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    pub(crate) fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullSource => {
                write!(f, "cannot merge-clone a null source into a non-null target")
            }
            Self::TypeMismatch { from, to } => {
                write!(f, "target type '{to}' is not assignable from source type '{from}'")
            }
            Self::StringTarget => {
                write!(f, "strings are atomic and cannot be merge-clone operands")
            }
            Self::UnsupportedTarget { kind } => {
                write!(f, "merge-clone does not support {kind} operands")
            }
            Self::UnsupportedType { type_name, reason } => {
                write!(f, "type '{type_name}' is not cloneable: {reason}")
            }
            Self::DuplicateType(name) => {
                write!(f, "type '{name}' is already registered")
            }
            Self::InvalidShape(reason) => {
                write!(f, "invalid array shape: {reason}")
            }
            Self::Resource(err) => write!(f, "{err}"),
            Self::Hook(msg) => write!(f, "clone hook failed: {msg}"),
        }
    }
}

impl std::error::Error for CloneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for CloneError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}
