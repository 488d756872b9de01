//! Concrete runtime shapes stored in the arena or inline in values.

mod array;
mod object;
mod tuple;

pub use array::Array;
pub use object::{Object, Opaque, StructValue};
pub use tuple::Tuple;
