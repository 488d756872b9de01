//! A runtime-typed deep object-graph duplication engine.
//!
//! `ditto` clones arbitrary object graphs held in a slot arena: objects,
//! boxed value types, arrays of any rank, and immutable tuples, with types
//! described at runtime in a [`TypeRegistry`]. Clones preserve graph
//! structure exactly: shared references stay shared, cycles terminate, and
//! atomic values (scalars, strings, enum values, function handles, opaque
//! host handles) are shared instead of duplicated.
//!
//! The engine is plan-driven: the first clone of each type builds a clone
//! plan recording which fields need recursion and which array strategy
//! applies, and every later clone of that type replays the cached plan.
//!
//! ```
//! use ditto::{Cloner, FieldType, Heap, NoLimitTracker, TypeDef, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! let node = registry
//!     .register(TypeDef::object("Node").field("label", FieldType::Str).field("next", FieldType::Any))
//!     .unwrap();
//!
//! let mut heap = Heap::new(NoLimitTracker);
//! let a = heap.allocate_object(node, vec![Value::str("a"), Value::Null]).unwrap();
//! let b = heap.allocate_object(node, vec![Value::str("b"), Value::Ref(a)]).unwrap();
//!
//! let cloner: Cloner<NoLimitTracker> = Cloner::new(registry);
//! let copy = cloner.clone_value(&Value::Ref(b), &mut heap).unwrap();
//! assert_ne!(copy, Value::Ref(b));
//! ```

mod classify;
mod cloner;
mod error;
mod heap;
mod merge;
mod plan;
mod registry;
mod resource;
mod state;
mod tracer;
mod types;
mod value;

pub use classify::AtomicTypeOverride;
pub use cloner::{Cloner, PostCloneHook, PreCloneHook};
pub use error::{CloneError, CloneResult};
pub use heap::{Heap, HeapData, HeapId, HeapStats};
pub use registry::{FieldDef, FieldType, TypeDef, TypeId, TypeKind, TypeRegistry};
pub use resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker};
pub use state::CloneState;
pub use tracer::{CloneTracer, NoopTracer, PlanKind, RecordingTracer, StderrTracer, TraceEvent};
pub use types::{Array, Object, Opaque, StructValue, Tuple};
pub use value::{EnumValue, FuncId, Value};
