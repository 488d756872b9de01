use std::mem;

use smallvec::SmallVec;

use crate::value::Value;

/// A fixed-arity immutable tuple.
///
/// Components are set only through construction; there is no mutable
/// access. The clone engine therefore clones every component first and
/// rebuilds the tuple from the cloned components.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tuple(SmallVec<[Value; 3]>);

impl Tuple {
    #[must_use]
    pub fn new(components: impl IntoIterator<Item = Value>) -> Self {
        Self(components.into_iter().collect())
    }

    #[must_use]
    pub fn components(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    #[must_use]
    pub fn estimate_size(&self) -> usize {
        mem::size_of::<Self>() + self.0.len() * mem::size_of::<Value>()
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(components: Vec<Value>) -> Self {
        Self(components.into_iter().collect())
    }
}
