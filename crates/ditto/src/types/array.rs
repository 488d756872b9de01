use std::mem;

use smallvec::SmallVec;

use crate::{
    error::{CloneError, CloneResult},
    registry::FieldType,
    value::Value,
};

/// An array of arbitrary rank with per-dimension lengths and lower bounds.
///
/// Elements are stored flat in row-major order (last dimension varies
/// fastest). Most arrays are rank 1 or 2 with zero lower bounds, which is
/// what the clone engine's fast paths assume; everything else goes through
/// the general path.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Array {
    elem: FieldType,
    lengths: SmallVec<[usize; 2]>,
    lower_bounds: SmallVec<[i64; 2]>,
    elems: Vec<Value>,
}

impl Array {
    /// Creates an array with explicit rank, lengths, and lower bounds.
    ///
    /// # Errors
    /// Returns [`CloneError::InvalidShape`] when rank is zero or exceeds
    /// `u8::MAX`, when `lengths` and `lower_bounds` disagree on rank, or
    /// when the element count does not match the product of the lengths.
    pub fn new(elem: FieldType, lengths: &[usize], lower_bounds: &[i64], elems: Vec<Value>) -> CloneResult<Self> {
        if lengths.is_empty() || lengths.len() > usize::from(u8::MAX) {
            return Err(CloneError::InvalidShape(format!(
                "rank must be between 1 and 255, got {rank}",
                rank = lengths.len()
            )));
        }
        if lengths.len() != lower_bounds.len() {
            return Err(CloneError::InvalidShape(format!(
                "{ll} lengths but {lb} lower bounds",
                ll = lengths.len(),
                lb = lower_bounds.len()
            )));
        }
        let expected = lengths
            .iter()
            .try_fold(1_usize, |acc, &len| acc.checked_mul(len))
            .ok_or_else(|| CloneError::InvalidShape("element count overflows usize".to_owned()))?;
        if elems.len() != expected {
            return Err(CloneError::InvalidShape(format!(
                "expected {expected} elements for shape {lengths:?}, got {got}",
                got = elems.len()
            )));
        }
        Ok(Self {
            elem,
            lengths: SmallVec::from_slice(lengths),
            lower_bounds: SmallVec::from_slice(lower_bounds),
            elems,
        })
    }

    /// Creates a zero-based rank-1 array.
    #[must_use]
    pub fn one_dim(elem: FieldType, elems: Vec<Value>) -> Self {
        let len = elems.len();
        Self {
            elem,
            lengths: SmallVec::from_slice(&[len]),
            lower_bounds: SmallVec::from_slice(&[0]),
            elems,
        }
    }

    /// Creates a zero-based rank-2 array with `rows * cols` elements in
    /// row-major order.
    ///
    /// # Errors
    /// Returns [`CloneError::InvalidShape`] when the element count does not
    /// match `rows * cols`.
    pub fn two_dim(elem: FieldType, rows: usize, cols: usize, elems: Vec<Value>) -> CloneResult<Self> {
        Self::new(elem, &[rows, cols], &[0, 0], elems)
    }

    /// The declared element type.
    #[must_use]
    pub fn elem(&self) -> &FieldType {
        &self.elem
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.lengths.len()
    }

    #[must_use]
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    #[must_use]
    pub fn lower_bounds(&self) -> &[i64] {
        &self.lower_bounds
    }

    /// Total element count across all dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Flat row-major element storage.
    #[must_use]
    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    /// Returns the element at a flat row-major offset.
    #[must_use]
    pub fn elem_at(&self, offset: usize) -> Option<&Value> {
        self.elems.get(offset)
    }

    /// Overwrites the element at a flat row-major offset.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds.
    pub fn set_elem(&mut self, offset: usize, value: Value) {
        self.elems[offset] = value;
    }

    /// Returns the element at a full index tuple, honoring lower bounds.
    #[must_use]
    pub fn get(&self, index: &[i64]) -> Option<&Value> {
        self.elems.get(self.offset_of(index)?)
    }

    /// Converts an index tuple to a flat row-major offset, or `None` when
    /// the tuple has the wrong rank or any coordinate is out of range.
    #[must_use]
    pub fn offset_of(&self, index: &[i64]) -> Option<usize> {
        if index.len() != self.rank() {
            return None;
        }
        let mut offset = 0_usize;
        for (dim, &coord) in index.iter().enumerate() {
            let relative = coord.checked_sub(self.lower_bounds[dim])?;
            let relative = usize::try_from(relative).ok()?;
            if relative >= self.lengths[dim] {
                return None;
            }
            offset = offset * self.lengths[dim] + relative;
        }
        Some(offset)
    }

    /// Whether every dimension starts at index 0.
    #[must_use]
    pub fn is_zero_based(&self) -> bool {
        self.lower_bounds.iter().all(|&lb| lb == 0)
    }

    /// Whether any dimension has zero length (no elements to iterate).
    #[must_use]
    pub fn has_zero_length_dim(&self) -> bool {
        self.lengths.iter().any(|&len| len == 0)
    }

    /// A new array with identical element type, rank, lengths, and lower
    /// bounds, with every element set to `fill`.
    #[must_use]
    pub fn filled_like(&self, fill: Value) -> Self {
        Self {
            elem: self.elem.clone(),
            lengths: self.lengths.clone(),
            lower_bounds: self.lower_bounds.clone(),
            elems: vec![fill; self.elems.len()],
        }
    }

    #[must_use]
    pub fn estimate_size(&self) -> usize {
        mem::size_of::<Self>() + self.elems.len() * mem::size_of::<Value>()
    }
}
