use crate::error::{KMeansError, Result};
use crate::memory::*;

/// Owned sparse vector with strictly increasing column indices.
///
/// The dimension is not stored; it is implied by the matrix or cluster set the vector belongs to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseVector<T> {
    indices: Vec<u32>,
    values: Vec<T>,
}

/// Borrowed view onto a sparse vector, e.g. one row of a [`crate::SparseMatrix`].
#[derive(Clone, Copy, Debug)]
pub struct SparseRow<'a, T> {
    indices: &'a [u32],
    values: &'a [T],
}

pub(crate) fn check_indices(indices: &[u32]) -> std::result::Result<(), String> {
    for w in indices.windows(2) {
        if w[1] <= w[0] {
            return Err(format!("index {} is not greater than preceding index {}", w[1], w[0]));
        }
    }
    Ok(())
}

/// NaN and infinite coordinates have no place in a Euclidean space.
pub(crate) fn check_values<T: Primitive>(values: &[T]) -> std::result::Result<(), String> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(pos) => Err(format!("value {} at position {} is not finite", values[pos], pos)),
        None => Ok(()),
    }
}

impl<T: Primitive> SparseVector<T> {
    /// Create a sparse vector from parallel index and value lists (0-based indices).
    pub fn new(indices: Vec<u32>, values: Vec<T>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(KMeansError::InvalidVector(format!(
                "{} indices but {} values", indices.len(), values.len())));
        }
        check_indices(&indices).map_err(KMeansError::InvalidVector)?;
        check_values(&values).map_err(KMeansError::InvalidVector)?;
        Ok(Self { indices, values })
    }

    pub(crate) fn from_parts_unchecked(indices: Vec<u32>, values: Vec<T>) -> Self {
        debug_assert_eq!(indices.len(), values.len());
        debug_assert!(check_indices(&indices).is_ok());
        Self { indices, values }
    }

    /// Build from `(index, value)` pairs in any order. Duplicate indices are rejected.
    pub fn from_pairs(mut pairs: Vec<(u32, T)>) -> Result<Self> {
        pairs.sort_unstable_by_key(|&(i, _)| i);
        let (indices, values) = pairs.into_iter().unzip();
        Self::new(indices, values)
    }

    /// Sparse copy of a dense vector; zeros are dropped.
    pub fn from_dense(dense: &[T]) -> Self {
        let (indices, values) = dense.iter().cloned().enumerate()
            .filter(|(_, v)| !v.is_zero())
            .map(|(i, v)| (i as u32, v))
            .unzip();
        Self { indices, values }
    }

    pub fn as_row(&self) -> SparseRow<'_, T> {
        SparseRow { indices: &self.indices, values: &self.values }
    }

    pub fn indices(&self) -> &[u32] { &self.indices }
    pub fn values(&self) -> &[T] { &self.values }
    pub fn nnz(&self) -> usize { self.indices.len() }

    /// Smallest dimension able to hold this vector.
    pub fn min_dim(&self) -> usize {
        self.indices.last().map(|&i| i as usize + 1).unwrap_or(0)
    }

    pub fn scale(&mut self, factor: T) {
        self.values.iter_mut().for_each(|v| *v = *v * factor);
    }

    pub fn squared_norm(&self) -> T { self.as_row().squared_norm() }

    pub fn to_dense(&self, dim: usize) -> Vec<T> { self.as_row().to_dense(dim) }
}

impl<'a, T: Primitive> SparseRow<'a, T> {
    pub(crate) fn new_unchecked(indices: &'a [u32], values: &'a [T]) -> Self {
        Self { indices, values }
    }

    pub fn indices(&self) -> &'a [u32] { self.indices }
    pub fn values(&self) -> &'a [T] { self.values }
    pub fn nnz(&self) -> usize { self.indices.len() }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + 'a {
        self.indices.iter().map(|&i| i as usize).zip(self.values.iter().cloned())
    }

    pub fn min_dim(&self) -> usize {
        self.indices.last().map(|&i| i as usize + 1).unwrap_or(0)
    }

    pub fn to_owned(&self) -> SparseVector<T> {
        SparseVector { indices: self.indices.to_vec(), values: self.values.to_vec() }
    }

    pub fn to_dense(&self, dim: usize) -> Vec<T> {
        let mut dense = vec![T::zero(); dim.max(self.min_dim())];
        self.iter().for_each(|(i, v)| dense[i] = v);
        dense
    }

    pub fn squared_norm(&self) -> T {
        self.values.iter().map(|&v| v * v).sum()
    }

    pub fn dot(&self, other: SparseRow<'_, T>) -> T {
        let (mut a, mut b) = (0, 0);
        let mut sum = T::zero();
        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }

    pub fn dot_dense(&self, dense: &[T]) -> T {
        self.iter()
            .filter(|&(i, _)| i < dense.len())
            .map(|(i, v)| v * dense[i])
            .sum()
    }

    /// Exact squared Euclidean distance, walking both index lists once.
    pub fn squared_distance(&self, other: SparseRow<'_, T>) -> T {
        let (mut a, mut b) = (0, 0);
        let mut sum = T::zero();
        while a < self.indices.len() || b < other.indices.len() {
            let d = if b == other.indices.len() || (a < self.indices.len() && self.indices[a] < other.indices[b]) {
                a += 1;
                self.values[a - 1]
            } else if a == self.indices.len() || other.indices[b] < self.indices[a] {
                b += 1;
                other.values[b - 1]
            } else {
                a += 1;
                b += 1;
                self.values[a - 1] - other.values[b - 1]
            };
            sum += d * d;
        }
        sum
    }

    /// Squared Euclidean distance to a dense vector whose squared norm is already known.
    /// Coordinates beyond the dense vector's length count as zero.
    pub fn squared_distance_dense(&self, dense: &[T], dense_squared_norm: T) -> T {
        let mut sum = dense_squared_norm;
        for (i, v) in self.iter() {
            let c = if i < dense.len() { dense[i] } else { T::zero() };
            let d = v - c;
            sum += d * d - c * c;
        }
        sum.max(T::zero())
    }
}
