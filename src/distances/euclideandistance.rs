use crate::cluster::{CenterVector, ClusterCenter};
use crate::memory::*;
use crate::sparse::SparseRow;

/// Exact squared Euclidean distance from a sparse sample to a center in either storage.
#[inline(always)]
pub(crate) fn sample_to_center<T: Primitive>(sample: SparseRow<'_, T>, center: &ClusterCenter<T>) -> T {
    match center.vector() {
        CenterVector::Sparse(c) => sample.squared_distance(c.as_row()),
        CenterVector::Dense(c) => {
            let (mut local, mut covered_sq, mut covered) = (T::zero(), T::zero(), 0);
            for (i, v) in sample.iter() {
                let x = if i < c.len() { c[i] } else { T::zero() };
                let d = v - x;
                local += d * d;
                if !x.is_zero() {
                    covered += 1;
                    covered_sq += x * x;
                }
            }
            // center coordinates the sample does not touch
            if covered == center.nnz() {
                local
            } else {
                local + (center.squared_norm() - covered_sq).max(T::zero())
            }
        },
    }
}

/// Exact squared Euclidean distance between two centers.
pub(crate) fn center_to_center<T: Primitive>(a: &ClusterCenter<T>, b: &ClusterCenter<T>) -> T {
    match (a.vector(), b.vector()) {
        (CenterVector::Sparse(a), CenterVector::Sparse(b)) => a.as_row().squared_distance(b.as_row()),
        (CenterVector::Sparse(s), CenterVector::Dense(d)) => s.as_row().squared_distance_dense(d, b.squared_norm()),
        (CenterVector::Dense(d), CenterVector::Sparse(s)) => s.as_row().squared_distance_dense(d, a.squared_norm()),
        (CenterVector::Dense(a), CenterVector::Dense(b)) => {
            let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
            long.iter().enumerate()
                .map(|(i, &x)| {
                    let d = x - short.get(i).cloned().unwrap_or_else(T::zero);
                    d * d
                })
                .sum()
        },
    }
}
