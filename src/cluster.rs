use crate::distances;
use crate::memory::*;
use crate::sparse::{SparseMatrix, SparseRow, SparseVector};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Storage of a single cluster center.
///
/// Centers start out as sparse as the samples they are averaged from, but means of many samples
/// fill up quickly. Once the share of non-zero coordinates passes a threshold the center is kept
/// dense, which makes the sample-to-center distance a single pass over the sample.
#[derive(Clone, Debug, PartialEq)]
pub enum CenterVector<T> {
    Sparse(SparseVector<T>),
    Dense(Vec<T>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterCenter<T> {
    vector: CenterVector<T>,
    count: usize,
    squared_norm: T,
    nonzeros: usize,
}

impl<T: Primitive> ClusterCenter<T> {
    /// Wrap `vector` as center of a `dim`-dimensional space, choosing dense storage when more than
    /// `dense_ratio` of the coordinates are non-zero.
    pub fn new(vector: SparseVector<T>, count: usize, dim: usize, dense_ratio: f64) -> Self {
        let squared_norm = vector.squared_norm();
        let nonzeros = vector.values().iter().filter(|v| !v.is_zero()).count();
        let dense = dim > 0 && (vector.nnz() as f64) > dense_ratio * dim as f64;
        let vector = if dense {
            CenterVector::Dense(vector.to_dense(dim))
        } else {
            CenterVector::Sparse(vector)
        };
        Self { vector, count, squared_norm, nonzeros }
    }

    pub fn vector(&self) -> &CenterVector<T> { &self.vector }
    pub fn count(&self) -> usize { self.count }
    pub fn squared_norm(&self) -> T { self.squared_norm }
    pub fn norm(&self) -> T { self.squared_norm.sqrt() }
    pub fn is_dense(&self) -> bool { matches!(self.vector, CenterVector::Dense(_)) }

    pub(crate) fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn nnz(&self) -> usize { self.nonzeros }

    pub fn to_sparse(&self) -> SparseVector<T> {
        match &self.vector {
            CenterVector::Sparse(v) => v.clone(),
            CenterVector::Dense(v) => SparseVector::from_dense(v),
        }
    }

    /// Dense copy with `dim` entries, or more if a non-zero coordinate lies beyond `dim`.
    pub fn to_dense(&self, dim: usize) -> Vec<T> {
        match &self.vector {
            CenterVector::Sparse(v) => v.to_dense(dim),
            CenterVector::Dense(v) => {
                let min_dim = v.iter().rposition(|x| !x.is_zero()).map_or(0, |p| p + 1);
                let mut d = v.clone();
                d.resize(dim.max(min_dim), T::zero());
                d
            },
        }
    }

    /// Exact squared Euclidean distance from a sample to this center.
    #[inline]
    pub fn squared_distance(&self, sample: SparseRow<'_, T>) -> T {
        distances::sample_to_center(sample, self)
    }
}

/// The k cluster centers of a clustering, in cluster index order.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSet<T> {
    centers: Vec<ClusterCenter<T>>,
    dim: usize,
}

impl<T: Primitive> ClusterSet<T> {
    pub fn new(centers: Vec<ClusterCenter<T>>, dim: usize) -> Self {
        Self { centers, dim }
    }

    /// Centers read back from a matrix, e.g. one stored with [`ClusterSet::to_matrix`]. Counts are 0.
    pub fn from_matrix(centers: &SparseMatrix<T>, dense_ratio: f64) -> Self {
        let dim = centers.dim();
        let centers = centers.rows()
            .map(|r| ClusterCenter::new(r.to_owned(), 0, dim, dense_ratio))
            .collect();
        Self { centers, dim }
    }

    pub fn len(&self) -> usize { self.centers.len() }
    pub fn is_empty(&self) -> bool { self.centers.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn centers(&self) -> &[ClusterCenter<T>] { &self.centers }
    pub fn center(&self, idx: usize) -> &ClusterCenter<T> { &self.centers[idx] }
    pub fn counts(&self) -> Vec<usize> { self.centers.iter().map(|c| c.count).collect() }
    pub fn iter(&self) -> impl Iterator<Item = &ClusterCenter<T>> { self.centers.iter() }

    /// Number of clusters owning at least one sample.
    pub fn non_empty(&self) -> usize { self.centers.iter().filter(|c| c.count > 0).count() }

    /// Centers as a sparse matrix, one row per cluster labelled with its index.
    pub fn to_matrix(&self) -> SparseMatrix<T> {
        let mut mtrx = SparseMatrix::new();
        for (i, c) in self.centers.iter().enumerate() {
            let v = c.to_sparse();
            mtrx.push_row_unchecked(i as i64, v.indices(), v.values());
        }
        mtrx.with_dim(self.dim)
    }

    /// Row-major dense copy of all centers.
    pub fn to_dense(&self) -> Vec<T> {
        self.centers.iter().flat_map(|c| c.to_dense(self.dim).into_iter().take(self.dim)).collect()
    }

    /// Drop clusters without samples. Returns the pruned set and, for every old cluster index,
    /// its new index (`None` when removed). Remaining clusters keep their relative order.
    pub fn without_empty(&self) -> (Self, Vec<Option<usize>>) {
        let mut mapping = Vec::with_capacity(self.len());
        let mut centers = Vec::with_capacity(self.len());
        for c in &self.centers {
            if c.count > 0 {
                mapping.push(Some(centers.len()));
                centers.push(c.clone());
            } else {
                mapping.push(None);
            }
        }
        (Self { centers, dim: self.dim }, mapping)
    }
}

/// Per-cluster coordinate sums and sample counts, filled by one worker for its partition
/// and merged by the driver afterwards. Sums are kept in f64.
#[derive(Clone, Debug)]
pub(crate) struct CenterAccumulator<T> {
    sums: Vec<HashMap<u32, f64>>,
    squared_norms: Vec<f64>,
    counts: Vec<usize>,
    _values: PhantomData<T>,
}

impl<T: Primitive> CenterAccumulator<T> {
    pub fn new(k: usize) -> Self {
        Self { sums: vec![HashMap::new(); k], squared_norms: vec![0.0; k], counts: vec![0; k], _values: PhantomData }
    }

    pub fn add(&mut self, cluster: usize, sample: SparseRow<'_, T>) {
        let sums = &mut self.sums[cluster];
        let mut squared_norm = 0.0;
        for (i, v) in sample.iter() {
            let v = v.as_f64();
            *sums.entry(i as u32).or_insert(0.0) += v;
            squared_norm += v * v;
        }
        self.squared_norms[cluster] += squared_norm;
        self.counts[cluster] += 1;
    }

    /// Fold another partition's sums into this one. Merging in partition order keeps the
    /// floating point result independent of scheduling.
    pub fn merge(&mut self, other: CenterAccumulator<T>) {
        for (mine, theirs) in self.sums.iter_mut().zip(other.sums) {
            for (i, v) in theirs {
                *mine.entry(i).or_insert(0.0) += v;
            }
        }
        self.squared_norms.iter_mut().zip(other.squared_norms).for_each(|(a, b)| *a += b);
        self.counts.iter_mut().zip(other.counts).for_each(|(a, b)| *a += b);
    }

    #[cfg(test)]
    pub fn counts(&self) -> &[usize] { &self.counts }

    /// Sum of squared distances of the accumulated samples to `centers`, the centers they were
    /// assigned to. Expands `|x - c|^2` per cluster into `sum |x|^2 - 2 <sum x, c> + n |c|^2`, so
    /// no per-sample distance is needed.
    pub fn wcssd(&self, centers: &ClusterSet<T>) -> f64 {
        let mut total = 0.0;
        for (c, center) in centers.iter().enumerate().filter(|&(c, _)| self.counts[c] > 0) {
            let sums = &self.sums[c];
            let term = |(cross, norm): (f64, f64), (i, v): (usize, T)| {
                let v = v.as_f64();
                (cross + sums.get(&(i as u32)).map_or(0.0, |s| s * v), norm + v * v)
            };
            // walk the center, its order is fixed
            let (cross, norm) = match center.vector() {
                CenterVector::Sparse(v) => v.as_row().iter().fold((0.0, 0.0), term),
                CenterVector::Dense(v) => v.iter().cloned().enumerate()
                    .filter(|(_, v)| !v.is_zero())
                    .fold((0.0, 0.0), term),
            };
            total += (self.squared_norms[c] - 2.0 * cross + self.counts[c] as f64 * norm).max(0.0);
        }
        total
    }

    /// Means of the accumulated clusters. Clusters without samples keep their previous center.
    pub fn into_centers(self, previous: &ClusterSet<T>, dense_ratio: f64) -> ClusterSet<T> {
        let dim = previous.dim();
        let centers = self.sums.into_iter().zip(self.counts).zip(previous.centers())
            .map(|((sums, count), prev)| {
                if count == 0 {
                    return prev.clone().with_count(0);
                }
                let count_f64 = count as f64;
                let mut pairs: Vec<(u32, T)> = sums.into_iter()
                    .map(|(i, v)| (i, T::from_f64_lossy(v / count_f64)))
                    .filter(|(_, v)| !v.is_zero())
                    .collect();
                pairs.sort_unstable_by_key(|p| p.0);
                let (indices, values) = pairs.into_iter().unzip();
                ClusterCenter::new(SparseVector::from_parts_unchecked(indices, values), count, dim, dense_ratio)
            }).collect();
        ClusterSet::new(centers, dim)
    }
}
