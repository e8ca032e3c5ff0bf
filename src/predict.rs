use crate::cluster::ClusterSet;
use crate::distances::bounds::{cauchy_bound, is_better, PruneMargin};
use crate::memory::*;
use crate::sparse::{SparseMatrix, SparseRow};
use rayon::prelude::*;
use std::sync::Arc;

/// Nearest center of every sample of a matrix, and the squared distance to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction<T> {
    pub assignments: Vec<usize>,
    pub distances: Vec<T>,
}

/// Assigns samples to the nearest center of a fixed set of centers.
///
/// The engine holds its own read-only snapshot of the centers. A model that gets refitted builds a
/// new engine; engines handed out before keep answering for the centers they were built from.
#[derive(Clone, Debug)]
pub struct PredictEngine<T> {
    clusters: Arc<ClusterSet<T>>,
    norms: Vec<T>,
    max_norm: T,
}

impl<T: Primitive> PredictEngine<T> {
    pub fn new(clusters: Arc<ClusterSet<T>>) -> Self {
        let norms: Vec<T> = clusters.iter().map(|c| c.norm()).collect();
        let max_norm = norms.iter().cloned().fold(T::zero(), T::max);
        Self { clusters, norms, max_norm }
    }

    pub fn clusters(&self) -> &ClusterSet<T> { &self.clusters }

    /// Assign all rows of `samples`, in parallel.
    pub fn assign(&self, samples: &SparseMatrix<T>) -> Prediction<T> {
        let (assignments, distances) = (0..samples.no_rows()).into_par_iter()
            .map(|i| self.assign_one(samples.row(i)))
            .unzip();
        Prediction { assignments, distances }
    }

    /// Nearest center of `sample` and the squared distance to it; ties go to the lower index.
    ///
    /// Samples may have more dimensions than the centers, the extra coordinates count as if the
    /// centers were zero there. Without any center, the result is `(usize::MAX, inf)`.
    pub fn assign_one(&self, sample: SparseRow<'_, T>) -> (usize, T) {
        let norm = sample.squared_norm().sqrt();
        let margin = PruneMargin::new(norm + self.max_norm);
        let (mut best, mut best_dist) = (usize::MAX, T::infinity());
        for (c, center) in self.clusters.iter().enumerate() {
            if margin.prunes(cauchy_bound(norm, self.norms[c]), best_dist.sqrt()) {
                continue;
            }
            let d = center.squared_distance(sample);
            if is_better(d, c, best_dist, best) {
                best = c;
                best_dist = d;
            }
        }
        (best, best_dist)
    }
}
