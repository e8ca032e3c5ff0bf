use crate::cluster::{CenterVector, ClusterSet};
use crate::driver::FitData;
use crate::memory::*;
use crate::metrics::MetricsRecord;
use crate::params::additional;
use crate::sparse::blockvector::{block_vector_bound, BlockLayout};
use crate::sparse::SparseVector;
use rayon::prelude::*;
use std::borrow::Cow;

/// Cheap lower bounds on sample-to-center distances from block vectors.
///
/// Sample block vectors are either built once up front, or built when a sample first needs one
/// in a pass and dropped afterwards (`on_demand`), trading time for memory.
pub(crate) struct BlockVectorScreen<T> {
    layout: BlockLayout,
    samples: Option<Vec<SparseVector<T>>>,
    clusters: Vec<SparseVector<T>>,
}

impl<T: Primitive> BlockVectorScreen<T> {
    pub fn new(data: &FitData<'_, T>, on_demand: bool, metrics: &mut MetricsRecord) -> Self {
        let (key, default) = additional::BV_ANNZ;
        let desired_annz = metrics.f64_or_default("additional_params", key, default);
        let search = BlockLayout::search(data.samples, desired_annz);
        log::info!("block vectors: {} blocks of {} keys, {} non-zeros per sample block vector (samples: {})",
                   search.layout.no_blocks, search.layout.keys_per_block, search.annz, search.annz_samples);
        metrics.record_mut("block_vector_data")
            .set("dim", search.layout.no_blocks)
            .set("annz", search.annz)
            .set("annz_samples", search.annz_samples);

        let samples = if on_demand {
            None
        } else {
            let layout = search.layout;
            Some((0..data.no_samples()).into_par_iter()
                .map(|i| layout.block_vector(data.samples.row(i)))
                .collect())
        };
        Self { layout: search.layout, samples, clusters: Vec::new() }
    }

    /// Rebuild the center block vectors for the coming pass.
    pub fn prepare(&mut self, clusters: &ClusterSet<T>) {
        let layout = self.layout;
        self.clusters = clusters.centers().par_iter()
            .map(|c| match c.vector() {
                CenterVector::Sparse(v) => layout.block_vector(v.as_row()),
                CenterVector::Dense(v) => layout.block_vector_dense(v),
            })
            .collect();
    }

    pub fn sample_vector<'s>(&'s self, data: &FitData<'_, T>, idx: usize) -> Cow<'s, SparseVector<T>> {
        match &self.samples {
            Some(precomputed) => Cow::Borrowed(&precomputed[idx]),
            None => Cow::Owned(self.layout.block_vector(data.samples.row(idx))),
        }
    }

    /// Lower bound of the squared distance between a sample and center `cluster`.
    #[inline]
    pub fn bound(&self, sample_sq_norm: T, sample_bv: &SparseVector<T>, cluster: usize, center_sq_norm: T) -> T {
        block_vector_bound(sample_sq_norm, sample_bv.as_row(), center_sq_norm, self.clusters[cluster].as_row())
    }
}
