pub(crate) mod kmeanplusplus;
mod randomsample;
mod explicit;

use crate::api::InitMethod;
use crate::cluster::{CenterAccumulator, ClusterCenter, ClusterSet};
use crate::driver::FitData;
use crate::error::Result;
use crate::memory::*;
use crate::metrics::MetricsRecord;
use crate::params::InitParams;
use crate::sparse::SparseVector;
use rand::rngs::StdRng;

/// Starting point of the iteration: centers, the assignment the first pass starts from and the
/// initialization data that reproduces both.
pub(crate) struct Initialization<T> {
    pub clusters: ClusterSet<T>,
    pub assignments: Vec<usize>,
    pub init_params: InitParams,
}

/// Explicit parameters, when given, take precedence over the configured method.
pub(crate) fn initialize<T: Primitive>(method: InitMethod, explicit: &InitParams, data: &FitData<'_, T>, k: usize,
                                       rnd: &mut StdRng, metrics: &mut MetricsRecord) -> Result<Initialization<T>> {
    if !explicit.is_empty() {
        return explicit::calculate(data, k, explicit);
    }
    Ok(match method {
        InitMethod::Random => randomsample::calculate(data, k, rnd),
        InitMethod::KMeansPlusPlus => kmeanplusplus::calculate(data, k, rnd, metrics),
    })
}

/// Sample `i` starts in cluster `i % k`.
pub(crate) fn round_robin(no_samples: usize, k: usize) -> Vec<usize> {
    (0..no_samples).map(|i| i % k).collect()
}

/// Centers copied from the rows `seeds`, counted by `assignments`.
pub(crate) fn seeded_centers<T: Primitive>(data: &FitData<'_, T>, seeds: &[usize], assignments: &[usize]) -> ClusterSet<T> {
    let mut counts = vec![0usize; seeds.len()];
    assignments.iter().for_each(|&a| counts[a] += 1);
    let dim = data.samples.dim();
    let centers = seeds.iter().zip(counts)
        .map(|(&s, count)| ClusterCenter::new(data.samples.row(s).to_owned(), count, dim, data.dense_ratio))
        .collect();
    ClusterSet::new(centers, dim)
}

/// Means of the samples per cluster. Clusters no sample is assigned to start at the origin.
pub(crate) fn mean_centers<T: Primitive>(data: &FitData<'_, T>, k: usize, assignments: &[usize]) -> ClusterSet<T> {
    let dim = data.samples.dim();
    let origin = ClusterSet::new(
        (0..k).map(|_| ClusterCenter::new(SparseVector::default(), 0, dim, data.dense_ratio)).collect(), dim);
    let mut acc = CenterAccumulator::new(k);
    data.samples.rows().zip(assignments.iter()).for_each(|(row, &a)| acc.add(a, row));
    acc.into_centers(&origin, data.dense_ratio)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing;
    use rand::SeedableRng;

    #[test]
    fn explicit_parameters_win() {
        let samples = testing::four_points::<f64>();
        let data = FitData::new(&samples, 0.1);
        let mut metrics = MetricsRecord::new();
        let mut rnd = StdRng::seed_from_u64(3);
        let init = initialize(InitMethod::KMeansPlusPlus, &InitParams::from_samples(vec![0, 2]), &data, 2, &mut rnd, &mut metrics).unwrap();
        assert_eq!(init.clusters.to_dense(), vec![0.0, 0.0, 10.0, 10.0]);
        assert_eq!(init.assignments, vec![0, 1, 0, 1]);
        assert!(!metrics.contains("kmeans++"));
    }

    #[test]
    fn seeded_centers_count_assignments() {
        let samples = testing::four_points::<f32>();
        let data = FitData::new(&samples, 0.1);
        let clusters = seeded_centers(&data, &[3, 1], &[1, 1, 0, 0]);
        assert_eq!(clusters.counts(), vec![2, 2]);
        assert_eq!(clusters.to_dense(), vec![10.0, 11.0, 0.0, 1.0]);
        assert_eq!(round_robin(5, 2), vec![0, 1, 0, 1, 0]);
    }
}
