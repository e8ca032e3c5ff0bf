use crate::distances::bounds::{cauchy_bound, PruneMargin};
use crate::driver::FitData;
use crate::inits::{mean_centers, Initialization};
use crate::memory::*;
use crate::metrics::{MetricValue, MetricsRecord};
use crate::params::InitParams;
use crate::sparse::SparseMatrix;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rayon::prelude::*;

/// Outcome of a k-means++ seeding.
///
/// `nearest[i]` is the position in `seeds` of the seed closest to sample `i`. On ties the earlier
/// seed wins.
pub(crate) struct Seeding {
    pub seeds: Vec<usize>,
    pub nearest: Vec<usize>,
    pub full_distance_calcs: u64,
    pub pruned_calcs: u64,
}

/// K-Means++ seeding
///
/// ## Description
/// The first seed is drawn uniformly. Every following seed is drawn with a probability proportional
/// to the squared distance of a sample to its nearest seed so far, which favours samples far away
/// from all chosen seeds. After each draw the nearest-seed distances are updated; samples whose
/// norm differs from the new seed's norm by more than their current distance are skipped.
pub(crate) fn choose_seeds<T: Primitive>(samples: &SparseMatrix<T>, norms: &[T], margin: PruneMargin<T>,
                                         k: usize, rnd: &mut StdRng) -> Seeding {
    let n = samples.no_rows();
    let first = rnd.gen_range(0..n);
    let first_row = samples.row(first);
    let mut distances: Vec<T> = (0..n).into_par_iter()
        .map(|i| samples.row(i).squared_distance(first_row))
        .collect();
    let mut nearest = vec![0usize; n];
    let mut seeds = Vec::with_capacity(k);
    seeds.push(first);
    let (mut full_distance_calcs, mut pruned_calcs) = (n as u64, 0u64);

    for c in 1..k {
        let chosen = match WeightedIndex::new(distances.iter().map(|d| d.as_f64())) {
            Ok(weights) => weights.sample(rnd),
            // every sample coincides with one of the seeds
            Err(_) => (0..n).filter(|i| !seeds.contains(i)).choose(rnd).unwrap_or(first),
        };
        seeds.push(chosen);

        let (row, norm) = (samples.row(chosen), norms[chosen]);
        let (full, pruned) = distances.par_iter_mut().zip(nearest.par_iter_mut()).enumerate()
            .map(|(i, (dist, near))| {
                if margin.prunes(cauchy_bound(norms[i], norm), dist.sqrt()) {
                    return (0u64, 1u64);
                }
                let d = samples.row(i).squared_distance(row);
                if d < *dist {
                    *dist = d;
                    *near = c;
                }
                (1, 0)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        full_distance_calcs += full;
        pruned_calcs += pruned;
    }
    Seeding { seeds, nearest, full_distance_calcs, pruned_calcs }
}

/// K-Means++ initialization.
///
/// The initial centers are the means of the nearest-seed assignment, which is also where the
/// first pass starts from. The seeds themselves are only reported in the run metrics; the
/// assignment alone reproduces the initialization.
pub(crate) fn calculate<T: Primitive>(data: &FitData<'_, T>, k: usize, rnd: &mut StdRng, metrics: &mut MetricsRecord) -> Initialization<T> {
    let seeding = choose_seeds(data.samples, &data.norms, data.margin, k, rnd);
    log::debug!("kmeans++ chose {} seeds with {} distance calculations ({} pruned)",
                k, seeding.full_distance_calcs, seeding.pruned_calcs);
    metrics.record_mut("kmeans++")
        .set("full_distance_calcs", seeding.full_distance_calcs)
        .set("pruned_calcs", seeding.pruned_calcs)
        .set("initial_cluster_samples", MetricValue::Sequence(seeding.seeds.iter().map(|&s| s.into()).collect()));

    let clusters = mean_centers(data, k, &seeding.nearest);
    Initialization {
        clusters,
        init_params: InitParams::from_assignments(seeding.nearest.clone()),
        assignments: seeding.nearest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing;
    use crate::sparse::SparseVector;

    #[test] fn nearest_seed_assignment_f32() { nearest_seed_assignment::<f32>(); }
    #[test] fn nearest_seed_assignment_f64() { nearest_seed_assignment::<f64>(); }

    fn nearest_seed_assignment<T: Primitive>() {
        let samples = testing::topic_samples::<T>(5, 300, 400, 6, 15);
        let data = FitData::new(&samples, 0.1);
        let k = 12;
        let mut metrics = MetricsRecord::new();
        let init = calculate(&data, k, &mut StdRng::seed_from_u64(1337), &mut metrics);

        let section = metrics.record("kmeans++").unwrap();
        let seeds: Vec<usize> = section.sequence_i64("initial_cluster_samples").iter().map(|&s| s as usize).collect();
        assert_eq!(init.init_params, InitParams::from_assignments(init.assignments.clone()));
        let mut distinct = seeds.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), k);

        for (i, row) in samples.rows().enumerate() {
            let dists: Vec<T> = seeds.iter().map(|&s| row.squared_distance(samples.row(s))).collect();
            let best = dists.iter().cloned().fold(T::infinity(), T::min);
            assert_eq!(dists[init.assignments[i]], best, "sample {} not assigned to its nearest seed", i);
        }
        assert_eq!(init.clusters.counts().iter().sum::<usize>(), 300);
        assert_eq!(init.clusters.center(init.assignments[0]).count(),
                   init.assignments.iter().filter(|&&a| a == init.assignments[0]).count());

        let full = section.get_i64("full_distance_calcs").unwrap();
        let pruned = section.get_i64("pruned_calcs").unwrap();
        assert_eq!(full + pruned, (300 * k) as i64);
    }

    #[test]
    fn duplicate_samples() {
        let rows = vec![SparseVector::new(vec![3], vec![1.0f64]).unwrap(); 5];
        let samples = SparseMatrix::from_vector_list(&rows);
        let data = FitData::new(&samples, 0.1);
        let seeding = choose_seeds(&samples, &data.norms, data.margin, 3, &mut StdRng::seed_from_u64(2));
        let mut seeds = seeding.seeds.clone();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), 3);
        assert!(seeding.nearest.iter().all(|&n| n == 0));
    }
}
