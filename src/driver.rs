//! The fit loop.
//!
//! A fit initializes the centers, then alternates two phases until it stops:
//! - **assign**: the samples are split into fixed partitions that workers process in parallel. Each
//!   worker finds the nearest center for its samples and sums them up per cluster into its own
//!   accumulator.
//! - **update**: the accumulators are merged in partition order and turned into the new centers.
//!
//! The fit stops when a pass changes no assignment, when the objective (WCSSD) stops improving
//! according to the configured [`crate::AbortStrategy`], when the iteration limit is reached, or
//! when the caller cancels it.

use crate::api::{FitResult, FitStatus, IterationStatus, KMeansConfig};
use crate::cluster::{CenterAccumulator, ClusterSet};
use crate::distances::bounds::PruneMargin;
use crate::error::{KMeansError, Result};
use crate::helpers;
use crate::inits::{self, Initialization};
use crate::memory::*;
use crate::metrics::MetricsRecord;
use crate::params::additional;
use crate::sparse::SparseMatrix;
use crate::variants::{AlgorithmVariant, Assignment, PassCounters, SampleBounds};
use rand::prelude::*;
use rayon::prelude::*;
use std::time::Instant;

const ITERATION_SERIES: [&str; 11] = [
    "iteration_wcssd", "iteration_changes", "iteration_remaining_clusters",
    "iteration_full_distance_calcs", "iteration_bv_calcs", "iteration_bv_calcs_success",
    "iteration_saved_calcs", "iteration_durations_calcs", "iteration_durations_update_clusters",
    "iteration_durations", "iteration_clusters_nnz",
];

/// The samples of a fit plus everything derived from them once.
pub(crate) struct FitData<'a, T> {
    pub samples: &'a SparseMatrix<T>,
    pub squared_norms: Vec<T>,
    pub norms: Vec<T>,
    /// Pruning slack for this dataset. Every center lies in the convex hull of the samples, so
    /// no distance of the fit exceeds twice the largest sample norm.
    pub margin: PruneMargin<T>,
    pub dense_ratio: f64,
}

impl<'a, T: Primitive> FitData<'a, T> {
    pub fn new(samples: &'a SparseMatrix<T>, dense_ratio: f64) -> Self {
        let squared_norms = samples.squared_norms();
        let norms: Vec<T> = squared_norms.par_iter().map(|v| v.sqrt()).collect();
        let max_norm = norms.iter().cloned().fold(T::zero(), T::max);
        Self { samples, squared_norms, norms, margin: PruneMargin::new(max_norm + max_norm), dense_ratio }
    }

    pub fn no_samples(&self) -> usize { self.samples.no_rows() }
}

fn millis(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn sum_f64<T: Primitive>(values: impl Iterator<Item = T>) -> T {
    T::from_f64_lossy(values.map(|v| v.as_f64()).sum())
}

/// Cluster `samples` as configured by `config`.
///
/// All parallel work runs on a dedicated thread pool with the configured number of workers.
pub(crate) fn fit<T: Primitive>(samples: &SparseMatrix<T>, config: &KMeansConfig<'_, T>) -> Result<FitResult<T>> {
    let (n, k) = (samples.no_rows(), config.k);
    if k > n {
        return Err(KMeansError::config(format!(
            "{} clusters requested, but the dataset has only {} samples", k, n)));
    }
    samples.check_finite()?;
    let no_cores = match config.no_cores {
        0 => rayon::current_num_threads(),
        cores => cores,
    };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(no_cores).build()
        .map_err(|e| KMeansError::config(format!("unable to start {} worker threads: {}", no_cores, e)))?;
    pool.install(|| IterationDriver::new(samples, config, no_cores).run())
}

/// Result of one worker's partition during an assign pass.
struct PartitionOutcome<T> {
    assignments: Vec<Assignment<T>>,
    accumulator: CenterAccumulator<T>,
    changes: usize,
    counters: PassCounters,
}

/// Merged result of a whole assign pass.
struct PassOutcome<T> {
    assignments: Vec<Assignment<T>>,
    accumulator: CenterAccumulator<T>,
    changes: usize,
    counters: PassCounters,
    wcssd: T,
}

struct IterationDriver<'a, 'c, T: Primitive> {
    config: &'a KMeansConfig<'c, T>,
    data: FitData<'a, T>,
    metrics: MetricsRecord,
    seed: u64,
    no_cores: usize,
    partition_size: usize,
}

impl<'a, 'c, T: Primitive> IterationDriver<'a, 'c, T> {
    fn new(samples: &'a SparseMatrix<T>, config: &'a KMeansConfig<'c, T>, no_cores: usize) -> Self {
        // generated seeds stay within i64, so the metrics record them as integers
        let seed = config.seed.unwrap_or_else(|| rand::random::<u64>() >> 1);
        let mut metrics = MetricsRecord::new();
        metrics.record_mut("general_params")
            .set("no_clusters", config.k)
            .set("algorithm", config.algorithm.name())
            .set("seed", seed)
            .set("remove_empty", config.remove_empty)
            .set("iteration_limit", config.iteration_limit)
            .set("tol", config.abort_strategy.tolerance().as_f64())
            .set("tol_mode", config.abort_strategy.name())
            .set("init", if config.init_params.is_empty() { config.init.name() } else { "explicit" })
            .set("no_cores_used", no_cores);
        let params = metrics.record_mut("additional_params");
        for (key, value) in &config.additional_params {
            params.set(key, *value);
        }
        let info = metrics.record_mut("info");
        for (key, value) in &config.info {
            info.set(key, value.as_str());
        }
        metrics.set("input_samples", samples.no_rows())
            .set("input_dimension", samples.dim())
            .set("input_annz", samples.average_nnz());

        let (key, default) = additional::DENSE_CENTER_RATIO;
        let dense_ratio = metrics.f64_or_default("additional_params", key, default);
        let (key, default) = additional::PARTITION_SIZE;
        let partition_size = match metrics.f64_or_default("additional_params", key, default) as usize {
            0 => helpers::div_roundup(samples.no_rows(), 4 * no_cores).max(1),
            size => size,
        };

        Self { config, data: FitData::new(samples, dense_ratio), metrics, seed, no_cores, partition_size }
    }

    fn run(mut self) -> Result<FitResult<T>> {
        let config = self.config;
        let (n, k) = (self.data.no_samples(), config.k);
        log::info!("clustering {} samples ({} dimensions, {} non-zeros on average) into {} clusters using {} on {} cores, seed {}",
                   n, self.data.samples.dim(), self.data.samples.average_nnz(), k, config.algorithm, self.no_cores, self.seed);
        let started = Instant::now();

        let mut rnd = StdRng::seed_from_u64(self.seed);
        let Initialization { mut clusters, assignments, init_params } =
            inits::initialize(config.init, &config.init_params, &self.data, k, &mut rnd, &mut self.metrics)?;
        let initial_wcssd = self.objective(&clusters, &assignments);
        let mut assignments = self.measure(&clusters, &assignments);
        self.metrics.set("duration_init", millis(started))
            .set("initial_wcssd", initial_wcssd.as_f64());
        log::info!("initialization done after {:.1} ms, wcssd {:e}", millis(started), initial_wcssd);
        if clusters.non_empty() < k {
            log::warn!("{} of {} clusters start without samples", k - clusters.non_empty(), k);
        }
        (config.init_done)(&clusters);

        for key in ITERATION_SERIES.iter() {
            self.metrics.ensure_sequence(key);
        }
        let mut variant = AlgorithmVariant::new(config.algorithm, &self.data, k, &mut self.metrics);
        let mut bounds = variant.initial_bounds(n);
        let mut abort = config.abort_strategy.create_logic(initial_wcssd);
        let mut current_wcssd = initial_wcssd;
        let mut status = FitStatus::StoppedByLimit;
        let mut iterations = 0;

        for iteration in 1..=config.iteration_limit {
            if config.cancellation.is_cancelled() {
                status = FitStatus::Cancelled;
                break;
            }
            let iteration_start = Instant::now();
            variant.prepare(&self.data, &clusters, iteration, &mut self.metrics);
            let outcome = match self.assign_pass(&variant, &clusters, &assignments, &mut bounds) {
                Some(outcome) => outcome,
                None => {
                    status = FitStatus::Cancelled;
                    break;
                },
            };
            let duration_calcs = millis(iteration_start);

            let update_start = Instant::now();
            let updated = outcome.accumulator.into_centers(&clusters, self.data.dense_ratio);
            variant.update_bounds(&clusters, &updated);
            let duration_update = millis(update_start);

            let previous_wcssd = current_wcssd;
            clusters = updated;
            assignments = outcome.assignments;
            current_wcssd = outcome.wcssd;
            iterations = iteration;
            let remaining = clusters.non_empty();
            let counters = outcome.counters;
            self.metrics
                .push("iteration_wcssd", current_wcssd.as_f64())
                .push("iteration_changes", outcome.changes)
                .push("iteration_remaining_clusters", remaining)
                .push("iteration_full_distance_calcs", counters.full_distance_calcs)
                .push("iteration_bv_calcs", counters.bv_calcs)
                .push("iteration_bv_calcs_success", counters.bv_calcs_success)
                .push("iteration_saved_calcs", counters.saved_calcs)
                .push("iteration_durations_calcs", duration_calcs)
                .push("iteration_durations_update_clusters", duration_update)
                .push("iteration_durations", millis(iteration_start))
                .push("iteration_clusters_nnz", clusters.iter().map(|c| c.nnz()).sum::<usize>());
            log::debug!("iteration {}: wcssd {:e}, {} changes, {} clusters, {} distance calculations",
                        iteration, current_wcssd, outcome.changes, remaining, counters.full_distance_calcs);

            (config.iteration_done)(&IterationStatus {
                iteration,
                wcssd: current_wcssd,
                previous_wcssd,
                changes: outcome.changes,
                remaining_clusters: remaining,
                clusters: &clusters,
            });

            if outcome.changes == 0 || !abort.next(current_wcssd) {
                status = FitStatus::Converged;
                break;
            }
        }
        self.metrics.set("no_iterations", iterations)
            .set("duration_kmeans", millis(started));

        // distances to the centers the last update produced
        let mut assigned: Vec<usize> = assignments.iter().map(|a| a.cluster).collect();
        let distances: Vec<T> = self.measure(&clusters, &assigned).into_iter().map(|a| a.distance).collect();
        let final_wcssd = sum_f64(distances.iter().cloned());

        if config.remove_empty {
            let (kept, mapping) = clusters.without_empty();
            if kept.len() < clusters.len() {
                log::warn!("removing {} empty clusters", clusters.len() - kept.len());
            }
            for a in assigned.iter_mut() {
                if let Some(c) = mapping[*a] {
                    *a = c;
                }
            }
            clusters = kept;
        }
        self.metrics.set("duration_kmeans_with_remove_empty", millis(started))
            .set("no_clusters_remaining", clusters.non_empty())
            .set("status", status.name());
        log::info!("{} after {} iterations and {:.1} ms, wcssd {:e}, {} clusters remaining",
                   status, iterations, millis(started), final_wcssd, clusters.non_empty());

        Ok(FitResult {
            clusters,
            assignments: assigned,
            distances,
            wcssd: final_wcssd,
            iterations,
            status,
            metrics: self.metrics,
            init_params,
        })
    }

    /// Exact distances of every sample to its assigned center.
    fn measure(&self, clusters: &ClusterSet<T>, assigned: &[usize]) -> Vec<Assignment<T>> {
        let samples = self.data.samples;
        assigned.par_iter().enumerate()
            .with_min_len(self.partition_size)
            .map(|(i, &c)| Assignment { cluster: c, distance: clusters.center(c).squared_distance(samples.row(i)) })
            .collect()
    }

    /// WCSSD of `assigned` against `clusters`, evaluated from per-cluster sums the same way an
    /// assign pass evaluates it.
    fn objective(&self, clusters: &ClusterSet<T>, assigned: &[usize]) -> T {
        let (samples, size) = (self.data.samples, self.partition_size);
        let partitions: Vec<CenterAccumulator<T>> = assigned.par_chunks(size).enumerate()
            .map(|(p, chunk)| {
                let mut acc = CenterAccumulator::new(clusters.len());
                chunk.iter().enumerate().for_each(|(j, &c)| acc.add(c, samples.row(p * size + j)));
                acc
            })
            .collect();
        let mut merged = CenterAccumulator::new(clusters.len());
        partitions.into_iter().for_each(|acc| merged.merge(acc));
        T::from_f64_lossy(merged.wcssd(clusters))
    }

    /// One assign pass over all partitions. Returns `None` if the fit got cancelled meanwhile.
    fn assign_pass(&self, variant: &AlgorithmVariant<T>, clusters: &ClusterSet<T>, previous: &[Assignment<T>],
                   bounds: &mut [SampleBounds<T>]) -> Option<PassOutcome<T>> {
        let (k, size) = (clusters.len(), self.partition_size);
        let pass = variant.pass(&self.data, clusters);
        let cancellation = &self.config.cancellation;

        let partitions: Vec<Option<PartitionOutcome<T>>> = previous.par_chunks(size)
            .zip(bounds.par_chunks_mut(size))
            .enumerate()
            .map(|(p, (previous, bounds))| {
                if cancellation.is_cancelled() {
                    return None;
                }
                let mut outcome = PartitionOutcome {
                    assignments: Vec::with_capacity(previous.len()),
                    accumulator: CenterAccumulator::new(k),
                    changes: 0,
                    counters: PassCounters::default(),
                };
                for (j, (&prev, bounds)) in previous.iter().zip(bounds.iter_mut()).enumerate() {
                    let idx = p * size + j;
                    let next = variant.assign(&pass, idx, prev, bounds, &mut outcome.counters);
                    if next.cluster != prev.cluster {
                        outcome.changes += 1;
                    }
                    outcome.accumulator.add(next.cluster, self.data.samples.row(idx));
                    outcome.assignments.push(next);
                }
                Some(outcome)
            })
            .collect();

        let mut merged = PassOutcome {
            assignments: Vec::with_capacity(previous.len()),
            accumulator: CenterAccumulator::new(k),
            changes: 0,
            counters: PassCounters::default(),
            wcssd: T::zero(),
        };
        for partition in partitions {
            let partition = partition?;
            merged.assignments.extend(partition.assignments);
            merged.accumulator.merge(partition.accumulator);
            merged.changes += partition.changes;
            merged.counters.merge(&partition.counters);
        }
        // assignments of bound-based variants may carry upper bounds instead of exact distances
        merged.wcssd = T::from_f64_lossy(merged.accumulator.wcssd(clusters));
        Some(merged)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InitMethod;
    use crate::cancellation::CancellationToken;
    use crate::helpers::testing;
    use crate::params::InitParams;
    use crate::sparse::SparseVector;
    use crate::variants::Algorithm;

    fn four_point_config<'a, T: Primitive>(algorithm: Algorithm) -> KMeansConfig<'a, T> {
        KMeansConfig::build()
            .algorithm(algorithm)
            .no_clusters(2)
            .seed(3)
            .no_cores(2)
            .initialization_params(InitParams::from_samples(vec![0, 2]))
            .build().unwrap()
    }

    #[test] fn four_points_f32() { four_points::<f32>(); }
    #[test] fn four_points_f64() { four_points::<f64>(); }

    fn four_points<T: Primitive>() {
        let samples = testing::four_points::<T>();
        for &algorithm in Algorithm::ALL.iter() {
            let result = fit(&samples, &four_point_config::<T>(algorithm)).unwrap();
            assert_eq!(result.metrics.sequence_i64("iteration_changes"), vec![2, 0], "{}", algorithm);
            assert_eq!(result.assignments, vec![0, 0, 1, 1]);
            assert_eq!(result.status, FitStatus::Converged);
            assert_eq!(result.iterations, 2);
            let expected = [0.0, 0.5, 10.0, 10.5];
            for (&c, &e) in result.clusters.to_dense().iter().zip(expected.iter()) {
                assert_approx_eq!(c, T::from_f64_lossy(e), T::from_f64_lossy(1e-5));
            }
            for &d in result.distances.iter() {
                assert_approx_eq!(d, T::from_f64_lossy(0.25), T::from_f64_lossy(1e-5));
            }
            assert_approx_eq!(result.wcssd, T::from_f64_lossy(1.0), T::from_f64_lossy(1e-4));
            assert_eq!(result.metrics.get_f64("initial_wcssd"), Some(382.0));
            assert_eq!(result.metrics.sequence_f64("iteration_wcssd"), vec![2.0, 1.0], "{}", algorithm);

            // in the second pass every center moved by 0.5, far less than half the gap between them
            let calcs = result.metrics.sequence_i64("iteration_full_distance_calcs");
            match algorithm {
                Algorithm::Kmeans => assert_eq!(calcs, vec![8, 8]),
                Algorithm::Elkan | Algorithm::BvElkan | Algorithm::BvElkanOnDemand => assert_eq!(calcs, vec![2, 0], "{}", algorithm),
                Algorithm::Yinyang | Algorithm::BvYinyang | Algorithm::BvYinyangOnDemand => assert_eq!(calcs[1], 0, "{}", algorithm),
                _ => {},
            }
        }
    }

    fn topic_config<'a, T: Primitive>(algorithm: Algorithm, k: usize, init: InitMethod) -> KMeansConfig<'a, T> {
        KMeansConfig::build()
            .algorithm(algorithm)
            .no_clusters(k)
            .seed(42)
            .no_cores(3)
            .init(init)
            .iteration_limit(60)
            .tolerance(T::from_f64_lossy(1e-9))
            .additional_param("yinyang_regroup_interval", 3.0)
            .additional_param("bv_yinyang_iteration_limit", 5.0)
            .build().unwrap()
    }

    #[test] fn all_variants_agree_f32() { all_variants_agree::<f32>(); }
    #[test] fn all_variants_agree_f64() { all_variants_agree::<f64>(); }

    fn all_variants_agree<T: Primitive>() {
        let samples = testing::topic_samples::<T>(11, 400, 2000, 8, 20);
        for &(k, init) in [(24, InitMethod::KMeansPlusPlus), (16, InitMethod::Random)].iter() {
            let baseline = fit(&samples, &topic_config::<T>(Algorithm::Kmeans, k, init)).unwrap();
            assert!(baseline.iterations > 2);
            for &algorithm in Algorithm::ALL.iter().skip(1) {
                let result = fit(&samples, &topic_config::<T>(algorithm, k, init)).unwrap();
                assert_eq!(result.assignments, baseline.assignments, "{} with {}", algorithm, init);
                assert_eq!(result.metrics.sequence_i64("iteration_changes"),
                           baseline.metrics.sequence_i64("iteration_changes"), "{}", algorithm);
                assert_eq!(result.clusters, baseline.clusters, "{}", algorithm);
                assert_eq!(result.status, baseline.status);
                let full = result.metrics.sequence_i64("iteration_full_distance_calcs").iter().sum::<i64>();
                let exhaustive = baseline.metrics.sequence_i64("iteration_full_distance_calcs").iter().sum::<i64>();
                assert!(full < exhaustive, "{} computed {} distances, exhaustive search {}", algorithm, full, exhaustive);
            }
        }
    }

    #[test] fn wcssd_never_increases_f32() { wcssd_never_increases::<f32>(1e-5); }
    #[test] fn wcssd_never_increases_f64() { wcssd_never_increases::<f64>(1e-12); }

    fn wcssd_never_increases<T: Primitive>(rel_tol: f64) {
        let samples = testing::topic_samples::<T>(3, 500, 1500, 6, 25);
        for &algorithm in [Algorithm::Kmeans, Algorithm::Elkan, Algorithm::BvYinyang].iter() {
            let result = fit(&samples, &topic_config::<T>(algorithm, 12, InitMethod::Random)).unwrap();
            let mut previous = result.metrics.get_f64("initial_wcssd").unwrap();
            for wcssd in result.metrics.sequence_f64("iteration_wcssd") {
                assert!(wcssd <= previous * (1.0 + rel_tol), "{}: wcssd grew from {} to {}", algorithm, previous, wcssd);
                previous = wcssd;
            }
            assert!(result.wcssd.as_f64() <= previous * (1.0 + rel_tol));
        }
    }

    #[test]
    fn init_params_replay_first_iteration() {
        let samples = testing::topic_samples::<f64>(9, 300, 1000, 5, 18);
        for &init in [InitMethod::Random, InitMethod::KMeansPlusPlus].iter() {
            let config = |limit: usize, params: InitParams| KMeansConfig::build()
                .algorithm(Algorithm::BvElkan)
                .no_clusters(10)
                .seed(77)
                .no_cores(2)
                .init(init)
                .iteration_limit(limit)
                .initialization_params(params)
                .build().unwrap();
            let full = fit(&samples, &config(100, InitParams::default())).unwrap();
            let first = fit(&samples, &config(1, InitParams::default())).unwrap();
            let replay = fit(&samples, &config(1, full.init_params.clone())).unwrap();

            assert_eq!(first.init_params, full.init_params);
            assert_eq!(replay.assignments, first.assignments, "{}", init);
            assert_eq!(replay.clusters, first.clusters);
            assert_eq!(replay.metrics.sequence_f64("iteration_wcssd")[0], full.metrics.sequence_f64("iteration_wcssd")[0]);
            assert_eq!(replay.metrics.sequence_i64("iteration_changes")[0], full.metrics.sequence_i64("iteration_changes")[0]);
            assert_eq!(replay.metrics.record("general_params").unwrap().get_str("init"), Some("explicit"));
            assert_eq!(first.status, FitStatus::StoppedByLimit);
        }
    }

    fn far_points() -> SparseMatrix<f64> {
        SparseMatrix::from_dense(&[100.0, 100.0, 100.0, 101.0, 110.0, 110.0, 110.0, 111.0], 4, 2).unwrap()
    }

    #[test]
    fn empty_clusters_are_removed_once() {
        let samples = far_points();
        let config = |remove_empty: bool| KMeansConfig::build()
            .no_clusters(3)
            .remove_empty_clusters(remove_empty)
            .initialization_params(InitParams::from_assignments(vec![0, 0, 1, 1]))
            .build().unwrap();

        let kept = fit(&samples, &config(false)).unwrap();
        assert_eq!(kept.clusters.counts(), vec![2, 2, 0]);
        assert_eq!(kept.metrics.get_i64("no_clusters_remaining"), Some(2));
        assert_eq!(kept.metrics.sequence_i64("iteration_remaining_clusters"), vec![2]);

        let removed = fit(&samples, &config(true)).unwrap();
        assert_eq!(removed.clusters.len(), 2);
        assert_eq!(removed.assignments, vec![0, 0, 1, 1]);
        assert_eq!(removed.clusters.to_dense(), vec![100.0, 100.5, 110.0, 110.5]);
        let (again, mapping) = removed.clusters.without_empty();
        assert_eq!(again, removed.clusters);
        assert_eq!(mapping, vec![Some(0), Some(1)]);
    }

    #[test]
    fn cancelled_before_first_iteration() {
        let samples = testing::four_points::<f64>();
        let token = CancellationToken::new();
        token.cancel();
        let config = KMeansConfig::build()
            .no_clusters(2)
            .cancellation(token)
            .initialization_params(InitParams::from_samples(vec![0, 2]))
            .build().unwrap();
        let result = fit(&samples, &config).unwrap();
        assert_eq!(result.status, FitStatus::Cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.assignments, vec![0, 1, 0, 1]);
        assert!(result.metrics.sequence_i64("iteration_changes").is_empty());
        assert_eq!(result.metrics.get_str("status"), Some("cancelled"));
    }

    #[test]
    fn cancelled_from_callback() {
        let samples = testing::topic_samples::<f64>(21, 400, 2000, 8, 20);
        let token = CancellationToken::new();
        let remote = token.clone();
        let stop_after_first = move |s: &IterationStatus<'_, f64>| if s.iteration == 1 { remote.cancel() };
        let config = KMeansConfig::build()
            .algorithm(Algorithm::Yinyang)
            .no_clusters(20)
            .seed(5)
            .cancellation(token)
            .iteration_done(&stop_after_first)
            .build().unwrap();
        let result = fit(&samples, &config).unwrap();
        assert_eq!(result.status, FitStatus::Cancelled);
        assert_eq!(result.iterations, 1);
        let changes = result.metrics.sequence_i64("iteration_changes");
        assert_eq!(changes.len(), 1);
        assert!(changes[0] > 0);
        let recount: Vec<usize> = (0..result.clusters.len())
            .map(|c| result.assignments.iter().filter(|&&a| a == c).count()).collect();
        assert_eq!(recount, result.clusters.counts());
    }

    #[test]
    fn more_clusters_than_samples() {
        let samples = testing::four_points::<f64>();
        let config = KMeansConfig::build().no_clusters(5).build().unwrap();
        assert!(matches!(fit(&samples, &config), Err(KMeansError::Config(_))));
        let config = KMeansConfig::build().no_clusters(1).build().unwrap();
        assert!(matches!(fit(&SparseMatrix::<f64>::new(), &config), Err(KMeansError::Config(_))));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let samples = SparseMatrix::from_vector_list(&[
            SparseVector::from_dense(&[1.0f64, 0.0]),
            SparseVector::from_dense(&[f64::NAN, 0.0]),
            SparseVector::from_dense(&[0.0, 5.0]),
        ]);
        for &algorithm in Algorithm::ALL.iter() {
            let config = KMeansConfig::build().algorithm(algorithm).no_clusters(2).build().unwrap();
            assert!(matches!(fit(&samples, &config), Err(KMeansError::InvalidVector(_))), "{}", algorithm);
        }
    }

    #[test] fn iteration_wcssd_matches_distances_f32() { iteration_wcssd_matches_distances::<f32>(1e-4); }
    #[test] fn iteration_wcssd_matches_distances_f64() { iteration_wcssd_matches_distances::<f64>(1e-10); }

    /// Random initialization copies the seed samples, so the first pass objective is the sum of
    /// every sample's distance to its nearest seed.
    fn iteration_wcssd_matches_distances<T: Primitive>(rel_tol: f64) {
        let samples = testing::topic_samples::<T>(6, 300, 1000, 5, 18);
        for &algorithm in [Algorithm::Kmeans, Algorithm::Elkan, Algorithm::Yinyang].iter() {
            let config = KMeansConfig::build()
                .algorithm(algorithm)
                .no_clusters(10)
                .seed(8)
                .no_cores(2)
                .init(InitMethod::Random)
                .iteration_limit(1)
                .build().unwrap();
            let result = fit(&samples, &config).unwrap();
            let seeds = result.init_params.initial_cluster_samples.clone().unwrap();
            let exhaustive: f64 = samples.rows()
                .map(|row| seeds.iter()
                    .map(|&s| samples.row(s).squared_distance(row).as_f64())
                    .fold(f64::INFINITY, f64::min))
                .sum();
            let reported = result.metrics.sequence_f64("iteration_wcssd")[0];
            assert!((reported - exhaustive).abs() <= rel_tol * exhaustive, "{}: {} vs {}", algorithm, reported, exhaustive);
        }
    }

    #[test]
    fn metrics_echo_defaults() {
        let samples = testing::topic_samples::<f32>(2, 200, 800, 4, 15);
        let config = KMeansConfig::build()
            .algorithm(Algorithm::BvYinyangOnDemand)
            .no_clusters(20)
            .seed(u64::MAX)
            .no_cores(2)
            .init(InitMethod::KMeansPlusPlus)
            .additional_param("bv_annz", 0.5)
            .additional_info("dataset", "topics")
            .build().unwrap();
        let result = fit(&samples, &config).unwrap();
        let metrics = &result.metrics;

        let general = metrics.record("general_params").unwrap();
        assert_eq!(general.get_str("algorithm"), Some("bv_yinyang_ondemand"));
        assert_eq!(general.get_f64("seed"), Some(u64::MAX as f64));
        assert_eq!(general.get_str("init"), Some("kmeans++"));
        assert_eq!(general.get_i64("no_cores_used"), Some(2));

        let params = metrics.record("additional_params").unwrap();
        assert_eq!(params.get_f64("bv_annz"), Some(0.5));
        assert_eq!(params.get_f64("dense_center_ratio"), Some(0.1));
        assert_eq!(params.get_f64("partition_size"), Some(0.0));
        assert_eq!(params.get_f64("yinyang_regroup_interval"), Some(20.0));
        assert_eq!(params.get_f64("bv_yinyang_iteration_limit"), Some(15.0));
        assert_eq!(metrics.record("info").unwrap().get_str("dataset"), Some("topics"));

        assert_eq!(metrics.get_i64("input_samples"), Some(200));
        assert_eq!(metrics.get_i64("input_dimension"), Some(800));
        assert!(metrics.record("block_vector_data").is_some());
        assert_eq!(metrics.record("yinyang").unwrap().get_i64("no_groups"), Some(2));
        assert!(metrics.record("kmeans++").is_some());

        let iterations = metrics.get_i64("no_iterations").unwrap() as usize;
        assert_eq!(iterations, result.iterations);
        for key in ITERATION_SERIES.iter() {
            assert_eq!(metrics.sequence(key).map(|s| s.len()), Some(iterations), "{}", key);
        }
        assert_eq!(metrics.get_str("status"), Some(result.status.name()));
    }

    #[test]
    fn same_seed_same_result() {
        let samples = testing::topic_samples::<f64>(4, 250, 900, 5, 16);
        let config = || KMeansConfig::build().no_clusters(9).seed(1234).no_cores(2)
            .init(InitMethod::KMeansPlusPlus).build().unwrap();
        let a = fit(&samples, &config()).unwrap();
        let b = fit(&samples, &config()).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.metrics.sequence_f64("iteration_wcssd"), b.metrics.sequence_f64("iteration_wcssd"));
    }
}
