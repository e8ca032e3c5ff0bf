//! Assignment strategies. All of them produce exactly the assignment of the exhaustive search;
//! they only differ in how many exact distances they need for it.

mod baseline;
mod elkan;
mod yinyang;
mod screen;

use crate::cluster::ClusterSet;
use crate::distances::{self, bounds::cauchy_bound};
use crate::driver::FitData;
use crate::error::{KMeansError, Result};
use crate::memory::*;
use crate::metrics::MetricsRecord;
use crate::params::additional;
use crate::sparse::SparseVector;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub(crate) use elkan::Elkan;
pub(crate) use screen::BlockVectorScreen;
pub(crate) use yinyang::Yinyang;

/// Selectable k-means variant.
///
/// Every variant computes the same clustering as [`Algorithm::Kmeans`] from the same
/// initialization. The `Bv*` variants additionally screen candidates with block vectors, the
/// `*OnDemand` forms build sample block vectors per pass instead of keeping them in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Exhaustive search over all clusters.
    Kmeans,
    BvKmeans,
    BvKmeansOnDemand,
    /// Per sample and cluster lower bounds plus inter-center distances (Elkan 2003).
    Elkan,
    BvElkan,
    BvElkanOnDemand,
    /// Lower bounds per group of clusters (Ding et al. 2015).
    Yinyang,
    BvYinyang,
    BvYinyangOnDemand,
}

impl Algorithm {
    pub const ALL: [Algorithm; 9] = [
        Algorithm::Kmeans, Algorithm::BvKmeans, Algorithm::BvKmeansOnDemand,
        Algorithm::Elkan, Algorithm::BvElkan, Algorithm::BvElkanOnDemand,
        Algorithm::Yinyang, Algorithm::BvYinyang, Algorithm::BvYinyangOnDemand,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Kmeans => "kmeans",
            Algorithm::BvKmeans => "bv_kmeans",
            Algorithm::BvKmeansOnDemand => "bv_kmeans_ondemand",
            Algorithm::Elkan => "elkan",
            Algorithm::BvElkan => "bv_elkan",
            Algorithm::BvElkanOnDemand => "bv_elkan_ondemand",
            Algorithm::Yinyang => "yinyang",
            Algorithm::BvYinyang => "bv_yinyang",
            Algorithm::BvYinyangOnDemand => "bv_yinyang_ondemand",
        }
    }

    pub fn uses_block_vectors(&self) -> bool {
        !matches!(self, Algorithm::Kmeans | Algorithm::Elkan | Algorithm::Yinyang)
    }

    pub fn is_on_demand(&self) -> bool {
        matches!(self, Algorithm::BvKmeansOnDemand | Algorithm::BvElkanOnDemand | Algorithm::BvYinyangOnDemand)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = KMeansError;

    /// Accepts the canonical names plus the older `*_optimized` and `fast_yinyang` spellings.
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "kmeans" => Algorithm::Kmeans,
            "bv_kmeans" | "kmeans_optimized" => Algorithm::BvKmeans,
            "bv_kmeans_ondemand" | "kmeans_optimized_ondemand" => Algorithm::BvKmeansOnDemand,
            "elkan" => Algorithm::Elkan,
            "bv_elkan" | "elkan_optimized" => Algorithm::BvElkan,
            "bv_elkan_ondemand" | "elkan_optimized_ondemand" => Algorithm::BvElkanOnDemand,
            "yinyang" => Algorithm::Yinyang,
            "bv_yinyang" | "fast_yinyang" => Algorithm::BvYinyang,
            "bv_yinyang_ondemand" | "fast_yinyang_ondemand" => Algorithm::BvYinyangOnDemand,
            other => return Err(KMeansError::config(format!("unknown algorithm '{}'", other))),
        })
    }
}

/// A sample's cluster and its exact squared distance to that cluster's center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Assignment<T> {
    pub cluster: usize,
    pub distance: T,
}

/// Per-sample bound state, owned by whichever worker processes the sample's partition.
#[derive(Clone, Debug, Default)]
pub(crate) struct SampleBounds<T> {
    pub lower: Vec<T>,
    /// Upper bound of the distance to the own center as of the last pass.
    pub upper: T,
    /// `upper` is the exact distance to the own center.
    pub tight: bool,
}

impl<T: Primitive> SampleBounds<T> {
    /// Starting point of a pass: the previous assignment with its distance relaxed by the drift
    /// of the own center, the root of that distance, and whether both are still exact.
    ///
    /// While not exact, the returned distance is the square of the upper bound.
    pub fn own_upper(&self, pass: &Pass<'_, T>, prev: Assignment<T>) -> (Assignment<T>, T, bool) {
        let a = prev.cluster;
        if pass.first {
            (prev, prev.distance.sqrt(), true)
        } else if pass.drift.moved[a] {
            let upper = self.upper + pass.drift.shifts[a];
            (Assignment { cluster: a, distance: upper * upper }, upper, false)
        } else {
            (prev, self.upper, self.tight)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PassCounters {
    pub full_distance_calcs: u64,
    pub bv_calcs: u64,
    pub bv_calcs_success: u64,
    pub saved_calcs: u64,
}

impl PassCounters {
    pub fn merge(&mut self, other: &PassCounters) {
        self.full_distance_calcs += other.full_distance_calcs;
        self.bv_calcs += other.bv_calcs;
        self.bv_calcs_success += other.bv_calcs_success;
        self.saved_calcs += other.saved_calcs;
    }
}

/// How far every center moved in the last update.
///
/// `moved` is exact: a center counts as unmoved only if its stored vector is unchanged, so
/// distances computed against it stay valid bit for bit.
#[derive(Clone, Debug)]
pub(crate) struct Drift<T> {
    pub shifts: Vec<T>,
    pub moved: Vec<bool>,
}

impl<T: Primitive> Drift<T> {
    pub fn none(k: usize) -> Self {
        Self { shifts: vec![T::zero(); k], moved: vec![false; k] }
    }

    pub fn between(old: &ClusterSet<T>, new: &ClusterSet<T>) -> Self {
        let (shifts, moved) = old.centers().par_iter().zip(new.centers().par_iter())
            .map(|(o, n)| {
                if o.vector() == n.vector() {
                    (T::zero(), false)
                } else {
                    (distances::center_to_center(o, n).sqrt(), true)
                }
            })
            .unzip();
        Self { shifts, moved }
    }
}

/// Everything shared by the samples of one assignment pass.
pub(crate) struct Pass<'a, T> {
    pub data: &'a FitData<'a, T>,
    pub clusters: &'a ClusterSet<T>,
    pub active: &'a [bool],
    pub no_active: usize,
    pub drift: &'a Drift<T>,
    pub screen: Option<&'a BlockVectorScreen<T>>,
    /// The centers are the initial ones; no earlier pass established anything.
    pub first: bool,
}

impl<'a, T: Primitive> Pass<'a, T> {
    #[inline]
    pub fn distance(&self, idx: usize, cluster: usize, counters: &mut PassCounters) -> T {
        counters.full_distance_calcs += 1;
        self.clusters.center(cluster).squared_distance(self.data.samples.row(idx))
    }

    /// Screen `cluster` for sample `idx` against the current best distance.
    ///
    /// Returns a lower bound of the (non-squared) distance and whether it rules the cluster out.
    /// Without a block vector screen this is `(0, false)`.
    pub fn screen(&self, sketch: &mut Option<Cow<'a, SparseVector<T>>>, idx: usize, cluster: usize,
                  best_root: T, counters: &mut PassCounters) -> (T, bool) {
        let screen = match self.screen {
            Some(s) => s,
            None => return (T::zero(), false),
        };
        let center = self.clusters.center(cluster);
        let cauchy = cauchy_bound(self.data.norms[idx], center.norm());
        if self.data.margin.prunes(cauchy, best_root) {
            counters.saved_calcs += 1;
            return (cauchy, true);
        }
        let bv = sketch.get_or_insert_with(|| screen.sample_vector(self.data, idx));
        counters.bv_calcs += 1;
        let bound = screen.bound(self.data.squared_norms[idx], bv, cluster, center.squared_norm())
            .sqrt().max(cauchy);
        if self.data.margin.prunes(bound, best_root) {
            counters.bv_calcs_success += 1;
            counters.saved_calcs += 1;
            (bound, true)
        } else {
            (bound, false)
        }
    }
}

enum Family<T> {
    Baseline,
    Elkan(Elkan<T>),
    Yinyang(Yinyang<T>),
}

/// One configured variant across the passes of a fit.
///
/// Per pass the driver calls [`AlgorithmVariant::prepare`], then [`AlgorithmVariant::assign`] for
/// every sample (from any worker), then [`AlgorithmVariant::update_bounds`] with the new centers.
pub(crate) struct AlgorithmVariant<T> {
    family: Family<T>,
    screen: Option<BlockVectorScreen<T>>,
    screen_enabled: bool,
    bv_iteration_limit: usize,
    active: Vec<bool>,
    no_active: usize,
    drift: Drift<T>,
    first: bool,
}

impl<T: Primitive> AlgorithmVariant<T> {
    pub fn new(algorithm: Algorithm, data: &FitData<'_, T>, k: usize, metrics: &mut MetricsRecord) -> Self {
        let screen = if algorithm.uses_block_vectors() {
            Some(BlockVectorScreen::new(data, algorithm.is_on_demand(), metrics))
        } else {
            None
        };
        let family = match algorithm {
            Algorithm::Kmeans | Algorithm::BvKmeans | Algorithm::BvKmeansOnDemand => Family::Baseline,
            Algorithm::Elkan | Algorithm::BvElkan | Algorithm::BvElkanOnDemand => Family::Elkan(Elkan::new(k)),
            Algorithm::Yinyang | Algorithm::BvYinyang | Algorithm::BvYinyangOnDemand => Family::Yinyang(Yinyang::new(k, metrics)),
        };
        let bv_iteration_limit = match (&family, &screen) {
            (Family::Yinyang(_), Some(_)) => {
                let (key, default) = additional::BV_YINYANG_ITERATION_LIMIT;
                metrics.f64_or_default("additional_params", key, default) as usize
            },
            _ => usize::MAX,
        };
        Self {
            family, screen,
            screen_enabled: false,
            bv_iteration_limit,
            active: vec![true; k],
            no_active: k,
            drift: Drift::none(k),
            first: true,
        }
    }

    pub fn initial_bounds(&self, no_samples: usize) -> Vec<SampleBounds<T>> {
        let width = match &self.family {
            Family::Baseline => 0,
            Family::Elkan(_) => self.active.len(),
            Family::Yinyang(y) => y.no_groups(),
        };
        vec![SampleBounds { lower: vec![T::zero(); width], upper: T::zero(), tight: false }; no_samples]
    }

    /// Clusters that lost all their samples stay out of every later pass.
    pub fn prepare(&mut self, data: &FitData<'_, T>, clusters: &ClusterSet<T>, iteration: usize, metrics: &mut MetricsRecord) {
        self.first = iteration == 1;
        if !self.first {
            self.active.iter_mut().zip(clusters.iter()).for_each(|(a, c)| *a = *a && c.count() > 0);
        }
        self.no_active = self.active.iter().filter(|&&a| a).count();

        self.screen_enabled = self.screen.is_some() && iteration < self.bv_iteration_limit;
        if self.screen_enabled {
            if let Some(screen) = self.screen.as_mut() {
                screen.prepare(clusters);
            }
        }
        match &mut self.family {
            Family::Baseline => {},
            Family::Elkan(e) => e.prepare(clusters, &self.active),
            Family::Yinyang(y) => y.prepare(data, clusters, &self.active, &self.drift, iteration, metrics),
        }
    }

    pub fn pass<'a>(&'a self, data: &'a FitData<'a, T>, clusters: &'a ClusterSet<T>) -> Pass<'a, T> {
        Pass {
            data, clusters,
            active: &self.active,
            no_active: self.no_active,
            drift: &self.drift,
            screen: if self.screen_enabled { self.screen.as_ref() } else { None },
            first: self.first,
        }
    }

    /// Nearest active cluster of sample `idx`, starting from its assignment of the previous pass.
    pub fn assign(&self, pass: &Pass<'_, T>, idx: usize, prev: Assignment<T>, bounds: &mut SampleBounds<T>,
                  counters: &mut PassCounters) -> Assignment<T> {
        match &self.family {
            Family::Baseline => baseline::assign(pass, idx, prev, counters),
            Family::Elkan(e) => e.assign(pass, idx, prev, bounds, counters),
            Family::Yinyang(y) => y.assign(pass, idx, prev, bounds, counters),
        }
    }

    /// Record how far the centers moved; bounds are relaxed lazily in the next pass.
    pub fn update_bounds(&mut self, old: &ClusterSet<T>, new: &ClusterSet<T>) {
        self.drift = Drift::between(old, new);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterCenter, ClusterSet};

    #[test]
    fn names_and_aliases() {
        for algorithm in Algorithm::ALL.iter() {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), *algorithm);
            assert_eq!(algorithm.to_string(), algorithm.name());
        }
        assert_eq!("kmeans_optimized".parse::<Algorithm>().unwrap(), Algorithm::BvKmeans);
        assert_eq!("elkan_optimized_ondemand".parse::<Algorithm>().unwrap(), Algorithm::BvElkanOnDemand);
        assert_eq!("fast_yinyang".parse::<Algorithm>().unwrap(), Algorithm::BvYinyang);
        assert!(matches!("minibatch".parse::<Algorithm>(), Err(KMeansError::Config(_))));
        assert!(Algorithm::BvYinyangOnDemand.uses_block_vectors() && Algorithm::BvYinyangOnDemand.is_on_demand());
        assert!(!Algorithm::Elkan.uses_block_vectors());
    }

    #[test]
    fn drift_is_exact() {
        let center = |v: Vec<f64>| ClusterCenter::new(SparseVector::from_dense(&v), 1, 2, 0.1);
        let old = ClusterSet::new(vec![center(vec![0.0, 0.5]), center(vec![3.0, 0.0])], 2);
        let new = ClusterSet::new(vec![center(vec![0.0, 0.5]), center(vec![0.0, 4.0])], 2);
        let drift = Drift::between(&old, &new);
        assert_eq!(drift.moved, vec![false, true]);
        assert_eq!(drift.shifts, vec![0.0, 5.0]);
    }
}
