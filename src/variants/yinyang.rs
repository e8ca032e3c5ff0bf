use crate::cluster::{CenterAccumulator, ClusterSet};
use crate::distances::bounds::is_better;
use crate::driver::FitData;
use crate::inits::{kmeanplusplus, seeded_centers};
use crate::memory::*;
use crate::metrics::MetricsRecord;
use crate::params::additional;
use crate::sparse::SparseMatrix;
use crate::variants::{Assignment, Drift, Pass, PassCounters, SampleBounds};
use rand::prelude::*;

const GROUPING_ITERATIONS: usize = 5;
const GROUPING_SEED: u64 = 1;

/// Yinyang k-means: clusters are grouped, and every sample keeps one lower bound per group.
///
/// A group whose bound, relaxed by the largest center drift inside it, still exceeds the current
/// best distance is skipped entirely. Inside a group that has to be examined, each cluster is
/// filtered by the group's old bound relaxed by that cluster's own drift.
///
/// The distance to the own center is carried over as an upper bound, relaxed by the center's drift,
/// and only measured when the global filter fails against it.
///
/// Groups come from a small k-means run over the centers. They are rebuilt every
/// `yinyang_regroup_interval` iterations; the pass after a rebuild measures everything.
pub(crate) struct Yinyang<T> {
    no_groups: usize,
    regroup_interval: usize,
    regroups: usize,
    members: Vec<Vec<usize>>,
    group_of: Vec<usize>,
    group_drift: Vec<T>,
    full_pass: bool,
}

impl<T: Primitive> Yinyang<T> {
    pub fn new(k: usize, metrics: &mut MetricsRecord) -> Self {
        let (key, default) = additional::YINYANG_REGROUP_INTERVAL;
        let regroup_interval = metrics.f64_or_default("additional_params", key, default) as usize;
        let no_groups = (k / 10).max(1);
        Self {
            no_groups, regroup_interval,
            regroups: 0,
            members: Vec::new(),
            group_of: vec![0; k],
            group_drift: vec![T::zero(); no_groups],
            full_pass: true,
        }
    }

    pub fn no_groups(&self) -> usize { self.no_groups }

    pub fn prepare(&mut self, data: &FitData<'_, T>, clusters: &ClusterSet<T>, active: &[bool], drift: &Drift<T>,
                   iteration: usize, metrics: &mut MetricsRecord) {
        let regroup = iteration == 1
            || (self.regroup_interval > 0 && (iteration - 1) % self.regroup_interval == 0);
        if regroup {
            self.regroup(data, clusters, active);
            if iteration > 1 {
                self.regroups += 1;
                log::debug!("yinyang: rebuilt {} groups in iteration {}", self.no_groups, iteration);
            }
        }
        self.full_pass = regroup;
        for (g, members) in self.members.iter().enumerate() {
            self.group_drift[g] = members.iter().map(|&c| drift.shifts[c]).fold(T::zero(), T::max);
        }
        metrics.record_mut("yinyang")
            .set("no_groups", self.no_groups)
            .set("regroups", self.regroups);
    }

    fn regroup(&mut self, data: &FitData<'_, T>, clusters: &ClusterSet<T>, active: &[bool]) {
        let candidates: Vec<usize> = (0..clusters.len()).filter(|&c| active[c]).collect();
        let groups = if candidates.len() <= self.no_groups {
            (0..candidates.len()).collect()
        } else {
            group_centers(data, clusters, &candidates, self.no_groups)
        };
        self.members = vec![Vec::new(); self.no_groups];
        for (&c, g) in candidates.iter().zip(groups) {
            self.members[g].push(c);
            self.group_of[c] = g;
        }
    }

    pub fn assign(&self, pass: &Pass<'_, T>, idx: usize, prev: Assignment<T>, bounds: &mut SampleBounds<T>,
                  counters: &mut PassCounters) -> Assignment<T> {
        if self.full_pass {
            return self.assign_full(pass, idx, bounds, counters);
        }
        let margin = pass.data.margin;
        let a = prev.cluster;
        let (mut best, mut best_root, mut tight) = bounds.own_upper(pass, prev);

        let relaxed = |g: usize, lower: &[T]| (lower[g] - self.group_drift[g]).max(T::zero());
        let global = (0..self.no_groups).map(|g| relaxed(g, &bounds.lower)).fold(T::infinity(), T::min);
        if !tight && !margin.prunes(global, best_root) {
            best.distance = pass.distance(idx, a, counters);
            best_root = best.distance.sqrt();
            tight = true;
        }
        if margin.prunes(global, best_root) {
            for g in 0..self.no_groups {
                bounds.lower[g] = relaxed(g, &bounds.lower);
            }
            counters.saved_calcs += pass.no_active as u64 - 1;
            bounds.upper = best_root;
            bounds.tight = tight;
            return best;
        }

        // distances of clusters that stop being the best, applied once all groups are done
        let mut demoted: Vec<(usize, T)> = Vec::new();
        let mut sketch = None;
        for g in 0..self.no_groups {
            let old = bounds.lower[g];
            let group_bound = relaxed(g, &bounds.lower);
            if margin.prunes(group_bound, best_root) {
                bounds.lower[g] = group_bound;
                counters.saved_calcs += self.members[g].iter().filter(|&&c| c != a && pass.active[c]).count() as u64;
                continue;
            }
            let mut new_bound = T::infinity();
            for &c in self.members[g].iter().filter(|&&c| c != a && pass.active[c]) {
                let local = old - pass.drift.shifts[c];
                if margin.prunes(local, best_root) {
                    counters.saved_calcs += 1;
                    new_bound = new_bound.min(local);
                    continue;
                }
                let (bound, pruned) = pass.screen(&mut sketch, idx, c, best_root, counters);
                if pruned {
                    new_bound = new_bound.min(bound.max(local));
                    continue;
                }
                let d = pass.distance(idx, c, counters);
                if is_better(d, c, best.distance, best.cluster) {
                    demoted.push((self.group_of[best.cluster], best_root));
                    best = Assignment { cluster: c, distance: d };
                    best_root = d.sqrt();
                } else {
                    new_bound = new_bound.min(d.sqrt());
                }
            }
            bounds.lower[g] = new_bound;
        }
        for (g, root) in demoted {
            bounds.lower[g] = bounds.lower[g].min(root);
        }
        bounds.upper = best_root;
        bounds.tight = true;
        best
    }

    /// Measure every active cluster and rebuild the group bounds from scratch.
    fn assign_full(&self, pass: &Pass<'_, T>, idx: usize, bounds: &mut SampleBounds<T>, counters: &mut PassCounters) -> Assignment<T> {
        let mut best = Assignment { cluster: usize::MAX, distance: T::infinity() };
        // nearest cluster per group and the distance of the runner-up
        let mut nearest = vec![(T::infinity(), usize::MAX); self.no_groups];
        let mut runner_up = vec![T::infinity(); self.no_groups];
        for (g, members) in self.members.iter().enumerate() {
            for &c in members.iter().filter(|&&c| pass.active[c]) {
                let d = pass.distance(idx, c, counters);
                if is_better(d, c, best.distance, best.cluster) {
                    best = Assignment { cluster: c, distance: d };
                }
                let root = d.sqrt();
                if is_better(root, c, nearest[g].0, nearest[g].1) {
                    runner_up[g] = nearest[g].0;
                    nearest[g] = (root, c);
                } else {
                    runner_up[g] = runner_up[g].min(root);
                }
            }
        }
        for g in 0..self.no_groups {
            bounds.lower[g] = if nearest[g].1 == best.cluster { runner_up[g] } else { nearest[g].0 };
        }
        bounds.upper = best.distance.sqrt();
        bounds.tight = true;
        best
    }
}

/// Group the centers `candidates` into `no_groups` groups with a few Lloyd iterations seeded by
/// k-means++. Returns the group of every candidate.
fn group_centers<T: Primitive>(data: &FitData<'_, T>, clusters: &ClusterSet<T>, candidates: &[usize], no_groups: usize) -> Vec<usize> {
    let mut centers = SparseMatrix::new();
    for &c in candidates {
        let v = clusters.center(c).to_sparse();
        centers.push_row_unchecked(c as i64, v.indices(), v.values());
    }
    let centers = centers.with_dim(clusters.dim());
    let center_data = FitData::new(&centers, data.dense_ratio);
    let mut rnd = StdRng::seed_from_u64(GROUPING_SEED);
    let seeding = kmeanplusplus::choose_seeds(&centers, &center_data.norms, center_data.margin, no_groups, &mut rnd);

    let mut groups = seeding.nearest;
    let mut group_centers = seeded_centers(&center_data, &seeding.seeds, &groups);
    for _ in 0..GROUPING_ITERATIONS {
        let mut acc = CenterAccumulator::new(no_groups);
        centers.rows().zip(groups.iter()).for_each(|(row, &g)| acc.add(g, row));
        group_centers = acc.into_centers(&group_centers, data.dense_ratio);
        for (i, row) in centers.rows().enumerate() {
            let mut best = (T::infinity(), usize::MAX);
            for (g, gc) in group_centers.iter().enumerate() {
                let d = gc.squared_distance(row);
                if is_better(d, g, best.0, best.1) {
                    best = (d, g);
                }
            }
            groups[i] = best.1;
        }
    }
    groups
}
