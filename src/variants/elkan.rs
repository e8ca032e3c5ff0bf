use crate::cluster::ClusterSet;
use crate::distances::{self, bounds::is_better};
use crate::memory::*;
use crate::variants::{Assignment, Pass, PassCounters, SampleBounds};
use rayon::prelude::*;

/// Elkan's triangle inequality acceleration.
///
/// Keeps one lower bound per sample and cluster plus an upper bound of the distance to the own
/// center, relaxed by that center's drift and only tightened when needed. Per pass, half of every
/// inter-center distance is known; a cluster can only win if both its lower bound and half its
/// distance to the current best center are below the current best distance.
pub(crate) struct Elkan<T> {
    k: usize,
    /// `half_distances[a * k + b]` is half the distance between centers `a` and `b`.
    half_distances: Vec<T>,
    /// Half the distance of every center to its nearest other active center.
    separation: Vec<T>,
}

impl<T: Primitive> Elkan<T> {
    pub fn new(k: usize) -> Self {
        Self { k, half_distances: vec![T::zero(); k * k], separation: vec![T::zero(); k] }
    }

    pub fn prepare(&mut self, clusters: &ClusterSet<T>, active: &[bool]) {
        let k = self.k;
        let half = T::from_f64_lossy(0.5);
        let upper: Vec<Vec<T>> = (0..k).into_par_iter()
            .map(|a| (a + 1..k)
                .map(|b| if active[a] && active[b] {
                    distances::center_to_center(clusters.center(a), clusters.center(b)).sqrt() * half
                } else {
                    T::infinity()
                })
                .collect())
            .collect();
        for (a, row) in upper.into_iter().enumerate() {
            self.half_distances[a * k + a] = T::zero();
            for (b, h) in (a + 1..k).zip(row) {
                self.half_distances[a * k + b] = h;
                self.half_distances[b * k + a] = h;
            }
        }
        for a in 0..k {
            self.separation[a] = (0..k).filter(|&b| b != a)
                .map(|b| self.half_distances[a * k + b])
                .fold(T::infinity(), T::min);
        }
    }

    /// The distance to the own center is only measured once some other cluster survives both
    /// filters against the (possibly stale) upper bound.
    pub fn assign(&self, pass: &Pass<'_, T>, idx: usize, prev: Assignment<T>, bounds: &mut SampleBounds<T>,
                  counters: &mut PassCounters) -> Assignment<T> {
        let margin = pass.data.margin;
        let a = prev.cluster;
        let (mut best, mut best_root, mut tight) = bounds.own_upper(pass, prev);
        let lower = &mut bounds.lower;
        if !pass.first {
            lower.iter_mut().zip(pass.drift.shifts.iter())
                .for_each(|(l, &s)| *l = (*l - s).max(T::zero()));
        }

        if margin.prunes(self.separation[a], best_root) {
            counters.saved_calcs += pass.no_active as u64 - 1;
            bounds.upper = best_root;
            bounds.tight = tight;
            return best;
        }

        let mut sketch = None;
        for c in (0..self.k).filter(|&c| c != a && pass.active[c]) {
            let ruled_out = |lower: &[T], from: usize, root: T|
                margin.prunes(lower[c], root) || margin.prunes(self.half_distances[from * self.k + c], root);
            if ruled_out(&lower[..], best.cluster, best_root) {
                counters.saved_calcs += 1;
                continue;
            }
            if !tight {
                // best is still the own cluster here
                best.distance = pass.distance(idx, a, counters);
                best_root = best.distance.sqrt();
                lower[a] = best_root;
                tight = true;
                if ruled_out(&lower[..], a, best_root) {
                    counters.saved_calcs += 1;
                    continue;
                }
            }
            let (bound, pruned) = pass.screen(&mut sketch, idx, c, best_root, counters);
            if pruned {
                lower[c] = lower[c].max(bound);
                continue;
            }
            let d = pass.distance(idx, c, counters);
            lower[c] = d.sqrt();
            if is_better(d, c, best.distance, best.cluster) {
                best = Assignment { cluster: c, distance: d };
                best_root = lower[c];
            }
        }
        bounds.upper = best_root;
        bounds.tight = tight;
        best
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterCenter;
    use crate::driver::FitData;
    use crate::sparse::{SparseMatrix, SparseVector};
    use crate::variants::Drift;

    #[test]
    fn separation_ignores_inactive_clusters() {
        let center = |v: Vec<f64>| ClusterCenter::new(SparseVector::from_dense(&v), 1, 2, 0.1);
        let clusters = ClusterSet::new(vec![center(vec![0.0, 0.0]), center(vec![0.0, 4.0]),
                                            center(vec![0.0, 1.0]), center(vec![6.0, 0.0])], 2);
        let mut elkan = Elkan::new(4);
        elkan.prepare(&clusters, &[true, true, false, true]);
        assert_eq!(elkan.half_distances[1], 2.0);
        assert_eq!(elkan.half_distances[12], 3.0);
        assert!(elkan.half_distances[2].is_infinite());
        assert_eq!(elkan.separation, vec![2.0, 2.0, f64::INFINITY, 3.0]);
    }

    #[test]
    fn stale_upper_bound_skips_or_tightens() {
        let samples = SparseMatrix::from_dense(&[0.0, 0.1, 5.0, 5.1], 2, 2).unwrap();
        let data = FitData::new(&samples, 0.1);
        let center = |v: Vec<f64>| ClusterCenter::new(SparseVector::from_dense(&v), 1, 2, 0.1);
        let clusters = ClusterSet::new(vec![center(vec![0.0, 0.0]), center(vec![10.0, 10.0])], 2);
        let mut elkan = Elkan::new(2);
        elkan.prepare(&clusters, &[true, true]);
        let drift = Drift { shifts: vec![0.05, 0.0], moved: vec![true, false] };
        let pass = Pass {
            data: &data, clusters: &clusters, active: &[true, true], no_active: 2,
            drift: &drift, screen: None, first: false,
        };

        // own center moved a little, but stays far closer than half the way to the other one
        let mut bounds = SampleBounds { lower: vec![0.0, 14.0], upper: 0.1, tight: true };
        let mut counters = PassCounters::default();
        let kept = elkan.assign(&pass, 0, Assignment { cluster: 0, distance: 0.01 }, &mut bounds, &mut counters);
        assert_eq!(kept.cluster, 0);
        assert_eq!(counters.full_distance_calcs, 0);
        assert_eq!(counters.saved_calcs, 1);
        assert_approx_eq!(bounds.upper, 0.15, 1e-12);
        assert!(!bounds.tight);

        // the relaxed bound reaches the other cluster: measure the own center first, then switch
        let mut bounds = SampleBounds { lower: vec![0.0, 0.0], upper: 7.14, tight: true };
        let mut counters = PassCounters::default();
        let moved = elkan.assign(&pass, 1, Assignment { cluster: 0, distance: 7.14 * 7.14 }, &mut bounds, &mut counters);
        assert_eq!(moved.cluster, 1);
        assert_approx_eq!(moved.distance, 49.01, 1e-9);
        assert_eq!(counters.full_distance_calcs, 2);
        assert!(bounds.tight);
        assert_eq!(bounds.upper, moved.distance.sqrt());
        assert_approx_eq!(bounds.lower[0], 51.01f64.sqrt(), 1e-9);
    }
}
