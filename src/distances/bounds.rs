use crate::memory::*;

/// Decides whether a lower bound rules a cluster out.
///
/// Bounds live in Euclidean (not squared) space, where the triangle inequality holds. A bound only
/// prunes when it beats the reference distance by more than a margin scaled to the data radius, so
/// rounding in norms, inner products and accumulated drifts can never prune a cluster the exhaustive
/// search would have picked, ties included.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PruneMargin<T> {
    margin: T,
}

impl<T: Primitive> PruneMargin<T> {
    pub fn new(radius: T) -> Self {
        Self { margin: radius * T::bound_slack() }
    }

    /// `true` if every point with distance at least `lower` is strictly worse than `upper`.
    #[inline(always)]
    pub fn prunes(&self, lower: T, upper: T) -> bool {
        lower > upper + self.margin
    }
}

/// `| |a| - |b| |`, the cheapest lower bound of `|a - b|`.
#[inline(always)]
pub(crate) fn cauchy_bound<T: Primitive>(norm_a: T, norm_b: T) -> T {
    (norm_a - norm_b).abs()
}

/// Exhaustive-search order: smaller distance first, lower cluster index on ties.
#[inline(always)]
pub(crate) fn is_better<T: Primitive>(dist: T, cluster: usize, best_dist: T, best_cluster: usize) -> bool {
    dist < best_dist || (dist == best_dist && cluster < best_cluster)
}
