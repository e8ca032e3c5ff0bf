use crate::distances::bounds::is_better;
use crate::memory::*;
use crate::variants::{Assignment, Pass, PassCounters};

/// Lloyd's assignment step.
///
/// Without a block vector screen every active cluster is measured. With one, a sample is
/// *eligible* when its own center did not move, or moved towards it; an eligible sample cannot
/// switch to any cluster whose center stayed in place, so only moved clusters are screened.
pub(crate) fn assign<T: Primitive>(pass: &Pass<'_, T>, idx: usize, prev: Assignment<T>, counters: &mut PassCounters) -> Assignment<T> {
    let k = pass.clusters.len();
    if pass.screen.is_none() {
        let mut best = Assignment { cluster: usize::MAX, distance: T::infinity() };
        for c in (0..k).filter(|&c| pass.active[c]) {
            let d = pass.distance(idx, c, counters);
            if is_better(d, c, best.distance, best.cluster) {
                best = Assignment { cluster: c, distance: d };
            }
        }
        return best;
    }

    let a = prev.cluster;
    let own = if pass.drift.moved[a] { pass.distance(idx, a, counters) } else { prev.distance };
    let eligible = !pass.first && (!pass.drift.moved[a] || own < prev.distance);

    let mut best = Assignment { cluster: a, distance: own };
    let mut best_root = own.sqrt();
    let mut sketch = None;
    for c in (0..k).filter(|&c| c != a && pass.active[c]) {
        if eligible && !pass.drift.moved[c] {
            counters.saved_calcs += 1;
            continue;
        }
        if pass.screen(&mut sketch, idx, c, best_root, counters).1 {
            continue;
        }
        let d = pass.distance(idx, c, counters);
        if is_better(d, c, best.distance, best.cluster) {
            best = Assignment { cluster: c, distance: d };
            best_root = d.sqrt();
        }
    }
    best
}
