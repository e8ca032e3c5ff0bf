use crate::driver::FitData;
use crate::inits::{round_robin, seeded_centers, Initialization};
use crate::memory::*;
use crate::params::InitParams;
use rand::prelude::*;

/// Random sample initialization (a.k.a. Forgy): k distinct samples become the initial centers.
/// The first pass starts from a round-robin assignment, so its change count is meaningful.
pub(crate) fn calculate<T: Primitive>(data: &FitData<'_, T>, k: usize, rnd: &mut StdRng) -> Initialization<T> {
    let seeds: Vec<usize> = (0..data.no_samples()).choose_multiple(rnd, k);
    let assignments = round_robin(data.no_samples(), k);
    let clusters = seeded_centers(data, &seeds, &assignments);
    Initialization {
        clusters,
        init_params: InitParams { initial_cluster_samples: Some(seeds), assignments: Some(assignments.clone()) },
        assignments,
    }
}
