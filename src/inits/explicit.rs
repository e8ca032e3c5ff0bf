use crate::driver::FitData;
use crate::error::{KMeansError, Result};
use crate::inits::{mean_centers, round_robin, seeded_centers, Initialization};
use crate::memory::*;
use crate::params::InitParams;

/// Initialization from caller supplied sample indices and/or assignments.
///
/// - indices only: centers are copies of the indexed rows, assignment is round-robin
/// - assignments only: centers are the means of the assigned samples
/// - both: centers from the indices, the assignments seed the first pass
pub(crate) fn calculate<T: Primitive>(data: &FitData<'_, T>, k: usize, params: &InitParams) -> Result<Initialization<T>> {
    let n = data.no_samples();
    params.validate(n, k)?;
    let (clusters, assignments) = match (&params.initial_cluster_samples, &params.assignments) {
        (Some(seeds), assignments) => {
            let assignments = assignments.clone().unwrap_or_else(|| round_robin(n, k));
            (seeded_centers(data, seeds, &assignments), assignments)
        },
        (None, Some(assignments)) => (mean_centers(data, k, assignments), assignments.clone()),
        (None, None) => return Err(KMeansError::init_params("neither initial cluster samples nor assignments given")),
    };
    log::debug!("explicit initialization: {} clusters, {} of them without samples", k, k - clusters.non_empty());
    Ok(Initialization {
        clusters,
        init_params: InitParams {
            initial_cluster_samples: params.initial_cluster_samples.clone(),
            assignments: Some(assignments.clone()),
        },
        assignments,
    })
}
