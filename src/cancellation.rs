use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal for a running fit.
///
/// Clones share one flag. The driver checks it before every partition of the assign phase and
/// between phases; once set, the fit finishes with [`crate::FitStatus::Cancelled`] and the result
/// of the last fully completed iteration.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    stop: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can be reused for another fit.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }
}
