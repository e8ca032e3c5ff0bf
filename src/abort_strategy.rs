use crate::memory::*;

/// When a running fit stops because its objective (WCSSD) no longer improves enough.
///
/// Independent of the strategy, a fit also stops when an iteration did not change any assignment,
/// or when the iteration limit is reached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AbortStrategy<T: Primitive> {
    /// Stop once `(previous - current) / previous < tolerance`.
    RelativeImprovement { tolerance: T },
    /// Stop once `previous - current < tolerance`.
    AbsoluteImprovement { tolerance: T },
}

impl<T: Primitive> AbortStrategy<T> {
    pub fn tolerance(&self) -> T {
        match *self {
            AbortStrategy::RelativeImprovement { tolerance } | AbortStrategy::AbsoluteImprovement { tolerance } => tolerance,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AbortStrategy::RelativeImprovement { .. } => "relative",
            AbortStrategy::AbsoluteImprovement { .. } => "absolute",
        }
    }

    pub(crate) fn create_logic(&self, initial_error: T) -> Box<dyn AbortStrategyLogic<T>> {
        match *self {
            AbortStrategy::RelativeImprovement { tolerance } => Box::new(RelativeImprovementLogic {
                tolerance, prev_error: initial_error
            }),
            AbortStrategy::AbsoluteImprovement { tolerance } => Box::new(AbsoluteImprovementLogic {
                tolerance, prev_error: initial_error
            }),
        }
    }
}

pub(crate) trait AbortStrategyLogic<T: Primitive> {
    /// Feed the objective after an iteration.
    /// ## Returns
    /// - **true** if the calculation should continue
    /// - **false** if the calculation should stop
    fn next(&mut self, error: T) -> bool;
}


pub(crate) struct RelativeImprovementLogic<T: Primitive> {
    tolerance: T,
    prev_error: T,
}
impl<T: Primitive> AbortStrategyLogic<T> for RelativeImprovementLogic<T> {
    fn next(&mut self, error: T) -> bool {
        let prev = self.prev_error;
        self.prev_error = error;
        if prev.is_infinite() {
            return true;
        }
        if prev <= T::zero() {
            return false;
        }
        (prev - error) / prev >= self.tolerance
    }
}


pub(crate) struct AbsoluteImprovementLogic<T: Primitive> {
    tolerance: T,
    prev_error: T,
}
impl<T: Primitive> AbortStrategyLogic<T> for AbsoluteImprovementLogic<T> {
    fn next(&mut self, error: T) -> bool {
        let improvement = self.prev_error - error;
        self.prev_error = error;
        improvement.is_nan() || improvement >= self.tolerance
    }
}
