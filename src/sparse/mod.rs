//! Sparse sample storage and the arithmetic the clustering variants build on.

mod vector;
mod matrix;
mod libsvm;
pub(crate) mod blockvector;

pub use matrix::SparseMatrix;
pub use vector::{SparseRow, SparseVector};
