mod euclideandistance;
pub(crate) mod bounds;

pub(crate) use euclideandistance::{center_to_center, sample_to_center};
