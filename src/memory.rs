use num::{Float, NumCast, Zero};
use rand::distributions::uniform::SampleUniform;
use std::{
    fmt::{Debug, Display, LowerExp},
    iter::Sum,
    ops::{AddAssign, SubAssign},
    str::FromStr,
};

/// Floating point type all calculations are generic over.
///
/// Besides the arithmetic bounds, this carries the few conversions the clustering code needs
/// without going through the fallible [`NumCast`] API, and the slack used when comparing
/// distance bounds against exact distances.
pub trait Primitive: Float + NumCast + Zero + AddAssign + SubAssign + Sum + SampleUniform + FromStr
                + Copy + Default + PartialOrd + Display + Debug + LowerExp + Send + Sync + 'static {
    fn from_count(v: usize) -> Self;
    fn from_f64_lossy(v: f64) -> Self;
    fn as_f64(self) -> f64;
    /// Relative slack (in units of the data radius) applied to every pruning decision.
    /// Covers the rounding error of bounds derived from norms and inner products.
    fn bound_slack() -> Self;
}

impl Primitive for f32 {
    #[inline(always)] fn from_count(v: usize) -> Self { v as f32 }
    #[inline(always)] fn from_f64_lossy(v: f64) -> Self { v as f32 }
    #[inline(always)] fn as_f64(self) -> f64 { self as f64 }
    #[inline(always)] fn bound_slack() -> Self { 3e-3 }
}

impl Primitive for f64 {
    #[inline(always)] fn from_count(v: usize) -> Self { v as f64 }
    #[inline(always)] fn from_f64_lossy(v: f64) -> Self { v }
    #[inline(always)] fn as_f64(self) -> f64 { self }
    #[inline(always)] fn bound_slack() -> Self { 1e-6 }
}
