//! # sparse_kmeans - API documentation
//!
//! sparse_kmeans is a rust library for k-means clustering of very high-dimensional sparse data,
//! such as bag-of-words vectors of text documents.
//!
//! ## Design target
//! It's main target is throughput on data with hundreds of thousands of dimensions, of which every
//! sample only uses a few. Samples are stored in a compressed sparse row matrix ([`SparseMatrix`]),
//! centers switch to dense storage once they fill up, and most of the work of an iteration goes
//! into avoiding exact distance calculations that cannot change an assignment.
//!
//! ## Supported variants
//! K-Means clustering is not one algorithm, but more like a concept describing the outcome.
//! All variants implemented here compute exactly the same clustering as the plain (Lloyd) algorithm
//! from the same initialization; they use differing bounds to skip distance calculations.
//! For a list of supported variants, have a look at the documentation of [`Algorithm`].
//!
//! ## Supported centroid initializations
//! The outcome of each K-Means run depends on the initialization of its clusters. The supported
//! methods are listed in [`InitMethod`]; alternatively, a fit can be started from explicit
//! [`InitParams`], for example the ones reported by an earlier fit.
//!
//! ## Supported primitive types
//! - [`f32`]
//! - [`f64`]
//!
//! ## Example
//! Here is an example clustering a small libsvm dataset with Elkan's algorithm, using K-Mean++ initialization:
//!
//! ```rust
//! use sparse_kmeans::*;
//!
//! fn main() -> Result<()> {
//!     let samples = SparseMatrix::<f64>::parse_libsvm(
//!         "1 1:0.5 7:1\n1 1:0.4 7:1.2\n2 3:2 9:1\n2 3:2.2 9:0.9\n")?;
//!
//!     let config = KMeansConfig::build()
//!         .algorithm(Algorithm::Elkan)
//!         .no_clusters(2)
//!         .init(InitMethod::KMeansPlusPlus)
//!         .seed(42)
//!         .build()?;
//!     let mut kmeans = KMeans::new(config);
//!     let result = kmeans.fit(&samples)?;
//!
//!     println!("Status: {} after {} iterations", result.status, result.iterations);
//!     println!("Cluster-Assignments: {:?}", result.assignments);
//!     println!("Error: {}", result.wcssd);
//!     println!("Metrics: {}", result.metrics.to_json_string()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Example (using the status event callbacks and prediction)
//! ```rust
//! use sparse_kmeans::*;
//!
//! fn main() -> Result<()> {
//!     let mut samples = SparseMatrix::<f32>::new();
//!     for i in 0..200u32 {
//!         let topic = i % 4;
//!         samples.push_row(topic as i64, &[topic * 10, topic * 10 + 1 + i % 3], &[1.0, 2.0])?;
//!     }
//!
//!     let iteration_done = |s: &IterationStatus<f32>|
//!         println!("Iteration {} - Error: {:.2} -> {:.2} | Changes: {}",
//!             s.iteration, s.previous_wcssd, s.wcssd, s.changes);
//!     let conf = KMeansConfig::<f32>::build()
//!         .no_clusters(4)
//!         .init_done(&|clusters| println!("Initialization of {} clusters completed.", clusters.len()))
//!         .iteration_done(&iteration_done)
//!         .build()?;
//!
//!     let mut kmeans = KMeans::new(conf);
//!     let prediction = kmeans.fit_predict(&samples)?;
//!     println!("Cluster-Assignments: {:?}", prediction.assignments);
//!
//!     let sample = SparseVector::new(vec![10, 12], vec![1.0, 2.0])?;
//!     let (cluster, distance) = kmeans.predict_one(sample.as_row())?;
//!     println!("Nearest cluster: {} (squared distance {})", cluster, distance);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//! The crate reports through the [`log`](https://docs.rs/log) facade and never installs a logger itself.

#[macro_use] mod helpers;
mod memory;
mod error;
mod sparse;
mod cluster;
mod distances;
mod metrics;
mod params;
mod cancellation;
mod abort_strategy;
mod inits;
mod variants;
mod driver;
mod predict;
mod api;

pub use abort_strategy::AbortStrategy;
pub use api::{
    FitResult, FitStatus, InitDoneCallbackFn, InitMethod, IterationDoneCallbackFn, IterationStatus,
    KMeans, KMeansConfig, KMeansConfigBuilder,
};
pub use cancellation::CancellationToken;
pub use cluster::{CenterVector, ClusterCenter, ClusterSet};
pub use error::{KMeansError, Result};
pub use memory::Primitive;
pub use metrics::{MetricValue, MetricsRecord, Scalar};
pub use params::{additional, InitParams};
pub use predict::{PredictEngine, Prediction};
pub use sparse::{SparseMatrix, SparseRow, SparseVector};
pub use variants::Algorithm;
