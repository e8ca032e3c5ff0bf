use crate::{
    abort_strategy::AbortStrategy,
    cancellation::CancellationToken,
    cluster::ClusterSet,
    driver,
    error::{KMeansError, Result},
    memory::*,
    metrics::MetricsRecord,
    params::{additional, InitParams},
    predict::{PredictEngine, Prediction},
    sparse::{SparseMatrix, SparseRow},
    variants::Algorithm,
};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

pub type InitDoneCallbackFn<'a, T> = &'a (dyn Fn(&ClusterSet<T>) + Sync);
pub type IterationDoneCallbackFn<'a, T> = &'a (dyn Fn(&IterationStatus<'_, T>) + Sync);

/// How the initial centers are chosen when no explicit [`InitParams`] are configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitMethod {
    /// k distinct samples drawn uniformly, sample `i` starts in cluster `i % k`.
    Random,
    /// k-means++ seeding; the centers are the means of the samples nearest to each seed.
    KMeansPlusPlus,
}

impl InitMethod {
    pub fn name(&self) -> &'static str {
        match self {
            InitMethod::Random => "random",
            InitMethod::KMeansPlusPlus => "kmeans++",
        }
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InitMethod {
    type Err = KMeansError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(InitMethod::Random),
            "kmeans++" => Ok(InitMethod::KMeansPlusPlus),
            other => Err(KMeansError::config(format!("unknown initialization method '{}'", other))),
        }
    }
}

/// Snapshot handed to the `iteration_done` callback after every completed iteration.
pub struct IterationStatus<'s, T: Primitive> {
    /// Number of the iteration, starting at 1
    pub iteration: usize,
    /// Objective of this iteration's assignment
    pub wcssd: T,
    /// Objective of the iteration before (or of the initialization)
    pub previous_wcssd: T,
    /// Samples that changed their cluster
    pub changes: usize,
    pub remaining_clusters: usize,
    /// Centers after this iteration's update
    pub clusters: &'s ClusterSet<T>,
}

/// This is a structure holding the configuration of a clustering: the variant, the number of clusters,
/// stop criteria, initialization, the numeric side channel read by the variants and a couple of callbacks
/// that can be set to get status information from a running fit.
///
/// For a more detailed information about all possible options, have a look at [`KMeansConfigBuilder`].
pub struct KMeansConfig<'a, T: Primitive> {
    pub(crate) algorithm: Algorithm,
    pub(crate) k: usize,
    pub(crate) iteration_limit: usize,
    /// The abort-strategy to use for the running calculation
    pub(crate) abort_strategy: AbortStrategy<T>,
    pub(crate) init: InitMethod,
    /// Explicit initialization; takes precedence over `init` when not empty
    pub(crate) init_params: InitParams,
    pub(crate) seed: Option<u64>,
    pub(crate) remove_empty: bool,
    /// Number of worker threads, 0 picks rayon's default
    pub(crate) no_cores: usize,
    pub(crate) additional_params: Vec<(String, f64)>,
    pub(crate) info: Vec<(String, String)>,
    pub(crate) cancellation: CancellationToken,
    /// Callback that is called, when the initialization phase finished
    /// ## Arguments
    /// - **clusters**: The initial centers
    pub(crate) init_done: InitDoneCallbackFn<'a, T>,
    /// Callback that is called after each iteration
    /// ## Arguments
    /// - **status**: [`IterationStatus`] of the completed iteration
    pub(crate) iteration_done: IterationDoneCallbackFn<'a, T>,
}
impl<'a, T: Primitive> Default for KMeansConfig<'a, T> {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::BvKmeans,
            k: 10,
            iteration_limit: 1000,
            abort_strategy: AbortStrategy::RelativeImprovement { tolerance: T::from_f64_lossy(1e-6) },
            init: InitMethod::Random,
            init_params: InitParams::default(),
            seed: None,
            remove_empty: false,
            no_cores: 0,
            additional_params: Vec::new(),
            info: Vec::new(),
            cancellation: CancellationToken::new(),
            init_done: &|_| {},
            iteration_done: &|_| {},
        }
    }
}
impl<'a, T: Primitive> KMeansConfig<'a, T> {
    /// Use the [`KMeansConfigBuilder`] to build a [`KMeansConfig`] instance.
    pub fn build() -> KMeansConfigBuilder<'a, T> {
        KMeansConfigBuilder { config: KMeansConfig::default() }
    }

    pub fn algorithm(&self) -> Algorithm { self.algorithm }
    pub fn no_clusters(&self) -> usize { self.k }
    pub fn iteration_limit(&self) -> usize { self.iteration_limit }
    pub fn abort_strategy(&self) -> AbortStrategy<T> { self.abort_strategy }
    pub fn seed(&self) -> Option<u64> { self.seed }

    /// A handle to the token the fits of this configuration listen to. Cancel it from any thread.
    pub fn cancellation(&self) -> CancellationToken { self.cancellation.clone() }

    /// Value of an additional parameter, if it was set.
    pub fn additional_param(&self, key: &str) -> Option<f64> {
        self.additional_params.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(KMeansError::config("the number of clusters must be at least 1"));
        }
        if self.iteration_limit < 1 {
            return Err(KMeansError::config("the iteration limit must be at least 1"));
        }
        let tol = self.abort_strategy.tolerance();
        if !(tol > T::zero()) || !tol.is_finite() {
            return Err(KMeansError::config(format!("tolerance must be positive and finite, got {}", tol)));
        }
        for (key, value) in &self.additional_params {
            additional::validate(key, *value).map_err(KMeansError::Config)?;
        }
        Ok(())
    }
}
impl<'a, T: Primitive> fmt::Debug for KMeansConfig<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KMeansConfig")
            .field("algorithm", &self.algorithm)
            .field("k", &self.k)
            .field("iteration_limit", &self.iteration_limit)
            .field("abort_strategy", &self.abort_strategy)
            .field("init", &self.init)
            .field("seed", &self.seed)
            .field("remove_empty", &self.remove_empty)
            .field("no_cores", &self.no_cores)
            .field("additional_params", &self.additional_params)
            .finish()
    }
}

pub struct KMeansConfigBuilder<'a, T: Primitive> {
    config: KMeansConfig<'a, T>
}
impl<'a, T: Primitive> KMeansConfigBuilder<'a, T> {
    /// Set the k-means variant.
    /// ## Default
    /// [`Algorithm::BvKmeans`]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm; self
    }
    /// Set the number of clusters (k).
    /// ## Default
    /// 10
    pub fn no_clusters(mut self, k: usize) -> Self {
        self.config.k = k; self
    }
    /// Set the maximum number of iterations.
    /// ## Default
    /// 1000
    pub fn iteration_limit(mut self, iteration_limit: usize) -> Self {
        self.config.iteration_limit = iteration_limit; self
    }
    /// Stop once the relative WCSSD improvement of an iteration drops below `tolerance`.
    /// Shorthand for [`AbortStrategy::RelativeImprovement`].
    pub fn tolerance(mut self, tolerance: T) -> Self {
        self.config.abort_strategy = AbortStrategy::RelativeImprovement { tolerance }; self
    }
    /// Set the abort-strategy to use during a running fit. For more information,
    /// see documentation of [`AbortStrategy`].
    /// ## Default
    /// [`AbortStrategy::RelativeImprovement`] `{ tolerance: 1e-6 }`
    pub fn abort_strategy(mut self, abort_strategy: AbortStrategy<T>) -> Self {
        self.config.abort_strategy = abort_strategy; self
    }
    /// Set the initialization method used when no explicit initialization parameters are set.
    /// ## Default
    /// [`InitMethod::Random`]
    pub fn init(mut self, init: InitMethod) -> Self {
        self.config.init = init; self
    }
    /// Start from explicit initial cluster samples and/or assignments, e.g. the
    /// [`FitResult::init_params`] of an earlier fit.
    pub fn initialization_params(mut self, init_params: InitParams) -> Self {
        self.config.init_params = init_params; self
    }
    /// Seed the random number generator. Use this for deterministically repeatable results;
    /// without it, every fit draws (and reports) a fresh seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed); self
    }
    /// Remove clusters that own no sample after the last iteration, renumbering the remaining ones.
    /// ## Default
    /// false
    pub fn remove_empty_clusters(mut self, remove_empty: bool) -> Self {
        self.config.remove_empty = remove_empty; self
    }
    /// Set the number of worker threads. 0 uses as many as rayon would by default.
    pub fn no_cores(mut self, no_cores: usize) -> Self {
        self.config.no_cores = no_cores; self
    }
    /// Set a numeric parameter read by the variants, see [`crate::additional`].
    /// Unknown keys are kept and reported in the run metrics.
    pub fn additional_param(mut self, key: &str, value: f64) -> Self {
        self.config.additional_params.retain(|(k, _)| k != key);
        self.config.additional_params.push((key.to_string(), value)); self
    }
    /// Attach free-form information, reported verbatim in the `info` section of the run metrics.
    pub fn additional_info(mut self, key: &str, value: &str) -> Self {
        self.config.info.retain(|(k, _)| k != key);
        self.config.info.push((key.to_string(), value.to_string())); self
    }
    /// Set the token that cancels running fits of this configuration.
    pub fn cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.config.cancellation = cancellation; self
    }
    /// Set the callback that should be called after the centroid initialization, before the iteration starts.
    pub fn init_done(mut self, init_done: InitDoneCallbackFn<'a, T>) -> Self {
        self.config.init_done = init_done; self
    }
    /// Set the callback that should be called after each iteration during a running fit.
    pub fn iteration_done(mut self, iteration_done: IterationDoneCallbackFn<'a, T>) -> Self {
        self.config.iteration_done = iteration_done; self
    }
    /// Return the validated configuration.
    /// ## Errors
    /// [`KMeansError::Config`] for k < 1, an iteration limit < 1, a non-positive tolerance or an
    /// invalid additional parameter value.
    pub fn build(self) -> Result<KMeansConfig<'a, T>> {
        self.config.validate()?;
        Ok(self.config)
    }
}


/// How a fit ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitStatus {
    /// No assignment changed, or the objective stopped improving
    Converged,
    /// The iteration limit was reached first
    StoppedByLimit,
    /// The cancellation token was set; the result is the one of the last completed iteration
    Cancelled,
}

impl FitStatus {
    pub fn name(&self) -> &'static str {
        match self {
            FitStatus::Converged => "converged",
            FitStatus::StoppedByLimit => "iteration_limit",
            FitStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a fit.
///
/// ## Fields
/// - **clusters**: The final centers, with the number of samples assigned to each
/// - **assignments**: Cluster of every sample
/// - **distances**: Squared distance of every sample to its cluster's final center
/// - **wcssd**: Sum of **distances**
/// - **iterations**: Number of completed iterations
/// - **status**: Why the fit stopped
/// - **metrics**: Everything the fit recorded about itself
/// - **init_params**: Initialization that reproduces this fit's first iteration
#[derive(Clone, Debug)]
pub struct FitResult<T: Primitive> {
    pub clusters: ClusterSet<T>,
    pub assignments: Vec<usize>,
    pub distances: Vec<T>,
    pub wcssd: T,
    pub iterations: usize,
    pub status: FitStatus,
    pub metrics: MetricsRecord,
    pub init_params: InitParams,
}


/// Entrypoint of this crate's API-Surface.
///
/// A model owns its configuration and the centers of its latest fit (or of centers loaded from a
/// file). Predictions are answered by a [`PredictEngine`] that is built on first use and dropped
/// whenever the centers are replaced.
///
/// ## Supported variants
/// See [`Algorithm`]. All variants produce the same clustering, they differ in speed and memory.
///
/// ## Supported initialization methods
/// - Random-Sample [`InitMethod::Random`]
/// - K-Mean++ [`InitMethod::KMeansPlusPlus`]
/// - Explicit [`InitParams`], see [`KMeansConfigBuilder::initialization_params`]
pub struct KMeans<'a, T: Primitive> {
    config: KMeansConfig<'a, T>,
    result: Option<FitResult<T>>,
    centers: Option<Arc<ClusterSet<T>>>,
    engine: OnceLock<PredictEngine<T>>,
}
impl<'a, T: Primitive> KMeans<'a, T> {
    pub fn new(config: KMeansConfig<'a, T>) -> Self {
        Self { config, result: None, centers: None, engine: OnceLock::new() }
    }

    pub fn config(&self) -> &KMeansConfig<'a, T> { &self.config }

    /// Cluster `samples`.
    ///
    /// ## Returns
    /// The [`FitResult`], which the model keeps until the next fit.
    ///
    /// ## Errors
    /// - [`KMeansError::Config`] if there are fewer samples than clusters
    /// - [`KMeansError::InitParams`] if the explicit initialization does not fit the dataset
    pub fn fit(&mut self, samples: &SparseMatrix<T>) -> Result<&FitResult<T>> {
        let result = driver::fit(samples, &self.config)?;
        self.replace_centers(result.clusters.clone());
        Ok(self.result.insert(result))
    }

    /// Cluster a dataset given as libsvm text.
    pub fn fit_libsvm_str(&mut self, text: &str) -> Result<&FitResult<T>> {
        let samples = SparseMatrix::parse_libsvm(text)?;
        self.fit(&samples)
    }

    /// Cluster a dataset stored as libsvm file.
    pub fn fit_path<P: AsRef<Path>>(&mut self, path: P) -> Result<&FitResult<T>> {
        let samples = SparseMatrix::load_libsvm(path)?;
        self.fit(&samples)
    }

    /// Fit, then assign `samples` to the nearest of the final centers.
    pub fn fit_predict(&mut self, samples: &SparseMatrix<T>) -> Result<Prediction<T>> {
        self.fit(samples)?;
        self.predict(samples)
    }

    /// Assign every row of `samples` to its nearest center.
    pub fn predict(&self, samples: &SparseMatrix<T>) -> Result<Prediction<T>> {
        Ok(self.engine()?.assign(samples))
    }

    /// Nearest center of one sample and the squared distance to it.
    pub fn predict_one(&self, sample: SparseRow<'_, T>) -> Result<(usize, T)> {
        Ok(self.engine()?.assign_one(sample))
    }

    /// A prediction engine for the current centers that outlives the model's next fit.
    pub fn predict_engine(&self) -> Result<PredictEngine<T>> {
        Ok(self.engine()?.clone())
    }

    pub fn cluster_centers(&self) -> Result<&ClusterSet<T>> {
        self.centers.as_deref().ok_or(KMeansError::NotFitted)
    }

    /// The current centers in libsvm format, one line per cluster labelled with its index.
    pub fn centers_to_libsvm_string(&self) -> Result<String> {
        Ok(self.cluster_centers()?.to_matrix().to_libsvm_string())
    }

    pub fn store_centers<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.cluster_centers()?.to_matrix().store_libsvm(path)
    }

    /// Use stored centers for prediction, without fitting. Drops the result of an earlier fit.
    pub fn load_centers(&mut self, centers: &SparseMatrix<T>) -> Result<()> {
        if centers.is_empty() {
            return Err(KMeansError::config("no cluster centers given"));
        }
        let (key, default) = additional::DENSE_CENTER_RATIO;
        let dense_ratio = self.config.additional_param(key).unwrap_or(default);
        self.result = None;
        self.replace_centers(ClusterSet::from_matrix(centers, dense_ratio));
        Ok(())
    }

    pub fn load_centers_str(&mut self, text: &str) -> Result<()> {
        let centers = SparseMatrix::parse_libsvm(text)?;
        self.load_centers(&centers)
    }

    pub fn load_centers_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let centers = SparseMatrix::load_libsvm(path)?;
        self.load_centers(&centers)
    }

    /// The metrics of the latest fit.
    pub fn tracked_params(&self) -> Result<&MetricsRecord> {
        self.result.as_ref().map(|r| &r.metrics).ok_or(KMeansError::NotFitted)
    }

    /// The initialization parameters that replay the latest fit.
    pub fn output_init_params(&self) -> Result<&InitParams> {
        self.result.as_ref().map(|r| &r.init_params).ok_or(KMeansError::NotFitted)
    }

    pub fn result(&self) -> Option<&FitResult<T>> { self.result.as_ref() }

    fn replace_centers(&mut self, clusters: ClusterSet<T>) {
        self.centers = Some(Arc::new(clusters));
        self.engine = OnceLock::new();
    }

    fn engine(&self) -> Result<&PredictEngine<T>> {
        let centers = self.centers.as_ref().ok_or(KMeansError::NotFitted)?;
        Ok(self.engine.get_or_init(|| PredictEngine::new(Arc::clone(centers))))
    }
}
