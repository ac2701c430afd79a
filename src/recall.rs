//! Recall test orchestration.
//!
//! A [`Harness`] runs one [`RecallTestConfig`] through the full lifecycle:
//!
//! ```text
//! Created -> (Trained) -> Populated -> Searched -> Validated -> Done
//! ```
//!
//! The first failing stage finalizes the result with its error attached and
//! the remaining stages are skipped. Nothing is retried. Threshold misses are
//! not stage failures: every target is checked and the misses are itemized on
//! the result.
//!
//! # Example
//!
//! ```ignore
//! use forge_recall::{Harness, HarnessConfig, RecallTestConfig, RecallTargets};
//! use forge_recall::engine::IvfFlatIndex;
//! use forge_recall::dataset::DatasetSource;
//!
//! let harness = Harness::new(HarnessConfig::from_env());
//! let test = RecallTestConfig::new("IVF64_nprobe8", IvfFlatIndex::builder(64, 8))
//!     .needs_training(true)
//!     .dataset(DatasetSource::synthetic(10_000, 128, 100))
//!     .recall_targets(RecallTargets::none().with_min_recall10(0.9));
//!
//! let result = harness.run_test(&test);
//! assert!(result.passed());
//! ```

use crate::config::HarnessConfig;
use crate::dataset::{Dataset, DatasetProvider, DatasetSource};
use crate::distance::Metric;
use crate::engine::{EngineBuilder, SearchEngine};
use crate::error::{RecallError, Result};
use crate::groundtruth::{
    GroundTruth, GroundTruthCache, GroundTruthComputer, GroundTruthEntry, GroundTruthSource,
};
use crate::metrics::{self, PerformanceMetrics, RecallMetrics};
use crate::targets::{self, PerformanceTargets, RecallTargets, TargetViolation};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One index configuration under test.
///
/// Built with the fluent setters below and not changed once handed to a
/// harness or sweep.
#[derive(Clone)]
pub struct RecallTestConfig {
    pub name: String,
    /// Free-form description of the index family, e.g. `"IVF"`.
    pub index_type: String,
    pub builder: EngineBuilder,
    pub needs_training: bool,
    /// Train on only the first `train_size` vectors.
    pub train_size: Option<usize>,
    pub source: DatasetSource,
    pub recall_targets: RecallTargets,
    pub perf_targets: PerformanceTargets,
    /// Neighbors requested per query.
    pub k: usize,
    pub metric: Metric,
    /// Named search parameters applied through the engine's tunable capability.
    pub search_params: Vec<(String, usize)>,
    /// Report a missing named dataset as skipped instead of errored.
    pub skip_if_no_data: bool,
}

impl RecallTestConfig {
    /// A configuration with defaults: 1000×128 uniform synthetic data, 10
    /// queries, `k = 10`, L2, no training, no targets.
    pub fn new(name: impl Into<String>, builder: EngineBuilder) -> Self {
        Self {
            name: name.into(),
            index_type: String::new(),
            builder,
            needs_training: false,
            train_size: None,
            source: DatasetSource::synthetic(1000, 128, 10),
            recall_targets: RecallTargets::none(),
            perf_targets: PerformanceTargets::none(),
            k: 10,
            metric: Metric::L2,
            search_params: Vec::new(),
            skip_if_no_data: true,
        }
    }

    pub fn index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = index_type.into();
        self
    }

    pub fn needs_training(mut self, needs_training: bool) -> Self {
        self.needs_training = needs_training;
        self
    }

    pub fn train_size(mut self, train_size: usize) -> Self {
        self.train_size = Some(train_size);
        self
    }

    pub fn dataset(mut self, source: DatasetSource) -> Self {
        self.source = source;
        self
    }

    pub fn recall_targets(mut self, targets: RecallTargets) -> Self {
        self.recall_targets = targets;
        self
    }

    pub fn performance_targets(mut self, targets: PerformanceTargets) -> Self {
        self.perf_targets = targets;
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Add a named search parameter, e.g. `("nprobe", 8)`.
    pub fn search_param(mut self, name: impl Into<String>, value: usize) -> Self {
        self.search_params.push((name.into(), value));
        self
    }

    pub fn skip_if_no_data(mut self, skip: bool) -> Self {
        self.skip_if_no_data = skip;
        self
    }

    fn has_recall_targets(&self) -> bool {
        let t = &self.recall_targets;
        [t.min_recall1, t.min_recall10, t.min_recall100]
            .iter()
            .any(|m| m.is_some_and(|v| v > 0.0))
    }
}

impl fmt::Debug for RecallTestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecallTestConfig")
            .field("name", &self.name)
            .field("index_type", &self.index_type)
            .field("needs_training", &self.needs_training)
            .field("train_size", &self.train_size)
            .field("source", &self.source)
            .field("recall_targets", &self.recall_targets)
            .field("perf_targets", &self.perf_targets)
            .field("k", &self.k)
            .field("metric", &self.metric)
            .field("search_params", &self.search_params)
            .field("skip_if_no_data", &self.skip_if_no_data)
            .finish_non_exhaustive()
    }
}

/// Lifecycle stage a test has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TestStage {
    Created,
    Trained,
    Populated,
    Searched,
    Validated,
    Done,
}

/// Final verdict of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// Every configured target was met.
    Passed,
    /// Metrics were measured but at least one target was missed.
    Failed,
    /// The test could not run for an accepted reason (missing dataset,
    /// too little training data on synthetic data).
    Skipped,
    /// A stage failed before metrics could be computed.
    Errored,
}

/// Everything measured for one configuration.
#[derive(Debug)]
pub struct RecallTestResult {
    pub config: RecallTestConfig,
    pub metrics: RecallMetrics,
    pub perf: PerformanceMetrics,
    pub memory_bytes: u64,
    pub outcome: TestOutcome,
    /// Last stage reached.
    pub stage: TestStage,
    pub violations: Vec<TargetViolation>,
    pub error: Option<RecallError>,
    pub ground_truth_source: Option<GroundTruthSource>,
}

impl RecallTestResult {
    fn new(config: &RecallTestConfig) -> Self {
        Self {
            config: config.clone(),
            metrics: RecallMetrics::default(),
            perf: PerformanceMetrics::default(),
            memory_bytes: 0,
            outcome: TestOutcome::Errored,
            stage: TestStage::Created,
            violations: Vec::new(),
            error: None,
            ground_truth_source: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == TestOutcome::Skipped
    }
}

/// Raw per-query output of the search stage.
struct SearchRun {
    results: Vec<Vec<i64>>,
    latencies: Vec<Duration>,
}

/// Runs recall tests against shared datasets and a shared ground-truth cache.
///
/// Safe to share across threads; every test builds its own engine.
pub struct Harness {
    config: HarnessConfig,
    provider: DatasetProvider,
    computer: GroundTruthComputer,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        let provider = DatasetProvider::new(config.testdata_root.clone());
        let computer = GroundTruthComputer::new(GroundTruthCache::new(config.cache_root.clone()));
        Self {
            config,
            provider,
            computer,
        }
    }

    /// Replace the exact baseline used to compute ground truth.
    pub fn with_baseline(mut self, baseline: EngineBuilder) -> Self {
        self.computer = self.computer.with_baseline(baseline);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn provider(&self) -> &DatasetProvider {
        &self.provider
    }

    pub fn computer(&self) -> &GroundTruthComputer {
        &self.computer
    }

    /// Run one configuration to completion.
    ///
    /// Never panics on engine errors and never returns early to the caller:
    /// failures are recorded on the returned result.
    pub fn run_test(&self, test: &RecallTestConfig) -> RecallTestResult {
        let mut result = RecallTestResult::new(test);
        let start = Instant::now();

        match self.execute(test, &mut result) {
            Ok(()) => {
                result.stage = TestStage::Done;
                if result.violations.is_empty() {
                    result.outcome = TestOutcome::Passed;
                    info!(test = %test.name, elapsed_ms = start.elapsed().as_millis() as u64, "✓ passed all targets");
                } else {
                    result.outcome = TestOutcome::Failed;
                    info!(
                        test = %test.name,
                        violations = result.violations.len(),
                        "✗ failed some targets"
                    );
                }
            }
            Err(e) if self.should_skip(test, &e) => {
                info!(test = %test.name, reason = %e, "skipped");
                result.outcome = TestOutcome::Skipped;
                result.error = Some(e);
            }
            Err(e) => {
                warn!(test = %test.name, stage = ?result.stage, error = %e, "test errored");
                result.outcome = TestOutcome::Errored;
                result.error = Some(e);
            }
        }
        result
    }

    fn should_skip(&self, test: &RecallTestConfig, err: &RecallError) -> bool {
        if err.is_dataset_unavailable() {
            return test.skip_if_no_data;
        }
        if err.is_insufficient_training_data() {
            // Synthetic sizes are arbitrary; real datasets with explicit
            // targets are expected to train.
            return matches!(test.source, DatasetSource::Synthetic(_)) || !test.has_recall_targets();
        }
        false
    }

    fn execute(&self, test: &RecallTestConfig, result: &mut RecallTestResult) -> Result<()> {
        if test.k == 0 {
            return Err(RecallError::invalid_parameter("k must be positive"));
        }

        let dataset = self.provider.provide(&test.source)?;
        info!(
            test = %test.name,
            dataset = dataset.name(),
            n = dataset.n(),
            d = dataset.d(),
            nq = dataset.nq(),
            "starting recall test"
        );

        let ground_truth = self.ground_truth(&dataset, test)?;
        result.ground_truth_source = Some(ground_truth.source);

        let mut engine = (test.builder)(dataset.d(), test.metric)?;
        debug!(test = %test.name, engine = %engine.name(), "engine created");
        apply_search_params(&mut *engine, &test.search_params)?;

        if test.needs_training {
            let sample = dataset.training_prefix(test.train_size);
            debug!(test = %test.name, vectors = sample.len() / dataset.d(), "training");
            engine.train(sample).map_err(RecallError::training)?;
            if !engine.is_trained() {
                return Err(RecallError::NotTrained);
            }
            result.stage = TestStage::Trained;
        }

        debug!(test = %test.name, vectors = dataset.n(), "adding vectors");
        engine.add(dataset.vectors()).map_err(RecallError::add)?;
        let expected = dataset.n() as u64;
        let actual = engine.ntotal();
        if actual != expected {
            return Err(RecallError::CountMismatch { expected, actual });
        }
        result.memory_bytes = engine.memory_bytes();
        result.stage = TestStage::Populated;

        debug!(test = %test.name, queries = dataset.nq(), k = test.k, "searching");
        let run = search_with_timing(&*engine, &dataset, test.k)?;
        result.stage = TestStage::Searched;

        result.metrics = metrics::calculate_all(&ground_truth.entries, &run.results, test.k)?;
        result.perf = metrics::measure_latencies(&run.latencies);
        info!(test = %test.name, quality = %result.metrics, performance = %result.perf, memory_mb = result.memory_bytes / (1024 * 1024), "results");

        result.violations = targets::validate(
            &test.name,
            &test.recall_targets,
            &test.perf_targets,
            &result.metrics,
            &result.perf,
        );
        result.stage = TestStage::Validated;
        Ok(())
    }

    /// Bundled ground truth for named L2 datasets, computed (and cached)
    /// otherwise.
    fn ground_truth(&self, dataset: &Dataset, test: &RecallTestConfig) -> Result<GroundTruth> {
        if let Some(bundled) = dataset.ground_truth().filter(|_| test.metric == Metric::L2) {
            debug!(test = %test.name, "using bundled ground truth");
            return Ok(GroundTruth {
                entries: bundled.iter().cloned().map(GroundTruthEntry::new).collect(),
                source: GroundTruthSource::Bundled,
            });
        }
        self.computer.compute(
            dataset.vectors(),
            dataset.queries(),
            dataset.d(),
            test.k,
            test.metric,
        )
    }
}

fn apply_search_params(engine: &mut dyn SearchEngine, params: &[(String, usize)]) -> Result<()> {
    if params.is_empty() {
        return Ok(());
    }
    let name = engine.name();
    let tunable = engine.tunable().ok_or_else(|| {
        RecallError::invalid_parameter(format!("{name} has no tunable search parameters"))
    })?;
    for (param, value) in params {
        tunable.set_parameter(param, *value)?;
    }
    Ok(())
}

/// One timed search call per query; padding ids are dropped from each row.
fn search_with_timing(engine: &dyn SearchEngine, dataset: &Dataset, k: usize) -> Result<SearchRun> {
    let nq = dataset.nq();
    let mut results = Vec::with_capacity(nq);
    let mut latencies = Vec::with_capacity(nq);

    for q in 0..nq {
        let query = dataset.query(q);
        let start = Instant::now();
        let batch = engine.search(query, k).map_err(|e| RecallError::search(q, e))?;
        latencies.push(start.elapsed());
        if batch.nq != 1 || batch.ids.len() != batch.k {
            return Err(RecallError::search(
                q,
                RecallError::invalid_format(format!(
                    "{} returned {} ids for nq={} k={}",
                    engine.name(),
                    batch.ids.len(),
                    batch.nq,
                    batch.k
                )),
            ));
        }
        results.push(batch.ids_for(0).iter().copied().filter(|&id| id >= 0).collect());
    }

    Ok(SearchRun { results, latencies })
}
