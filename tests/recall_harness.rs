//! End-to-end recall tests: dataset -> ground truth -> engine -> metrics -> verdict.
//!
//! Run with: cargo test --test recall_harness

mod common;

use common::temp_harness;
use forge_recall::dataset::{catalog, vecs, DatasetSource, Distribution, SyntheticSpec};
use forge_recall::engine::{engine_builder, FlatIndex, HnswIndex, IvfFlatIndex, SearchBatch};
use forge_recall::groundtruth::GroundTruthSource;
use forge_recall::targets::TargetMetric;
use forge_recall::{
    Metric, ParameterSweep, RecallError, RecallTargets, RecallTestConfig, SearchEngine,
    TestOutcome, TestStage,
};
use std::time::Duration;

fn uniform_1000x16() -> DatasetSource {
    DatasetSource::synthetic(1000, 16, 10)
}

#[test]
fn test_exact_baseline_scores_perfect_recall() {
    let (_dir, harness) = temp_harness();
    let test = RecallTestConfig::new("Flat", FlatIndex::builder())
        .index_type("Flat")
        .dataset(uniform_1000x16())
        .k(10)
        .recall_targets(RecallTargets::none().with_min_recall10(1.0));

    let result = harness.run_test(&test);

    assert!(result.passed(), "error: {:?}", result.error);
    assert_eq!(result.metrics.recall1, 1.0);
    assert_eq!(result.metrics.recall10, 1.0);
    assert_eq!(result.metrics.recall100, 1.0);
    assert!(result.perf.p99 > Duration::ZERO);
    assert!(result.perf.qps > 0.0);
    assert!(result.violations.is_empty());
}

#[test]
fn test_impossible_threshold_yields_single_violation() {
    let (_dir, harness) = temp_harness();
    let test = RecallTestConfig::new("Flat_impossible", FlatIndex::builder())
        .dataset(uniform_1000x16())
        .recall_targets(RecallTargets::none().with_min_recall10(1.01));

    let result = harness.run_test(&test);

    assert!(!result.passed());
    assert_eq!(result.outcome, TestOutcome::Failed);
    assert_eq!(result.stage, TestStage::Done);
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].metric(), TargetMetric::Recall10);
}

#[test]
fn test_self_consistency_across_distributions_and_metrics() {
    let (_dir, harness) = temp_harness();
    let distributions = [
        Distribution::UniformRandom,
        Distribution::GaussianClustered,
        Distribution::PowerLaw,
        Distribution::Normalized,
        Distribution::sparse(),
    ];

    for distribution in distributions {
        for metric in [Metric::L2, Metric::InnerProduct] {
            let spec = SyntheticSpec::new(300, 12, 8).distribution(distribution);
            let test = RecallTestConfig::new(format!("{}-{}", distribution.name(), metric), FlatIndex::builder())
                .dataset(DatasetSource::Synthetic(spec))
                .metric(metric)
                .k(20)
                .recall_targets(RecallTargets::none().with_min_recall1(1.0).with_min_recall10(1.0));

            let result = harness.run_test(&test);
            assert!(
                result.passed(),
                "{} with {}: {} {:?}",
                distribution.name(),
                metric,
                result.metrics,
                result.error
            );
        }
    }
}

#[test]
fn test_recall_bounded_for_approximate_engines() {
    let (_dir, harness) = temp_harness();
    let source = DatasetSource::Synthetic(
        SyntheticSpec::new(2000, 16, 20).distribution(Distribution::GaussianClustered),
    );
    let configs = vec![
        RecallTestConfig::new("IVF16_nprobe1", IvfFlatIndex::builder(16, 1))
            .needs_training(true)
            .dataset(source.clone())
            .k(100),
        RecallTestConfig::new("HNSW8_ef10", HnswIndex::builder(8, 40, 10))
            .dataset(source)
            .k(100),
    ];

    let report = ParameterSweep::new(&harness).run("bounded", &configs);
    for r in &report.results {
        assert_eq!(r.outcome, TestOutcome::Passed, "{}: {:?}", r.name(), r.error);
        for recall in [r.metrics.recall1, r.metrics.recall10, r.metrics.recall100] {
            assert!((0.0..=1.0).contains(&recall), "{}: {}", r.name(), recall);
        }
    }
}

#[test]
fn test_nprobe_sweep_improves_recall() {
    let (_dir, harness) = temp_harness();
    let source = DatasetSource::Synthetic(SyntheticSpec::new(2000, 16, 20).seed(11));
    let configs: Vec<_> = [1, 4, 32]
        .into_iter()
        .map(|nprobe| {
            RecallTestConfig::new(format!("IVF32_nprobe{nprobe}"), IvfFlatIndex::builder(32, 1))
                .needs_training(true)
                .dataset(source.clone())
                .search_param("nprobe", nprobe)
        })
        .collect();

    let report = ParameterSweep::new(&harness).run("IVF_nprobe_Sweep", &configs);
    let r1 = report.get("IVF32_nprobe1").unwrap().metrics.recall10;
    let r32 = report.get("IVF32_nprobe32").unwrap().metrics.recall10;
    // Probing every list is exhaustive.
    assert_eq!(r32, 1.0);
    assert!(r1 <= r32);
    assert_eq!(report.best_by_recall10().unwrap().metrics.recall10, 1.0);
}

#[test]
fn test_insufficient_training_data_is_skipped() {
    let (_dir, harness) = temp_harness();
    let test = RecallTestConfig::new("IVF1024", IvfFlatIndex::builder(1024, 8))
        .needs_training(true)
        .dataset(DatasetSource::synthetic(500, 8, 5));

    let result = harness.run_test(&test);
    assert!(result.is_skipped());
    assert!(matches!(
        result.error,
        Some(RecallError::InsufficientTrainingData {
            required: 1024,
            actual: 500
        })
    ));
}

#[test]
fn test_unknown_search_parameter_errors() {
    let (_dir, harness) = temp_harness();
    let test = RecallTestConfig::new("HNSW_bad_param", HnswIndex::default_builder())
        .dataset(DatasetSource::synthetic(200, 8, 5))
        .search_param("nprobe", 4);

    let result = harness.run_test(&test);
    assert_eq!(result.outcome, TestOutcome::Errored);
    assert!(matches!(result.error, Some(RecallError::InvalidParameter(_))));
}

/// Wraps the flat engine and fails the search for one query.
struct FailingSearch {
    inner: FlatIndex,
    fail_after: std::sync::atomic::AtomicUsize,
}

impl SearchEngine for FailingSearch {
    fn name(&self) -> String {
        "FailingSearch".into()
    }
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
    fn metric(&self) -> Metric {
        self.inner.metric()
    }
    fn train(&mut self, vectors: &[f32]) -> forge_recall::Result<()> {
        self.inner.train(vectors)
    }
    fn is_trained(&self) -> bool {
        self.inner.is_trained()
    }
    fn add(&mut self, vectors: &[f32]) -> forge_recall::Result<()> {
        self.inner.add(vectors)
    }
    fn search(&self, queries: &[f32], k: usize) -> forge_recall::Result<SearchBatch> {
        use std::sync::atomic::Ordering;
        if self.fail_after.fetch_sub(1, Ordering::SeqCst) == 0 {
            return Err(RecallError::invalid_parameter("engine fault"));
        }
        self.inner.search(queries, k)
    }
    fn ntotal(&self) -> u64 {
        self.inner.ntotal()
    }
}

#[test]
fn test_search_failure_reports_query_index() {
    let (_dir, harness) = temp_harness();
    let builder = engine_builder(|d, metric| {
        Ok(Box::new(FailingSearch {
            inner: FlatIndex::new(d, metric)?,
            fail_after: std::sync::atomic::AtomicUsize::new(3),
        }) as Box<dyn SearchEngine>)
    });
    let result = harness.run_test(
        &RecallTestConfig::new("failing", builder).dataset(DatasetSource::synthetic(100, 4, 10)),
    );

    assert_eq!(result.outcome, TestOutcome::Errored);
    assert_eq!(result.stage, TestStage::Populated);
    match &result.error {
        Some(RecallError::SearchFailure { query, .. }) => assert_eq!(*query, 3),
        other => panic!("expected search failure, got {:?}", other),
    }
    let source = std::error::Error::source(result.error.as_ref().unwrap()).unwrap();
    assert!(source.to_string().contains("engine fault"));
}

#[test]
fn test_named_dataset_uses_bundled_ground_truth() {
    let (dir, harness) = temp_harness();
    let root = dir.path().join("testdata").join("embeddings");
    std::fs::create_dir_all(&root).unwrap();

    let n = 64;
    let d = 4;
    let base: Vec<f32> = (0..n * d).map(|i| (i * 7 % 31) as f32).collect();
    let queries = base[..3 * d].to_vec();
    vecs::write_fvecs(root.join("sift10k_base.fvecs"), &base, d).unwrap();
    vecs::write_fvecs(root.join("sift10k_query.fvecs"), &queries, d).unwrap();

    // Exact neighbors computed here so the bundled file is correct.
    let exact = harness
        .computer()
        .compute(&base, &queries, d, 10, Metric::L2)
        .unwrap();
    let rows: Vec<Vec<i64>> = exact.entries.iter().map(|e| e.ids.clone()).collect();
    vecs::write_ivecs(root.join("sift10k_groundtruth.ivecs"), &rows).unwrap();
    assert!(catalog::lookup("SIFT10K").unwrap().is_available(&dir.path().join("testdata")));

    let test = RecallTestConfig::new("Flat_SIFT10K", FlatIndex::builder())
        .dataset(DatasetSource::named("SIFT10K"))
        .recall_targets(RecallTargets::none().with_min_recall10(1.0));
    let result = harness.run_test(&test);

    assert!(result.passed(), "{:?}", result.error);
    assert_eq!(result.ground_truth_source, Some(GroundTruthSource::Bundled));
}

#[test]
fn test_missing_named_dataset_is_skipped() {
    let (_dir, harness) = temp_harness();
    let test = RecallTestConfig::new("Flat_SIFT1M", FlatIndex::builder()).dataset(DatasetSource::named("SIFT1M"));
    let result = harness.run_test(&test);
    assert!(result.is_skipped());
    assert!(result.error.unwrap().is_dataset_unavailable());
}
