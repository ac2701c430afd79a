//! Parameter sweeps over many index configurations.
//!
//! A sweep runs every configuration through one [`Harness`], so all of them
//! share the harness's datasets and ground truth. Results come back in
//! configuration order together with a comparative summary table.
//!
//! [`ParameterSweep::run`] is sequential. [`ParameterSweep::run_parallel`]
//! spreads configurations over the rayon pool; each configuration still owns
//! its engine, but co-scheduled tests compete for CPU and their latency
//! numbers are inflated accordingly. Use it for recall, not for timing.

use crate::metrics::round_to_micros;
use crate::recall::{Harness, RecallTestConfig, RecallTestResult, TestOutcome};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::time::Instant;
use tracing::info;

const SEPARATOR_WIDTH: usize = 85;

/// Runs a named batch of configurations.
pub struct ParameterSweep<'a> {
    harness: &'a Harness,
}

impl<'a> ParameterSweep<'a> {
    pub fn new(harness: &'a Harness) -> Self {
        Self { harness }
    }

    /// Run each configuration in order on the calling thread.
    pub fn run(&self, name: &str, configs: &[RecallTestConfig]) -> SweepReport {
        let start = Instant::now();
        let results = configs.iter().map(|c| self.harness.run_test(c)).collect();
        self.finish(name, results, start)
    }

    /// Run configurations concurrently; results keep configuration order.
    pub fn run_parallel(&self, name: &str, configs: &[RecallTestConfig]) -> SweepReport {
        let start = Instant::now();
        let results = configs.par_iter().map(|c| self.harness.run_test(c)).collect();
        self.finish(name, results, start)
    }

    fn finish(&self, name: &str, results: Vec<RecallTestResult>, start: Instant) -> SweepReport {
        let report = SweepReport {
            name: name.to_string(),
            results,
        };
        info!(
            sweep = name,
            configs = report.results.len(),
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            errored = report.errored(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sweep finished\n{}",
            report.summary()
        );
        report
    }
}

/// Results of one sweep in configuration order.
#[derive(Debug)]
pub struct SweepReport {
    pub name: String,
    pub results: Vec<RecallTestResult>,
}

impl SweepReport {
    fn count(&self, outcome: TestOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn passed(&self) -> usize {
        self.count(TestOutcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(TestOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestOutcome::Skipped)
    }

    pub fn errored(&self) -> usize {
        self.count(TestOutcome::Errored)
    }

    /// True when nothing failed or errored. Skips do not count against it.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0 && self.errored() == 0
    }

    /// The measured configuration with the highest recall@10.
    pub fn best_by_recall10(&self) -> Option<&RecallTestResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, TestOutcome::Passed | TestOutcome::Failed))
            .max_by(|a, b| a.metrics.recall10.total_cmp(&b.metrics.recall10))
    }

    /// Look up a result by configuration name.
    pub fn get(&self, name: &str) -> Option<&RecallTestResult> {
        self.results.iter().find(|r| r.name() == name)
    }

    /// Comparative table, one line per configuration.
    ///
    /// Configurations that never produced metrics show `ERROR` (or
    /// `SKIPPED`) in place of numbers.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} Parameter Sweep Summary:", self.name);
        let _ = writeln!(
            out,
            "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "Configuration", "Recall@1", "Recall@10", "Recall@100", "QPS", "P99"
        );
        let _ = writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH));

        for r in &self.results {
            let status = match r.outcome {
                TestOutcome::Passed => "✓",
                TestOutcome::Failed => "✗",
                TestOutcome::Skipped => {
                    let _ = writeln!(out, "{:<30} {:>10}", r.name(), "SKIPPED");
                    continue;
                }
                TestOutcome::Errored => {
                    let _ = writeln!(out, "{:<30} {:>10}", r.name(), "ERROR");
                    continue;
                }
            };
            let _ = writeln!(
                out,
                "{} {:<28} {:>10.4} {:>10.4} {:>10.4} {:>10.0} {:>10}",
                status,
                r.name(),
                r.metrics.recall1,
                r.metrics.recall10,
                r.metrics.recall100,
                r.perf.qps,
                format!("{:?}", round_to_micros(r.perf.p99)),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::dataset::DatasetSource;
    use crate::engine::{engine_builder, FlatIndex, HnswIndex};
    use crate::error::RecallError;
    use crate::targets::RecallTargets;
    use tempfile::TempDir;

    fn harness(dir: &TempDir) -> Harness {
        Harness::new(HarnessConfig::default().with_cache_root(dir.path()))
    }

    fn configs() -> Vec<RecallTestConfig> {
        let source = DatasetSource::synthetic(300, 8, 5);
        vec![
            RecallTestConfig::new("flat", FlatIndex::builder()).dataset(source.clone()),
            RecallTestConfig::new("impossible", FlatIndex::builder())
                .dataset(source.clone())
                .recall_targets(RecallTargets::none().with_min_recall10(1.01)),
            RecallTestConfig::new(
                "broken",
                engine_builder(|_, _| Err(RecallError::invalid_parameter("no"))),
            )
            .dataset(source.clone()),
            RecallTestConfig::new("missing", FlatIndex::builder()).dataset(DatasetSource::named("GIST1M")),
            RecallTestConfig::new("hnsw", HnswIndex::default_builder()).dataset(source),
        ]
    }

    #[test]
    fn test_sweep_counts_and_order() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir);
        let report = ParameterSweep::new(&h).run("mixed", &configs());

        let names: Vec<_> = report.results.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["flat", "impossible", "broken", "missing", "hnsw"]);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.errored(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.passed(), 2);
        assert!(!report.all_passed());
        assert_eq!(report.get("impossible").unwrap().violations.len(), 1);
    }

    #[test]
    fn test_shared_dataset_computes_ground_truth_once() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir);
        let report = ParameterSweep::new(&h).run("shared", &configs());
        assert_eq!(h.provider().prepared_count(), 1);
        let sources: Vec<_> = report
            .results
            .iter()
            .filter_map(|r| r.ground_truth_source)
            .collect();
        assert_eq!(sources[0], crate::groundtruth::GroundTruthSource::Computed);
        assert!(sources[1..]
            .iter()
            .all(|s| *s == crate::groundtruth::GroundTruthSource::Cache));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir);
        let sweep = ParameterSweep::new(&h);
        let seq = sweep.run("seq", &configs());
        let par = sweep.run_parallel("par", &configs());

        for (a, b) in seq.results.iter().zip(&par.results) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.outcome, b.outcome);
            assert_eq!(a.metrics, b.metrics);
        }
    }

    #[test]
    fn test_summary_table() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir);
        let report = ParameterSweep::new(&h).run("table", &configs());
        let summary = report.summary();
        let lines: Vec<_> = summary.lines().collect();

        assert_eq!(lines[0], "table Parameter Sweep Summary:");
        assert!(lines[1].starts_with("Configuration"));
        assert_eq!(lines[2], "-".repeat(85));
        assert!(lines[3].starts_with("✓ flat"));
        assert!(lines[3].contains("1.0000"));
        assert!(lines[4].starts_with("✗ impossible"));
        assert!(lines[5].starts_with("broken") && lines[5].ends_with("ERROR"));
        assert!(lines[6].starts_with("missing") && lines[6].ends_with("SKIPPED"));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_best_by_recall10_ignores_unmeasured() {
        let dir = TempDir::new().unwrap();
        let h = harness(&dir);
        let report = ParameterSweep::new(&h).run("best", &configs());
        let best = report.best_by_recall10().unwrap();
        assert_eq!(best.metrics.recall10, 1.0);
        assert!(matches!(best.outcome, TestOutcome::Passed | TestOutcome::Failed));
    }
}
