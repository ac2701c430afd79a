//! IVF nprobe sweep against a cached exact baseline.
//!
//! Run with: cargo run --release --example ivf_sweep
//!
//! Sizes follow the CI profile when a CI variable is set, so the same demo
//! runs quickly on shared runners. Set `FORGE_RECALL_CACHE_DIR` to keep the
//! ground truth somewhere other than `target/groundtruth-cache`.

use forge_recall::config::RecallThresholds;
use forge_recall::dataset::{DatasetSource, Distribution};
use forge_recall::engine::{FlatIndex, HnswIndex, IvfFlatIndex};
use forge_recall::{
    Harness, HarnessConfig, ParameterSweep, RecallTargets, RecallTestConfig, TargetPreset,
};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config = HarnessConfig::from_env();
    let size = config.dataset_size("ivf_recall");
    let profile = config.profile;
    let harness = Harness::new(config);

    let source = DatasetSource::Synthetic(
        harness
            .config()
            .synthetic_spec(size.n, size.d, size.nq)
            .distribution(Distribution::GaussianClustered),
    );
    let nlist = ((size.n as f64).sqrt() as usize).max(1);
    let thresholds = RecallThresholds::new(
        RecallTargets::preset(TargetPreset::Approximate),
        RecallTargets::preset(TargetPreset::HighThroughput),
    );

    let mut configs = vec![RecallTestConfig::new("Flat", FlatIndex::builder())
        .index_type("Flat")
        .dataset(source.clone())
        .k(size.k)
        .recall_targets(RecallTargets::preset(TargetPreset::HighPrecision))];

    for nprobe in [1, 2, 4, 8, 16, 32] {
        configs.push(
            RecallTestConfig::new(
                format!("IVF{nlist}_nprobe{nprobe}"),
                IvfFlatIndex::builder(nlist, 1),
            )
            .index_type("IVF")
            .needs_training(true)
            .train_size(size.n / 2)
            .dataset(source.clone())
            .k(size.k)
            .search_param("nprobe", nprobe)
            .recall_targets(if nprobe >= 8 {
                thresholds.for_profile(profile)
            } else {
                RecallTargets::none()
            }),
        );
    }

    for ef in [16, 64] {
        configs.push(
            RecallTestConfig::new(format!("HNSW16_ef{ef}"), HnswIndex::builder(16, 200, 16))
                .index_type("HNSW")
                .dataset(source.clone())
                .k(size.k)
                .search_param("ef_search", ef),
        );
    }

    let report = ParameterSweep::new(&harness).run("IVF_nprobe_Sweep", &configs);
    println!("{}", report.summary());

    if let Some(best) = report.best_by_recall10() {
        println!(
            "best recall@10: {} ({:.4}, {:.0} QPS)",
            best.name(),
            best.metrics.recall10,
            best.perf.qps
        );
    }
    for r in report.results.iter().filter(|r| !r.violations.is_empty()) {
        for v in &r.violations {
            println!("{}: {}", r.name(), v);
        }
    }

    if !report.all_passed() {
        std::process::exit(1);
    }
}
