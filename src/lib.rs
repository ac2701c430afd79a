//! forge-recall: recall and performance validation for approximate nearest
//! neighbor indexes.
//!
//! This crate measures how closely an approximate search engine matches an
//! exact baseline, and how fast it answers, across whole parameter sweeps
//! without recomputing the exact answers for every configuration.
//!
//! # Features
//!
//! - **Ground-Truth Cache**: exact results stored on disk under a SHA-256
//!   fingerprint of the input bytes and `(d, k, metric)`
//! - **Datasets**: seeded synthetic generators plus `.fvecs`/`.ivecs` named datasets
//! - **Engine Contract**: train/add/search trait with an optional tunable
//!   parameter capability; flat, IVF and HNSW engines in-tree
//! - **Metrics**: recall@1/10/100, precision, MRR, NDCG, latency percentiles, QPS
//! - **Sweeps**: sequential or rayon-parallel runs with a comparative summary
//!
//! # Example
//!
//! ```
//! use forge_recall::{Harness, HarnessConfig, ParameterSweep, RecallTargets, RecallTestConfig};
//! use forge_recall::dataset::DatasetSource;
//! use forge_recall::engine::{FlatIndex, IvfFlatIndex};
//!
//! let cache = std::env::temp_dir().join("forge-recall-doctest");
//! let harness = Harness::new(HarnessConfig::default().with_cache_root(cache));
//! let source = DatasetSource::synthetic(400, 16, 10);
//!
//! let configs = vec![
//!     RecallTestConfig::new("Flat", FlatIndex::builder())
//!         .dataset(source.clone())
//!         .recall_targets(RecallTargets::none().with_min_recall10(1.0)),
//!     RecallTestConfig::new("IVF8_nprobe2", IvfFlatIndex::builder(8, 2))
//!         .needs_training(true)
//!         .dataset(source),
//! ];
//!
//! let report = ParameterSweep::new(&harness).run("doc", &configs);
//! assert!(report.get("Flat").unwrap().passed());
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod constants;
pub mod dataset;
pub mod distance;
pub mod engine;
pub mod error;
pub mod groundtruth;
pub mod kmeans;
pub mod metrics;
pub mod recall;
pub mod sweep;
pub mod targets;

// Re-export commonly used types at crate root
pub use config::{HarnessConfig, RunProfile};
pub use dataset::{Dataset, DatasetProvider, DatasetSource};
pub use distance::Metric;
pub use engine::{EngineBuilder, SearchEngine, TunableSearch};
pub use error::{RecallError, Result};
pub use groundtruth::{GroundTruthCache, GroundTruthComputer};
pub use metrics::{PerformanceMetrics, RecallMetrics};
pub use recall::{Harness, RecallTestConfig, RecallTestResult, TestOutcome, TestStage};
pub use sweep::{ParameterSweep, SweepReport};
pub use targets::{PerformanceTargets, RecallTargets, TargetPreset, TargetViolation};
