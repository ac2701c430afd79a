//! # Harness configuration
//!
//! Where the cache and datasets live, and whether the harness runs with the
//! reduced CI profile or the full local one.

use crate::constants::{cache, dataset};
use crate::dataset::SyntheticSpec;
use crate::targets::RecallTargets;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides the ground-truth cache directory.
pub const CACHE_DIR_ENV: &str = "FORGE_RECALL_CACHE_DIR";
/// Overrides the testdata root holding named datasets.
pub const TESTDATA_ENV: &str = "FORGE_RECALL_TESTDATA";
/// Overrides the seed for synthetic datasets built through the config.
pub const SEED_ENV: &str = "FORGE_RECALL_SEED";

/// Environment variables whose presence (non-empty) signals a CI run.
pub const CI_ENV_VARS: [&str; 7] = [
    "CI",
    "CONTINUOUS_INTEGRATION",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
];

/// Dataset sizing and target profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunProfile {
    /// Small datasets for shared CI runners.
    Ci,
    /// Full-size datasets for local runs.
    Local,
}

/// Main harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub cache_root: PathBuf,
    pub testdata_root: PathBuf,
    pub profile: RunProfile,
    /// Seed given to specs from [`HarnessConfig::synthetic_spec`]. Specs
    /// built directly keep their own seed.
    pub seed: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(cache::DEFAULT_ROOT),
            testdata_root: PathBuf::from(dataset::DEFAULT_TESTDATA_ROOT),
            profile: RunProfile::Local,
            seed: dataset::DEFAULT_SEED,
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let mut config = Self::default();
        if let Some(dir) = set(CACHE_DIR_ENV) {
            config.cache_root = PathBuf::from(dir);
        }
        if let Some(dir) = set(TESTDATA_ENV) {
            config.testdata_root = PathBuf::from(dir);
        }
        if let Some(seed) = set(SEED_ENV).and_then(|v| v.trim().parse().ok()) {
            config.seed = seed;
        }
        if CI_ENV_VARS.iter().any(|&var| set(var).is_some()) {
            config.profile = RunProfile::Ci;
        }
        config
    }

    pub fn is_ci(&self) -> bool {
        self.profile == RunProfile::Ci
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_testdata_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.testdata_root = root.into();
        self
    }

    pub fn with_profile(mut self, profile: RunProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Uniform synthetic spec seeded from this config.
    pub fn synthetic_spec(&self, n: usize, d: usize, nq: usize) -> SyntheticSpec {
        SyntheticSpec::new(n, d, nq).seed(self.seed)
    }

    /// Size for a named scenario under this config's profile.
    pub fn dataset_size(&self, scenario: &str) -> DatasetSize {
        dataset_size(self.profile, scenario)
    }
}

/// Synthetic dataset shape for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSize {
    pub n: usize,
    pub d: usize,
    pub nq: usize,
    pub k: usize,
}

impl DatasetSize {
    const fn new(n: usize, d: usize, nq: usize, k: usize) -> Self {
        Self { n, d, nq, k }
    }
}

const CI_SIZES: [(&str, DatasetSize); 11] = [
    ("ivf_recall", DatasetSize::new(5_000, 128, 50, 10)),
    ("hnsw_recall", DatasetSize::new(5_000, 128, 50, 10)),
    ("pq_recall", DatasetSize::new(5_000, 128, 50, 10)),
    ("ivfpq_best", DatasetSize::new(10_000, 256, 100, 10)),
    ("ivf_optimal", DatasetSize::new(10_000, 256, 100, 10)),
    ("ivf_training", DatasetSize::new(10_000, 128, 100, 10)),
    ("semantic_search", DatasetSize::new(10_000, 384, 100, 10)),
    ("image_similarity", DatasetSize::new(10_000, 512, 50, 10)),
    ("recommendations", DatasetSize::new(10_000, 256, 50, 50)),
    ("param_sweep", DatasetSize::new(5_000, 128, 50, 10)),
    ("high_dimensional", DatasetSize::new(5_000, 1536, 50, 10)),
];

const LOCAL_SIZES: [(&str, DatasetSize); 11] = [
    ("ivf_recall", DatasetSize::new(10_000, 128, 100, 10)),
    ("hnsw_recall", DatasetSize::new(10_000, 256, 100, 10)),
    ("pq_recall", DatasetSize::new(10_000, 128, 100, 10)),
    ("ivfpq_best", DatasetSize::new(100_000, 256, 100, 10)),
    ("ivf_optimal", DatasetSize::new(100_000, 256, 100, 10)),
    ("ivf_training", DatasetSize::new(50_000, 128, 100, 10)),
    ("semantic_search", DatasetSize::new(50_000, 768, 500, 10)),
    ("image_similarity", DatasetSize::new(50_000, 2048, 100, 10)),
    ("recommendations", DatasetSize::new(50_000, 256, 100, 50)),
    ("param_sweep", DatasetSize::new(10_000, 256, 100, 10)),
    ("high_dimensional", DatasetSize::new(10_000, 1536, 100, 10)),
];

const CI_DEFAULT: DatasetSize = DatasetSize::new(5_000, 128, 50, 10);
const LOCAL_DEFAULT: DatasetSize = DatasetSize::new(10_000, 256, 100, 10);

/// Dataset shape for `scenario` under `profile`.
///
/// Unknown scenarios get the profile's default size.
pub fn dataset_size(profile: RunProfile, scenario: &str) -> DatasetSize {
    let (table, default) = match profile {
        RunProfile::Ci => (&CI_SIZES, CI_DEFAULT),
        RunProfile::Local => (&LOCAL_SIZES, LOCAL_DEFAULT),
    };
    table
        .iter()
        .find(|(name, _)| *name == scenario)
        .map(|(_, size)| *size)
        .unwrap_or(default)
}

/// Recall targets that differ between CI and local runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallThresholds {
    pub ci: RecallTargets,
    pub local: RecallTargets,
}

impl RecallThresholds {
    pub fn new(ci: RecallTargets, local: RecallTargets) -> Self {
        Self { ci, local }
    }

    pub fn for_profile(&self, profile: RunProfile) -> RecallTargets {
        match profile {
            RunProfile::Ci => self.ci,
            RunProfile::Local => self.local,
        }
    }
}
