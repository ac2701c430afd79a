//! Named constants for configuration values.
//!
//! This module centralizes magic numbers and default values used throughout
//! the harness, making them easier to find, document, and tune.

/// Constants for the ground-truth cache.
pub mod cache {
    /// Schema version written into every cache record.
    /// Records carrying any other version are recomputed.
    pub const SCHEMA_VERSION: u32 = 1;

    /// File name prefix for cache records.
    pub const FILE_PREFIX: &str = "gt_cache_";

    /// File name suffix for cache records.
    pub const FILE_SUFFIX: &str = ".json";

    /// Number of hex characters of the SHA-256 digest kept as the cache key.
    pub const KEY_HEX_LEN: usize = 16;

    /// Default cache root, relative to the working directory.
    pub const DEFAULT_ROOT: &str = "target/groundtruth-cache";
}

/// Constants for dataset preparation.
pub mod dataset {
    /// Seed used for synthetic data when a configuration does not set one.
    pub const DEFAULT_SEED: u64 = 42;

    /// Fraction of `n` used as the cluster count for clustered data.
    pub const CLUSTER_FRACTION: f64 = 0.1;

    /// Spread of cluster centres for Gaussian-clustered data.
    pub const CLUSTER_CENTER_SPREAD: f32 = 100.0;

    /// Standard deviation of points around their cluster centre.
    pub const CLUSTER_STD: f32 = 5.0;

    /// Cluster count used when `n * CLUSTER_FRACTION` rounds down to zero.
    pub const FALLBACK_CLUSTERS: usize = 10;

    /// Fraction of zero components for sparse data when none is given.
    pub const DEFAULT_SPARSITY: f64 = 0.8;

    /// Power-law exponent for the power-law distribution.
    pub const POWER_LAW_ALPHA: f64 = 1.5;

    /// Default testdata root, relative to the working directory.
    pub const DEFAULT_TESTDATA_ROOT: &str = "testdata";

    /// Sub-directory of the testdata root holding vector files.
    pub const EMBEDDINGS_DIR: &str = "embeddings";

    /// Largest record dimension accepted from `.fvecs` / `.ivecs` headers.
    pub const MAX_VECS_DIM: usize = 1 << 16;
}

/// Constants for k-means clustering.
pub mod kmeans {
    /// Threshold for switching from k-means++ to random initialization.
    /// k-means++ has O(k²n) complexity, which becomes expensive for large k.
    pub const KMEANSPP_THRESHOLD: usize = 64;

    /// Convergence threshold for early stopping.
    /// Training stops when centroid movement falls below this value.
    pub const CONVERGENCE_THRESHOLD: f32 = 0.001;

    /// Default number of iterations for IVF centroid training.
    pub const DEFAULT_MAX_ITERATIONS: usize = 25;
}

/// Constants for the IVF engine.
pub mod ivf {
    /// Default number of partitions probed per query.
    pub const DEFAULT_NPROBE: usize = 1;
}

/// Constants for the HNSW engine.
pub mod hnsw {
    /// Default M parameter (max connections per layer).
    pub const DEFAULT_M: usize = 16;

    /// Default ef_construction (beam width during build).
    pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

    /// Default ef_search (beam width during search).
    pub const DEFAULT_EF_SEARCH: usize = 16;

    /// Seed for level generation so graphs are reproducible.
    pub const LEVEL_SEED: u64 = 0x5eed_4e57;
}

/// Constants for the flat engine.
pub mod flat {
    /// Chunk size for parallel exhaustive search.
    /// Sized to fit multiple vectors in L2 cache.
    pub const PARALLEL_CHUNK_SIZE: usize = 1000;
}

/// Recall cutoffs reported for every test.
pub const RECALL_CUTOFFS: [usize; 3] = [1, 10, 100];
