//! Datasets for recall tests: loading, generating, and trimming.
//!
//! A [`Dataset`] is an immutable corpus plus query set, optionally carrying a
//! bundled ground truth. Named datasets come from `.fvecs`/`.ivecs` files
//! under a testdata root (see [`catalog`]); synthetic ones are generated from
//! a seeded distribution (see [`synthetic`]). [`DatasetProvider`] resolves a
//! [`DatasetSource`] to a shared `Arc<Dataset>`.

pub mod catalog;
mod provider;
pub mod synthetic;
pub mod vecs;

pub use provider::DatasetProvider;
pub use synthetic::{Distribution, QueryMode, SyntheticSpec};

use crate::error::{RecallError, Result};

/// Where a test's data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    /// A dataset from the named catalog, optionally trimmed to `(n, nq)`.
    Named {
        /// Catalog name, e.g. `"SIFT10K"`.
        name: String,
        /// Optional `(n, nq)` cap applied after loading.
        subset: Option<(usize, usize)>,
    },
    /// Generated data.
    Synthetic(SyntheticSpec),
}

impl DatasetSource {
    /// A named dataset, used in full.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            subset: None,
        }
    }

    /// Uniform random vectors with the default seed.
    pub fn synthetic(n: usize, d: usize, nq: usize) -> Self {
        Self::Synthetic(SyntheticSpec::new(n, d, nq))
    }

    /// Key under which a prepared dataset is memoized.
    pub(crate) fn memo_key(&self) -> String {
        format!("{self:?}")
    }

    /// Short label used in logs.
    pub fn label(&self) -> String {
        match self {
            Self::Named { name, subset: None } => name.clone(),
            Self::Named {
                name,
                subset: Some((n, nq)),
            } => format!("{name}[{n}x{nq}]"),
            Self::Synthetic(spec) => format!(
                "synthetic-{:?}-n{}-d{}-nq{}",
                spec.distribution, spec.n, spec.d, spec.nq
            ),
        }
    }
}

/// A corpus and query set, immutable once built.
///
/// `vectors` holds `n * d` floats and `queries` holds `nq * d`, both row-major.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    vectors: Vec<f32>,
    queries: Vec<f32>,
    n: usize,
    nq: usize,
    d: usize,
    ground_truth: Option<Vec<Vec<i64>>>,
}

impl Dataset {
    /// Build a dataset from flattened buffers.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `d` is zero or either buffer is not a
    /// whole number of rows.
    pub fn new(name: impl Into<String>, vectors: Vec<f32>, queries: Vec<f32>, d: usize) -> Result<Self> {
        if d == 0 {
            return Err(RecallError::invalid_parameter("dataset dimension must be positive"));
        }
        if vectors.len() % d != 0 || queries.len() % d != 0 {
            return Err(RecallError::invalid_parameter(format!(
                "dataset buffers ({} and {} floats) are not multiples of d={}",
                vectors.len(),
                queries.len(),
                d
            )));
        }
        Ok(Self {
            name: name.into(),
            n: vectors.len() / d,
            nq: queries.len() / d,
            d,
            vectors,
            queries,
            ground_truth: None,
        })
    }

    /// Attach a bundled ground truth, one id row per query.
    pub fn with_ground_truth(mut self, ground_truth: Vec<Vec<i64>>) -> Result<Self> {
        if ground_truth.len() != self.nq {
            return Err(RecallError::invalid_format(format!(
                "ground truth has {} rows for {} queries",
                ground_truth.len(),
                self.nq
            )));
        }
        self.ground_truth = Some(ground_truth);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn queries(&self) -> &[f32] {
        &self.queries
    }

    /// Number of base vectors.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of queries.
    pub fn nq(&self) -> usize {
        self.nq
    }

    /// Dimensionality.
    pub fn d(&self) -> usize {
        self.d
    }

    /// Bundled ground truth, if the dataset shipped one.
    pub fn ground_truth(&self) -> Option<&[Vec<i64>]> {
        self.ground_truth.as_deref()
    }

    /// Width of the bundled ground truth rows (0 if none).
    pub fn ground_truth_k(&self) -> usize {
        self.ground_truth
            .as_ref()
            .and_then(|gt| gt.first())
            .map_or(0, |row| row.len())
    }

    /// Base vector `i`.
    pub fn vector(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.d..(i + 1) * self.d]
    }

    /// Query `i`.
    pub fn query(&self, i: usize) -> &[f32] {
        &self.queries[i * self.d..(i + 1) * self.d]
    }

    /// The first `train_size` vectors, or all of them when `None` or too large.
    pub fn training_prefix(&self, train_size: Option<usize>) -> &[f32] {
        match train_size {
            Some(size) if size < self.n => &self.vectors[..size * self.d],
            _ => &self.vectors,
        }
    }

    /// A smaller dataset keeping the first `n` vectors and `nq` queries.
    ///
    /// Bundled ground truth is filtered to ids that remain in the corpus, so
    /// rows may come out shorter than before.
    pub fn subset(&self, n: usize, nq: usize) -> Dataset {
        let n = n.min(self.n);
        let nq = nq.min(self.nq);
        let ground_truth = self.ground_truth.as_ref().map(|gt| {
            gt[..nq]
                .iter()
                .map(|row| row.iter().copied().filter(|&id| id >= 0 && (id as usize) < n).collect())
                .collect()
        });

        Dataset {
            name: format!("{}-subset-{}", self.name, n),
            vectors: self.vectors[..n * self.d].to_vec(),
            queries: self.queries[..nq * self.d].to_vec(),
            n,
            nq,
            d: self.d,
            ground_truth,
        }
    }
}
