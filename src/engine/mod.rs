//! The search engine contract exercised by the harness.
//!
//! The harness never searches on its own; it drives engines through
//! [`SearchEngine`] and measures what comes back. Vectors always travel as
//! flattened row-major `f32` buffers and engines assign sequential `i64` ids
//! in insertion order, so row `i` of the corpus is id `i`.
//!
//! Index-family knobs (probe counts, beam widths) are exposed through the
//! optional [`TunableSearch`] capability. Callers probe for it with
//! [`SearchEngine::tunable`] instead of downcasting to a concrete engine.
//!
//! Three engines ship in-tree:
//!
//! | Engine | Family | Training | Tunables |
//! |--------|--------|----------|----------|
//! | [`FlatIndex`] | exact, exhaustive | no | none |
//! | [`IvfFlatIndex`] | clustering | yes | `nprobe` |
//! | [`HnswIndex`] | graph | no | `ef_search` |

pub mod flat;
pub mod hnsw;
pub mod ivf;
mod topk;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;
pub use ivf::IvfFlatIndex;

use crate::distance::Metric;
use crate::error::{RecallError, Result};
use std::sync::Arc;

/// Factory producing a fresh engine for a dimensionality and metric.
///
/// Shared so one configuration can be cloned into a sweep and run on any
/// thread; each call must return an independent engine instance.
pub type EngineBuilder = Arc<dyn Fn(usize, Metric) -> Result<Box<dyn SearchEngine>> + Send + Sync>;

/// Wrap a closure as an [`EngineBuilder`].
pub fn engine_builder<F>(f: F) -> EngineBuilder
where
    F: Fn(usize, Metric) -> Result<Box<dyn SearchEngine>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Results of one search call over `nq` queries.
///
/// Rows are `k` wide and stored row-major. Slots without a neighbor hold id
/// `-1` and the metric's sentinel score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBatch {
    /// Neighbors requested per query.
    pub k: usize,
    /// Number of queries.
    pub nq: usize,
    /// Neighbor ids, `nq * k` entries.
    pub ids: Vec<i64>,
    /// Raw scores matching `ids`.
    pub distances: Vec<f32>,
}

impl SearchBatch {
    /// Build a batch from per-query rows sorted closest first, padding short rows.
    pub fn from_rows(rows: Vec<Vec<(i64, f32)>>, k: usize, metric: Metric) -> Self {
        let nq = rows.len();
        let mut ids = Vec::with_capacity(nq * k);
        let mut distances = Vec::with_capacity(nq * k);

        for row in rows {
            let filled = row.len().min(k);
            for &(id, score) in row.iter().take(k) {
                ids.push(id);
                distances.push(score);
            }
            for _ in filled..k {
                ids.push(-1);
                distances.push(metric.sentinel());
            }
        }

        Self {
            k,
            nq,
            ids,
            distances,
        }
    }

    /// Neighbor ids for query `q`.
    ///
    /// Panics if the batch holds fewer than `(q + 1) * k` ids.
    pub fn ids_for(&self, q: usize) -> &[i64] {
        &self.ids[q * self.k..(q + 1) * self.k]
    }

    /// Scores for query `q`.
    pub fn distances_for(&self, q: usize) -> &[f32] {
        &self.distances[q * self.k..(q + 1) * self.k]
    }

    /// Iterate over the id rows.
    pub fn id_rows(&self) -> impl Iterator<Item = &[i64]> {
        (0..self.nq).map(move |q| self.ids_for(q))
    }
}

/// Search-time parameters an engine lets callers adjust after construction.
pub trait TunableSearch {
    /// Names of the parameters this engine accepts.
    fn parameter_names(&self) -> &'static [&'static str];

    /// Current value of a parameter, if the name is known.
    fn get_parameter(&self, name: &str) -> Option<usize>;

    /// Set a parameter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for unknown names or out-of-range values.
    fn set_parameter(&mut self, name: &str, value: usize) -> Result<()>;
}

/// Contract for a nearest neighbor engine under test.
///
/// The lifecycle is `train` (only when [`SearchEngine::is_trained`] starts
/// false), then `add`, then any number of `search` calls. Engines release
/// their resources on drop.
///
/// # Thread Safety
///
/// Engines must be `Send` so a sweep can build and run one per worker thread.
/// An engine is never mutated from two threads at once.
pub trait SearchEngine: Send {
    /// Short human readable name, e.g. `"IVF64,Flat"`.
    fn name(&self) -> String;

    /// Dimensionality of vectors handled by this engine.
    fn dimension(&self) -> usize;

    /// Metric the engine ranks by.
    fn metric(&self) -> Metric;

    /// Train the engine on a flattened sample.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientTrainingData` when the sample is too small for the
    /// engine's parameters.
    fn train(&mut self, vectors: &[f32]) -> Result<()>;

    /// Whether the engine is ready to accept vectors.
    fn is_trained(&self) -> bool;

    /// Append vectors; ids continue from [`SearchEngine::ntotal`].
    fn add(&mut self, vectors: &[f32]) -> Result<()>;

    /// Search `queries.len() / dimension()` queries for their `k` nearest neighbors.
    fn search(&self, queries: &[f32], k: usize) -> Result<SearchBatch>;

    /// Number of vectors stored.
    fn ntotal(&self) -> u64;

    /// Approximate resident size of the engine in bytes.
    fn memory_bytes(&self) -> u64 {
        self.ntotal() * self.dimension() as u64 * std::mem::size_of::<f32>() as u64
    }

    /// Probe for the tunable search parameter capability.
    fn tunable(&mut self) -> Option<&mut dyn TunableSearch> {
        None
    }
}

/// Validate a flattened buffer against a dimension, returning its row count.
pub(crate) fn row_count(vectors: &[f32], dim: usize) -> Result<usize> {
    if dim == 0 {
        return Err(RecallError::invalid_parameter("dimension must be positive"));
    }
    if vectors.len() % dim != 0 {
        return Err(RecallError::invalid_parameter(format!(
            "buffer of {} floats is not a multiple of dimension {}",
            vectors.len(),
            dim
        )));
    }
    Ok(vectors.len() / dim)
}

/// Reject a parameter name the engine does not know.
pub(crate) fn unknown_parameter(engine: &str, name: &str) -> RecallError {
    RecallError::invalid_parameter(format!("{engine} has no search parameter '{name}'"))
}
