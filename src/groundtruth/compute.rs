use super::{CacheKey, GroundTruthCache, GroundTruthEntry};
use crate::distance::Metric;
use crate::engine::{row_count, EngineBuilder, FlatIndex};
use crate::error::Result;
use std::time::Instant;
use tracing::{info, warn};

/// Where a ground truth came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTruthSource {
    /// Read back from the cache.
    Cache,
    /// Computed by the exhaustive baseline in this call.
    Computed,
    /// Bundled with a named dataset.
    Bundled,
}

/// Reference results for one dataset and search configuration.
#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub entries: Vec<GroundTruthEntry>,
    pub source: GroundTruthSource,
}

/// Produces exact k-NN results, consulting the cache first.
///
/// On a miss the baseline engine (exhaustive flat search unless replaced)
/// is built, populated with every vector, and searched with every query.
/// The result is written through to the cache; a failed write is logged and
/// does not fail the computation.
pub struct GroundTruthComputer {
    cache: GroundTruthCache,
    baseline: EngineBuilder,
}

impl GroundTruthComputer {
    /// Computer using [`FlatIndex`] as the exact baseline.
    pub fn new(cache: GroundTruthCache) -> Self {
        Self {
            cache,
            baseline: FlatIndex::builder(),
        }
    }

    /// Replace the exact baseline engine.
    pub fn with_baseline(mut self, baseline: EngineBuilder) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn cache(&self) -> &GroundTruthCache {
        &self.cache
    }

    /// Exact `k` nearest neighbors of every query.
    ///
    /// Rows are ordered closest first (ascending L2, descending inner
    /// product). Rows are shorter than `k` only when the corpus is.
    pub fn compute(
        &self,
        vectors: &[f32],
        queries: &[f32],
        d: usize,
        k: usize,
        metric: Metric,
    ) -> Result<GroundTruth> {
        let n = row_count(vectors, d)?;
        let nq = row_count(queries, d)?;
        let key = GroundTruthCache::compute_key(vectors, queries, d, k, metric);

        if let Some(entries) = self.cache.load(&key, n, nq, d, k, metric) {
            return Ok(GroundTruth {
                entries,
                source: GroundTruthSource::Cache,
            });
        }

        let entries = self.exhaustive(vectors, queries, d, k, metric, &key)?;

        if let Err(e) = self.cache.save(&key, &entries, n, nq, d, k, metric) {
            warn!(key = %key, error = %e, "failed to cache ground truth");
        }

        Ok(GroundTruth {
            entries,
            source: GroundTruthSource::Computed,
        })
    }

    fn exhaustive(
        &self,
        vectors: &[f32],
        queries: &[f32],
        d: usize,
        k: usize,
        metric: Metric,
        key: &CacheKey,
    ) -> Result<Vec<GroundTruthEntry>> {
        let start = Instant::now();
        let mut engine = (self.baseline)(d, metric)?;
        engine.add(vectors)?;
        let batch = engine.search(queries, k)?;

        let entries: Vec<GroundTruthEntry> = batch
            .id_rows()
            .map(|row| GroundTruthEntry::new(row.iter().copied().filter(|&id| id >= 0).collect()))
            .collect();

        info!(
            key = %key,
            n = vectors.len() / d,
            nq = batch.nq,
            k,
            metric = %metric,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "computed ground truth"
        );
        Ok(entries)
    }
}
