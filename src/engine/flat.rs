//! Exhaustive engine for exact nearest neighbor search.
//!
//! Computes the score against every stored vector, so recall against itself
//! is always 1.0. The ground-truth computer uses this engine as its baseline.

use super::topk::TopK;
use super::{engine_builder, row_count, EngineBuilder, SearchBatch, SearchEngine};
use crate::constants::flat::PARALLEL_CHUNK_SIZE;
use crate::distance::Metric;
use crate::error::{RecallError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Flat index that performs exact nearest neighbor search.
///
/// Vectors live in one contiguous row-major buffer. Search cost is O(n·d)
/// per query. Ties on score resolve to the lowest id.
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
    distance_evaluations: AtomicU64,
}

impl FlatIndex {
    /// Create an empty flat index.
    pub fn new(dim: usize, metric: Metric) -> Result<Self> {
        if dim == 0 {
            return Err(RecallError::invalid_parameter("dimension must be positive"));
        }
        Ok(Self {
            dim,
            metric,
            data: Vec::new(),
            distance_evaluations: AtomicU64::new(0),
        })
    }

    /// Builder producing fresh flat engines.
    pub fn builder() -> EngineBuilder {
        engine_builder(|dim, metric| Ok(Box::new(FlatIndex::new(dim, metric)?)))
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// True if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total score computations performed by searches so far.
    pub fn distance_evaluations(&self) -> u64 {
        self.distance_evaluations.load(Ordering::Relaxed)
    }

    /// Linear scan for one query.
    ///
    /// Returns `(id, score)` pairs, closest first.
    pub fn search_one(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let mut top = TopK::new(k, self.metric);
        for (i, row) in self.data.chunks_exact(self.dim).enumerate() {
            top.push(i as i64, self.metric.score(query, row));
        }
        self.distance_evaluations
            .fetch_add(self.len() as u64, Ordering::Relaxed);
        top.into_sorted()
    }

    /// Scan one query with the corpus split into chunks scored in parallel.
    ///
    /// Produces exactly the same rows as [`FlatIndex::search_one`].
    pub fn search_parallel(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let chunk_floats = PARALLEL_CHUNK_SIZE * self.dim;
        let top = self
            .data
            .par_chunks(chunk_floats)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let base = chunk_idx * PARALLEL_CHUNK_SIZE;
                let mut local = TopK::new(k, self.metric);
                for (offset, row) in chunk.chunks_exact(self.dim).enumerate() {
                    local.push((base + offset) as i64, self.metric.score(query, row));
                }
                local
            })
            .reduce(|| TopK::new(k, self.metric), TopK::merge);

        self.distance_evaluations
            .fetch_add(self.len() as u64, Ordering::Relaxed);
        top.into_sorted()
    }
}

impl SearchEngine for FlatIndex {
    fn name(&self) -> String {
        "Flat".to_string()
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn train(&mut self, _vectors: &[f32]) -> Result<()> {
        Ok(())
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        row_count(vectors, self.dim)?;
        self.data.extend_from_slice(vectors);
        Ok(())
    }

    fn search(&self, queries: &[f32], k: usize) -> Result<SearchBatch> {
        let nq = row_count(queries, self.dim)?;

        let rows: Vec<Vec<(i64, f32)>> = if nq == 1 {
            vec![self.search_parallel(queries, k)]
        } else {
            queries
                .par_chunks(self.dim)
                .map(|q| self.search_one(q, k))
                .collect()
        };

        Ok(SearchBatch::from_rows(rows, k, self.metric))
    }

    fn ntotal(&self) -> u64 {
        self.len() as u64
    }

    fn memory_bytes(&self) -> u64 {
        (self.data.capacity() * std::mem::size_of::<f32>()) as u64
    }
}
