//! HNSW (Hierarchical Navigable Small World) engine.
//!
//! Builds a multi-layer proximity graph where higher layers hold fewer nodes
//! and enable long-range traversal. Search descends greedily through the
//! upper layers and runs a beam search of width `ef_search` on layer 0.
//!
//! # Parameters
//!
//! - `m`: Max connections per node above layer 0 (layer 0 allows `2 * m`)
//! - `ef_construction`: Beam width while inserting
//! - `ef_search`: Beam width while searching, tunable after build
//!
//! Layer assignment draws from a seeded generator, so the same insertion
//! order always produces the same graph.

use super::topk::TopK;
use super::{
    engine_builder, row_count, unknown_parameter, EngineBuilder, SearchBatch, SearchEngine,
    TunableSearch,
};
use crate::constants::hnsw::{DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_SEARCH, DEFAULT_M, LEVEL_SEED};
use crate::distance::Metric;
use crate::error::{RecallError, Result};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Node identifier; equal to the vector's id.
type NodeId = usize;

/// A node with its rank key (smaller is closer).
#[derive(Clone, Copy)]
struct ScoredNode {
    id: NodeId,
    key: f32,
}

impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredNode {}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Adjacency lists of one node, one per layer it lives on.
struct NodeConnections {
    layers: Vec<SmallVec<[NodeId; 32]>>,
}

/// HNSW index for approximate nearest neighbor search.
pub struct HnswIndex {
    dim: usize,
    metric: Metric,
    data: Vec<f32>,
    graph: Vec<RwLock<NodeConnections>>,
    entry_point: Option<NodeId>,
    max_layer: usize,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    ef_search: usize,
    /// Normalization factor for level generation.
    ml: f64,
    rng: StdRng,
}

impl HnswIndex {
    /// Create an empty HNSW index.
    pub fn new(dim: usize, m: usize, ef_construction: usize, metric: Metric) -> Result<Self> {
        if dim == 0 {
            return Err(RecallError::invalid_parameter("dimension must be positive"));
        }
        if m < 2 {
            return Err(RecallError::invalid_parameter("HNSW m must be at least 2"));
        }
        Ok(Self {
            dim,
            metric,
            data: Vec::new(),
            graph: Vec::new(),
            entry_point: None,
            max_layer: 0,
            m,
            m_max0: m * 2,
            ef_construction: ef_construction.max(1),
            ef_search: DEFAULT_EF_SEARCH,
            ml: 1.0 / (m as f64).ln(),
            rng: StdRng::seed_from_u64(LEVEL_SEED),
        })
    }

    /// Builder producing fresh HNSW engines.
    pub fn builder(m: usize, ef_construction: usize, ef_search: usize) -> EngineBuilder {
        engine_builder(move |dim, metric| {
            let mut index = HnswIndex::new(dim, m, ef_construction, metric)?;
            index.set_ef_search(ef_search);
            Ok(Box::new(index))
        })
    }

    /// Builder with the default graph parameters.
    pub fn default_builder() -> EngineBuilder {
        Self::builder(DEFAULT_M, DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_SEARCH)
    }

    /// Set the beam width for search operations.
    pub fn set_ef_search(&mut self, ef: usize) {
        self.ef_search = ef.max(1);
    }

    /// Current search beam width.
    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// True if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    fn random_layer(&mut self) -> usize {
        // 1 - r keeps the argument of ln in (0, 1].
        let r: f64 = 1.0 - self.rng.gen::<f64>();
        (-r.ln() * self.ml).floor() as usize
    }

    #[inline]
    fn vector(&self, node: NodeId) -> &[f32] {
        &self.data[node * self.dim..(node + 1) * self.dim]
    }

    #[inline]
    fn key(&self, query: &[f32], node: NodeId) -> f32 {
        self.metric.rank_key(self.metric.score(query, self.vector(node)))
    }

    fn insert(&mut self, row: &[f32]) {
        let node_id = self.graph.len();
        let layer = self.random_layer();

        self.data.extend_from_slice(row);
        let layers = (0..=layer).map(|_| SmallVec::new()).collect();
        self.graph.push(RwLock::new(NodeConnections { layers }));

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(node_id);
            self.max_layer = layer;
            return;
        };

        let query = &self.data[node_id * self.dim..(node_id + 1) * self.dim];
        let mut ep = vec![entry_point];

        for lc in (layer + 1..=self.max_layer).rev() {
            ep = self.search_layer(query, &ep, 1, lc);
        }

        for lc in (0..=layer.min(self.max_layer)).rev() {
            let candidates = self.search_layer(query, &ep, self.ef_construction, lc);
            let neighbor_m = if lc == 0 { self.m_max0 } else { self.m };
            let neighbors: Vec<NodeId> = candidates.iter().copied().take(neighbor_m).collect();

            for &neighbor in &neighbors {
                self.add_connection(node_id, neighbor, lc);
                self.add_connection(neighbor, node_id, lc);
                self.prune_connections(neighbor, neighbor_m, lc);
            }

            ep = candidates;
        }

        if layer > self.max_layer {
            self.entry_point = Some(node_id);
            self.max_layer = layer;
        }
    }

    /// Beam search on one layer; returns node ids closest first.
    fn search_layer(&self, query: &[f32], entry_points: &[NodeId], ef: usize, layer: usize) -> Vec<NodeId> {
        let mut visited = vec![false; self.graph.len()];
        let mut candidates: BinaryHeap<Reverse<ScoredNode>> = BinaryHeap::with_capacity(ef);
        let mut results: BinaryHeap<ScoredNode> = BinaryHeap::with_capacity(ef + 1);

        for &ep in entry_points {
            if !visited[ep] {
                visited[ep] = true;
                let scored = ScoredNode { id: ep, key: self.key(query, ep) };
                candidates.push(Reverse(scored));
                results.push(scored);
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = results.peek().map(|n| n.key).unwrap_or(f32::INFINITY);
            if current.key > worst && results.len() >= ef {
                break;
            }

            let neighbors: SmallVec<[NodeId; 32]> = {
                let node = self.graph[current.id].read();
                node.layers.get(layer).cloned().unwrap_or_default()
            };

            for neighbor in neighbors {
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;

                let key = self.key(query, neighbor);
                let worst = results.peek().map(|n| n.key).unwrap_or(f32::INFINITY);
                if key < worst || results.len() < ef {
                    let scored = ScoredNode { id: neighbor, key };
                    candidates.push(Reverse(scored));
                    results.push(scored);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec().into_iter().map(|n| n.id).collect()
    }

    fn add_connection(&self, from: NodeId, to: NodeId, layer: usize) {
        let mut node = self.graph[from].write();
        if let Some(links) = node.layers.get_mut(layer) {
            if !links.contains(&to) {
                links.push(to);
            }
        }
    }

    fn prune_connections(&self, node_id: NodeId, m: usize, layer: usize) {
        let neighbors: SmallVec<[NodeId; 32]> = {
            let node = self.graph[node_id].read();
            match node.layers.get(layer) {
                Some(links) if links.len() > m => links.clone(),
                _ => return,
            }
        };

        let base = self.vector(node_id);
        let mut scored: Vec<ScoredNode> = neighbors
            .into_iter()
            .map(|id| ScoredNode { id, key: self.key(base, id) })
            .collect();
        scored.sort();
        scored.truncate(m);

        let mut node = self.graph[node_id].write();
        if let Some(links) = node.layers.get_mut(layer) {
            *links = scored.into_iter().map(|n| n.id).collect();
        }
    }

    /// Search one query, returning `(id, raw score)` pairs closest first.
    pub fn search_one(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };

        let mut ep = vec![entry_point];
        for lc in (1..=self.max_layer).rev() {
            ep = self.search_layer(query, &ep, 1, lc);
        }

        let ef = self.ef_search.max(k);
        let mut top = TopK::new(k, self.metric);
        for node in self.search_layer(query, &ep, ef, 0) {
            top.push(node as i64, self.metric.score(query, self.vector(node)));
        }
        top.into_sorted()
    }

    fn edge_count(&self) -> usize {
        self.graph
            .iter()
            .map(|n| n.read().layers.iter().map(|l| l.len()).sum::<usize>())
            .sum()
    }
}

impl SearchEngine for HnswIndex {
    fn name(&self) -> String {
        format!("HNSW{}", self.m)
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
        let n = row_count(vectors, self.dim)?;
        self.data.reserve(vectors.len());
        self.graph.reserve(n);
        for row in vectors.chunks_exact(self.dim) {
            self.insert(row);
        }
        Ok(())
    }

    fn search(&self, queries: &[f32], k: usize) -> Result<SearchBatch> {
        row_count(queries, self.dim)?;
        let rows: Vec<Vec<(i64, f32)>> = queries
            .par_chunks(self.dim)
            .map(|q| self.search_one(q, k))
            .collect();
        Ok(SearchBatch::from_rows(rows, k, self.metric))
    }

    fn ntotal(&self) -> u64 {
        self.len() as u64
    }

    fn memory_bytes(&self) -> u64 {
        let vectors = self.data.capacity() * std::mem::size_of::<f32>();
        let edges = self.edge_count() * std::mem::size_of::<NodeId>();
        (vectors + edges) as u64
    }

    fn tunable(&mut self) -> Option<&mut dyn TunableSearch> {
        Some(self)
    }
}

impl TunableSearch for HnswIndex {
    fn parameter_names(&self) -> &'static [&'static str] {
        &["ef_search"]
    }

    fn get_parameter(&self, name: &str) -> Option<usize> {
        match name {
            "ef_search" => Some(self.ef_search),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: usize) -> Result<()> {
        match name {
            "ef_search" if value == 0 => {
                Err(RecallError::invalid_parameter("ef_search must be positive"))
            }
            "ef_search" => {
                self.set_ef_search(value);
                Ok(())
            }
            _ => Err(unknown_parameter("HnswIndex", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_rows(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.gen::<f32>()).collect()
    }

    fn index_with(n: usize, dim: usize) -> HnswIndex {
        let mut index = HnswIndex::new(dim, 16, 100, Metric::L2).unwrap();
        index.add(&random_rows(n, dim, 21)).unwrap();
        index
    }

    #[test]
    fn test_empty_index() {
        let index = HnswIndex::new(8, 16, 100, Metric::L2).unwrap();
        assert!(index.is_empty());
        let batch = index.search(&[0.0; 8], 3).unwrap();
        assert_eq!(batch.ids_for(0), &[-1, -1, -1]);
    }

    #[test]
    fn test_single_vector() {
        let mut index = HnswIndex::new(4, 16, 100, Metric::L2).unwrap();
        index.add(&[1.0; 4]).unwrap();
        let results = index.search_one(&[1.0; 4], 1);
        assert_eq!(results, vec![(0, 0.0)]);
    }

    #[test]
    fn test_exact_match() {
        let data = random_rows(200, 16, 22);
        let mut index = HnswIndex::new(16, 16, 200, Metric::L2).unwrap();
        index.add(&data).unwrap();

        let results = index.search_one(&data[16 * 77..16 * 78], 1);
        assert_eq!(results[0].0, 77);
        assert!(results[0].1 < 1e-6);
    }

    #[test]
    fn test_results_sorted() {
        let index = index_with(300, 16);
        let results = index.search_one(&random_rows(1, 16, 23), 10);
        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_larger_k_than_index() {
        let index = index_with(5, 8);
        let batch = index.search(&[0.0; 8], 10).unwrap();
        assert_eq!(batch.ids_for(0).iter().filter(|&&id| id >= 0).count(), 5);
    }

    #[test]
    fn test_graph_is_reproducible() {
        let a = index_with(200, 8);
        let b = index_with(200, 8);
        let queries = random_rows(5, 8, 24);
        assert_eq!(a.search(&queries, 5).unwrap(), b.search(&queries, 5).unwrap());
    }

    #[test]
    fn test_ef_search_tunable() {
        let mut index = index_with(50, 4);
        let tunable = index.tunable().unwrap();
        tunable.set_parameter("ef_search", 64).unwrap();
        assert_eq!(tunable.get_parameter("ef_search"), Some(64));
        assert!(tunable.set_parameter("nprobe", 4).is_err());
        assert!(tunable.set_parameter("ef_search", 0).is_err());
    }
}
