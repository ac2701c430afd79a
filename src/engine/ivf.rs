//! Inverted file engine with flat (uncompressed) lists.
//!
//! IVF partitions the vector space with k-means, then scans only the
//! `nprobe` partitions whose centroids are closest to the query. Unlike
//! the flat engine it must be trained before vectors can be added.

use super::topk::TopK;
use super::{
    engine_builder, row_count, unknown_parameter, EngineBuilder, SearchBatch, SearchEngine,
    TunableSearch,
};
use crate::constants::ivf::DEFAULT_NPROBE;
use crate::constants::kmeans::DEFAULT_MAX_ITERATIONS;
use crate::distance::Metric;
use crate::error::{RecallError, Result};
use crate::kmeans::KMeans;
use rayon::prelude::*;

/// One partition: the ids and rows assigned to a centroid.
#[derive(Default)]
struct InvertedList {
    ids: Vec<i64>,
    data: Vec<f32>,
}

/// Inverted file index for approximate nearest neighbor search.
///
/// Partition assignment always uses squared L2 to the centroids; candidates
/// inside the probed partitions are ranked by the configured metric.
pub struct IvfFlatIndex {
    dim: usize,
    metric: Metric,
    nlist: usize,
    nprobe: usize,
    quantizer: KMeans,
    lists: Vec<InvertedList>,
    ntotal: u64,
}

impl IvfFlatIndex {
    /// Create an untrained IVF index.
    ///
    /// # Arguments
    /// * `dim` - Vector dimension
    /// * `nlist` - Number of partitions (k-means clusters)
    /// * `metric` - Metric used to rank candidates
    pub fn new(dim: usize, nlist: usize, metric: Metric) -> Result<Self> {
        if dim == 0 {
            return Err(RecallError::invalid_parameter("dimension must be positive"));
        }
        if nlist == 0 {
            return Err(RecallError::invalid_parameter("nlist must be positive"));
        }
        Ok(Self {
            dim,
            metric,
            nlist,
            nprobe: DEFAULT_NPROBE.min(nlist),
            quantizer: KMeans::new(nlist, DEFAULT_MAX_ITERATIONS),
            lists: Vec::new(),
            ntotal: 0,
        })
    }

    /// Builder producing fresh IVF engines with the given partitioning.
    pub fn builder(nlist: usize, nprobe: usize) -> EngineBuilder {
        engine_builder(move |dim, metric| {
            let mut index = IvfFlatIndex::new(dim, nlist, metric)?;
            index.set_nprobe(nprobe);
            Ok(Box::new(index))
        })
    }

    /// Set the seed used by centroid training.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.quantizer = KMeans::new(self.nlist, DEFAULT_MAX_ITERATIONS).with_seed(seed);
        self
    }

    /// Set the number of partitions to probe during search.
    ///
    /// Clamped to `1..=nlist`.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.nprobe = nprobe.clamp(1, self.nlist);
    }

    /// Current nprobe setting.
    pub fn nprobe(&self) -> usize {
        self.nprobe
    }

    /// Number of partitions.
    pub fn nlist(&self) -> usize {
        self.nlist
    }

    /// Vectors held by each partition.
    pub fn list_sizes(&self) -> Vec<usize> {
        self.lists.iter().map(|l| l.ids.len()).collect()
    }

    /// Probe the nearest partitions for one query.
    fn search_one(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let mut top = TopK::new(k, self.metric);
        for list_id in self.quantizer.nearest_centroids(query, self.nprobe) {
            let list = &self.lists[list_id];
            for (&id, row) in list.ids.iter().zip(list.data.chunks_exact(self.dim)) {
                top.push(id, self.metric.score(query, row));
            }
        }
        top.into_sorted()
    }
}

impl SearchEngine for IvfFlatIndex {
    fn name(&self) -> String {
        format!("IVF{},Flat", self.nlist)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn train(&mut self, vectors: &[f32]) -> Result<()> {
        let n = row_count(vectors, self.dim)?;
        if n < self.nlist {
            return Err(RecallError::insufficient_training_data(self.nlist, n));
        }
        self.quantizer.fit(vectors, self.dim)?;
        self.lists = (0..self.nlist).map(|_| InvertedList::default()).collect();
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.quantizer.is_fitted()
    }

    fn add(&mut self, vectors: &[f32]) -> Result<()> {
        if !self.is_trained() {
            return Err(RecallError::NotTrained);
        }
        let n = row_count(vectors, self.dim)?;

        let assignments: Vec<usize> = vectors
            .par_chunks(self.dim)
            .map(|v| self.quantizer.nearest_centroid(v))
            .collect();

        for (offset, (row, list_id)) in vectors
            .chunks_exact(self.dim)
            .zip(assignments)
            .enumerate()
        {
            let list = &mut self.lists[list_id];
            list.ids.push(self.ntotal as i64 + offset as i64);
            list.data.extend_from_slice(row);
        }

        self.ntotal += n as u64;
        Ok(())
    }

    fn search(&self, queries: &[f32], k: usize) -> Result<SearchBatch> {
        if !self.is_trained() {
            return Err(RecallError::NotTrained);
        }
        row_count(queries, self.dim)?;

        let rows: Vec<Vec<(i64, f32)>> = queries
            .par_chunks(self.dim)
            .map(|q| self.search_one(q, k))
            .collect();

        Ok(SearchBatch::from_rows(rows, k, self.metric))
    }

    fn ntotal(&self) -> u64 {
        self.ntotal
    }

    fn memory_bytes(&self) -> u64 {
        let float = std::mem::size_of::<f32>();
        let lists: usize = self
            .lists
            .iter()
            .map(|l| l.data.capacity() * float + l.ids.capacity() * std::mem::size_of::<i64>())
            .sum();
        let centroids = self.nlist * self.dim * float;
        (lists + centroids) as u64
    }

    fn tunable(&mut self) -> Option<&mut dyn TunableSearch> {
        Some(self)
    }
}

impl TunableSearch for IvfFlatIndex {
    fn parameter_names(&self) -> &'static [&'static str] {
        &["nprobe"]
    }

    fn get_parameter(&self, name: &str) -> Option<usize> {
        match name {
            "nprobe" => Some(self.nprobe),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: usize) -> Result<()> {
        match name {
            "nprobe" if value == 0 => Err(RecallError::invalid_parameter("nprobe must be positive")),
            "nprobe" => {
                self.set_nprobe(value);
                Ok(())
            }
            _ => Err(unknown_parameter("IvfFlatIndex", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_rows(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.gen::<f32>()).collect()
    }

    fn trained(n: usize, dim: usize, nlist: usize) -> IvfFlatIndex {
        let data = random_rows(n, dim, 11);
        let mut index = IvfFlatIndex::new(dim, nlist, Metric::L2).unwrap().with_seed(1);
        index.train(&data).unwrap();
        index.add(&data).unwrap();
        index
    }

    #[test]
    fn test_ivf_basic() {
        let index = trained(1000, 16, 10);
        assert_eq!(index.nlist(), 10);
        assert_eq!(index.ntotal(), 1000);
        assert_eq!(index.list_sizes().iter().sum::<usize>(), 1000);
        assert_eq!(index.name(), "IVF10,Flat");
    }

    #[test]
    fn test_requires_training() {
        let mut index = IvfFlatIndex::new(4, 2, Metric::L2).unwrap();
        assert!(!index.is_trained());
        assert!(matches!(index.add(&[0.0; 4]), Err(RecallError::NotTrained)));
    }

    #[test]
    fn test_insufficient_training_data() {
        let mut index = IvfFlatIndex::new(4, 64, Metric::L2).unwrap();
        let err = index.train(&random_rows(10, 4, 2)).unwrap_err();
        assert!(err.is_insufficient_training_data());
        assert!(!index.is_trained());
    }

    #[test]
    fn test_full_probe_is_exact() {
        let mut index = trained(500, 8, 5);
        index.set_nprobe(5);

        let data = random_rows(500, 8, 11);
        let mut flat = crate::engine::FlatIndex::new(8, Metric::L2).unwrap();
        flat.add(&data).unwrap();

        let queries = random_rows(5, 8, 12);
        let approx = index.search(&queries, 10).unwrap();
        let exact = flat.search(&queries, 10).unwrap();
        assert_eq!(approx.ids, exact.ids);
    }

    #[test]
    fn test_nprobe_tunable() {
        let mut index = trained(100, 4, 5);
        let tunable = index.tunable().unwrap();
        assert_eq!(tunable.parameter_names(), &["nprobe"]);

        tunable.set_parameter("nprobe", 100).unwrap();
        assert_eq!(tunable.get_parameter("nprobe"), Some(5));
        assert!(tunable.set_parameter("nprobe", 0).is_err());
        assert!(tunable.set_parameter("ef_search", 8).is_err());
        assert_eq!(tunable.get_parameter("ef_search"), None);
    }

    #[test]
    fn test_ids_continue_across_adds() {
        let data = random_rows(40, 4, 13);
        let mut index = IvfFlatIndex::new(4, 2, Metric::L2).unwrap();
        index.train(&data).unwrap();
        index.add(&data[..80]).unwrap();
        index.add(&data[80..]).unwrap();
        index.set_nprobe(2);

        let batch = index.search(&data[4 * 30..4 * 31], 1).unwrap();
        assert_eq!(batch.ids_for(0), &[30]);
        assert_eq!(index.ntotal(), 40);
    }
}
