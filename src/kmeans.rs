//! K-Means clustering for IVF partitioning.
//!
//! Implements Lloyd's algorithm over flattened row-major buffers with
//! k-means++ initialization for small `k`. Seeded, so the same training
//! sample always yields the same centroids.

use crate::constants::kmeans::{CONVERGENCE_THRESHOLD, KMEANSPP_THRESHOLD};
use crate::distance::euclidean_distance_squared;
use crate::error::{RecallError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// K-Means clustering algorithm.
pub struct KMeans {
    /// Flattened centroids, `k * dim` floats once fitted.
    centroids: Vec<f32>,
    dim: usize,
    k: usize,
    max_iters: usize,
    seed: u64,
}

impl KMeans {
    /// Create a new K-Means instance.
    ///
    /// # Arguments
    /// * `k` - Number of clusters
    /// * `max_iters` - Maximum iterations for convergence
    pub fn new(k: usize, max_iters: usize) -> Self {
        Self {
            centroids: Vec::new(),
            dim: 0,
            k,
            max_iters,
            seed: 0,
        }
    }

    /// Set the seed used for initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of clusters.
    pub fn num_clusters(&self) -> usize {
        self.k
    }

    /// True once [`KMeans::fit`] has produced centroids.
    pub fn is_fitted(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Centroid `i` as a slice.
    pub fn centroid(&self, i: usize) -> &[f32] {
        &self.centroids[i * self.dim..(i + 1) * self.dim]
    }

    /// Fit the model to `data`, a flattened buffer of `dim`-wide rows.
    ///
    /// # Errors
    /// Returns `InsufficientTrainingData` if there are fewer rows than clusters.
    pub fn fit(&mut self, data: &[f32], dim: usize) -> Result<()> {
        if dim == 0 || self.k == 0 {
            return Err(RecallError::invalid_parameter(
                "k-means needs a positive dimension and cluster count",
            ));
        }
        let n = data.len() / dim;
        if n < self.k {
            return Err(RecallError::insufficient_training_data(self.k, n));
        }

        self.dim = dim;
        let mut rng = StdRng::seed_from_u64(self.seed);

        // k-means++ is O(k²n), so large k falls back to a random sample.
        self.centroids = if self.k > KMEANSPP_THRESHOLD {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(&mut rng);
            indices
                .into_iter()
                .take(self.k)
                .flat_map(|i| data[i * dim..(i + 1) * dim].iter().copied())
                .collect()
        } else {
            self.kmeans_plus_plus_init(data, n, &mut rng)
        };

        for _ in 0..self.max_iters {
            let assignments = self.assign(data);
            let updated = self.update_centroids(data, &assignments);
            let change = self.measure_change(&updated);
            self.centroids = updated;

            if change < CONVERGENCE_THRESHOLD {
                break;
            }
        }

        Ok(())
    }

    /// Pick initial centroids with probability proportional to squared distance.
    fn kmeans_plus_plus_init(&self, data: &[f32], n: usize, rng: &mut StdRng) -> Vec<f32> {
        let dim = self.dim;
        let row = |i: usize| &data[i * dim..(i + 1) * dim];
        let mut centroids: Vec<f32> = Vec::with_capacity(self.k * dim);

        centroids.extend_from_slice(row(rng.gen_range(0..n)));

        for _ in 1..self.k {
            let chosen = centroids.len() / dim;
            let distances: Vec<f32> = (0..n)
                .into_par_iter()
                .map(|i| {
                    (0..chosen)
                        .map(|c| euclidean_distance_squared(row(i), &centroids[c * dim..(c + 1) * dim]))
                        .fold(f32::MAX, f32::min)
                })
                .collect();

            let total: f32 = distances.iter().sum();
            if total <= 0.0 {
                centroids.extend_from_slice(row(rng.gen_range(0..n)));
                continue;
            }

            let mut r = rng.gen_range(0.0..total);
            // Float residue can leave r above zero after the loop; take the last row then.
            let mut pick = n - 1;
            for (i, &d) in distances.iter().enumerate() {
                r -= d;
                if r <= 0.0 {
                    pick = i;
                    break;
                }
            }
            centroids.extend_from_slice(row(pick));
        }

        centroids
    }

    /// Index of the nearest centroid for every row.
    fn assign(&self, data: &[f32]) -> Vec<usize> {
        data.par_chunks(self.dim)
            .map(|v| self.nearest_centroid(v))
            .collect()
    }

    /// Recompute each centroid as the mean of its rows; empty clusters keep their position.
    fn update_centroids(&self, data: &[f32], assignments: &[usize]) -> Vec<f32> {
        let dim = self.dim;
        let mut sums = vec![0.0f32; self.k * dim];
        let mut counts = vec![0usize; self.k];

        for (v, &c) in data.chunks_exact(dim).zip(assignments) {
            counts[c] += 1;
            for (s, x) in sums[c * dim..(c + 1) * dim].iter_mut().zip(v) {
                *s += x;
            }
        }

        for c in 0..self.k {
            let slot = &mut sums[c * dim..(c + 1) * dim];
            if counts[c] == 0 {
                slot.copy_from_slice(self.centroid(c));
            } else {
                let count = counts[c] as f32;
                slot.iter_mut().for_each(|s| *s /= count);
            }
        }

        sums
    }

    /// Average squared movement of centroids between iterations.
    fn measure_change(&self, updated: &[f32]) -> f32 {
        let total: f32 = self
            .centroids
            .chunks_exact(self.dim)
            .zip(updated.chunks_exact(self.dim))
            .map(|(old, new)| euclidean_distance_squared(old, new))
            .sum();
        total / self.k as f32
    }

    /// Index of the centroid closest to `v`.
    pub fn nearest_centroid(&self, v: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (idx, c) in self.centroids.chunks_exact(self.dim).enumerate() {
            let d = euclidean_distance_squared(v, c);
            if d < best_dist {
                best = idx;
                best_dist = d;
            }
        }
        best
    }

    /// The `nprobe` centroids nearest to `query`, closest first.
    pub fn nearest_centroids(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        let mut distances: Vec<(usize, f32)> = self
            .centroids
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(idx, c)| (idx, euclidean_distance_squared(query, c)))
            .collect();

        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(nprobe);
        distances.into_iter().map(|(idx, _)| idx).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<f32> {
        let mut data = Vec::new();
        for i in 0..50 {
            let jitter = i as f32 * 0.01;
            data.extend_from_slice(&[jitter, jitter]);
            data.extend_from_slice(&[100.0 + jitter, 100.0 - jitter]);
        }
        data
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let data = two_blobs();
        let mut kmeans = KMeans::new(2, 20).with_seed(7);
        kmeans.fit(&data, 2).unwrap();

        assert!(kmeans.is_fitted());
        let a = kmeans.nearest_centroid(&[0.0, 0.0]);
        let b = kmeans.nearest_centroid(&[100.0, 100.0]);
        assert_ne!(a, b);
        assert!(kmeans.centroid(a)[0] < 1.0);
        assert!(kmeans.centroid(b)[0] > 99.0);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let data: Vec<f32> = (0..400).map(|i| ((i * 37) % 101) as f32).collect();
        let mut a = KMeans::new(4, 10).with_seed(3);
        let mut b = KMeans::new(4, 10).with_seed(3);
        a.fit(&data, 4).unwrap();
        b.fit(&data, 4).unwrap();
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_kmeans_too_few_rows() {
        let mut kmeans = KMeans::new(10, 5);
        let err = kmeans.fit(&[0.0; 8], 2).unwrap_err();
        assert!(err.is_insufficient_training_data());
    }

    #[test]
    fn test_nearest_centroids_order() {
        let mut kmeans = KMeans::new(3, 1);
        kmeans.dim = 2;
        kmeans.centroids = vec![0.0, 0.0, 10.0, 0.0, 5.0, 10.0];

        let nearest = kmeans.nearest_centroids(&[0.1, 0.1], 2);
        assert_eq!(nearest, vec![0, 1]);
    }
}
