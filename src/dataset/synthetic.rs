//! Seeded synthetic data generation.
//!
//! Every generator draws from one [`StdRng`] seeded from the [`SyntheticSpec`],
//! base vectors first and queries second, so the same [`SyntheticSpec`] always
//! reproduces the same bytes and therefore the same ground-truth cache key.

use super::Dataset;
use crate::constants::dataset::{
    CLUSTER_CENTER_SPREAD, CLUSTER_FRACTION, CLUSTER_STD, DEFAULT_SEED, DEFAULT_SPARSITY,
    FALLBACK_CLUSTERS, POWER_LAW_ALPHA,
};
use crate::error::{RecallError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as _, Normal};

/// Shape of generated base vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Each component uniform in `[0, 1)`.
    UniformRandom,
    /// Gaussian blobs (std 5) around centres spread over `[0, 100)`.
    /// The cluster count is 10% of `n`.
    GaussianClustered,
    /// Points at distance `100 * i^-1.5` from the origin in random directions.
    PowerLaw,
    /// Uniform directions on the unit sphere.
    Normalized,
    /// Uniform components with a fraction `sparsity` zeroed out.
    Sparse {
        /// Probability of a component being zero, clamped to `[0, 1]`.
        sparsity: f64,
    },
}

impl Distribution {
    /// Sparse data with the default sparsity.
    pub fn sparse() -> Self {
        Self::Sparse {
            sparsity: DEFAULT_SPARSITY,
        }
    }

    /// Short name for dataset labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UniformRandom => "uniform",
            Self::GaussianClustered => "clustered",
            Self::PowerLaw => "powerlaw",
            Self::Normalized => "normalized",
            Self::Sparse { .. } => "sparse",
        }
    }
}

/// How queries relate to the base vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryMode {
    /// Drawn independently from the base distribution.
    SameDistribution,
    /// Copies of evenly spread base vectors with Gaussian noise of this std.
    Perturbed {
        /// Standard deviation of the added noise.
        noise: f32,
    },
}

/// Parameters for a generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub n: usize,
    pub d: usize,
    pub nq: usize,
    pub distribution: Distribution,
    pub queries: QueryMode,
    pub seed: u64,
}

impl SyntheticSpec {
    /// Uniform data with independent queries and the default seed.
    pub fn new(n: usize, d: usize, nq: usize) -> Self {
        Self {
            n,
            d,
            nq,
            distribution: Distribution::UniformRandom,
            queries: QueryMode::SameDistribution,
            seed: DEFAULT_SEED,
        }
    }

    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Generate queries as noisy copies of base vectors.
    pub fn perturbed(mut self, noise: f32) -> Self {
        self.queries = QueryMode::Perturbed { noise };
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of clusters used by [`Distribution::GaussianClustered`].
    pub fn num_clusters(&self) -> usize {
        match (self.n as f64 * CLUSTER_FRACTION) as usize {
            0 => FALLBACK_CLUSTERS,
            k => k,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n == 0 || self.d == 0 || self.nq == 0 {
            return Err(RecallError::invalid_parameter(format!(
                "synthetic dataset needs positive n, d, nq (got {}, {}, {})",
                self.n, self.d, self.nq
            )));
        }
        if let QueryMode::Perturbed { noise } = self.queries {
            if !(noise.is_finite() && noise >= 0.0) {
                return Err(RecallError::invalid_parameter(format!(
                    "query noise must be a non-negative number, got {noise}"
                )));
            }
        }
        Ok(())
    }
}

/// Generate the dataset described by `spec`.
pub fn generate(spec: &SyntheticSpec) -> Result<Dataset> {
    spec.validate()?;
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let (n, d, nq) = (spec.n, spec.d, spec.nq);

    let mut centers = None;
    let vectors = match spec.distribution {
        Distribution::UniformRandom => uniform(n, d, &mut rng),
        Distribution::GaussianClustered => {
            let c = cluster_centers(spec.num_clusters(), d, &mut rng);
            let v = around_centers(n, d, &c, &mut rng)?;
            centers = Some(c);
            v
        }
        Distribution::PowerLaw => power_law(n, d, &mut rng),
        Distribution::Normalized => normalized(n, d, &mut rng),
        Distribution::Sparse { sparsity } => sparse(n, d, sparsity, &mut rng),
    };

    let queries = match spec.queries {
        QueryMode::Perturbed { noise } => perturbed(&vectors, n, d, nq, noise, &mut rng)?,
        QueryMode::SameDistribution => match (spec.distribution, centers.as_deref()) {
            (Distribution::GaussianClustered, Some(c)) => around_centers(nq, d, c, &mut rng)?,
            (Distribution::Normalized, _) => normalized(nq, d, &mut rng),
            (Distribution::Sparse { sparsity }, _) => sparse(nq, d, sparsity, &mut rng),
            _ => uniform(nq, d, &mut rng),
        },
    };

    Dataset::new(
        format!("synthetic-{}", spec.distribution.name()),
        vectors,
        queries,
        d,
    )
}

fn gaussian(std: f32) -> Result<Normal<f32>> {
    Normal::new(0.0, std).map_err(|e| RecallError::invalid_parameter(format!("noise std {std}: {e}")))
}

fn uniform(count: usize, d: usize, rng: &mut StdRng) -> Vec<f32> {
    (0..count * d).map(|_| rng.gen::<f32>()).collect()
}

fn cluster_centers(k: usize, d: usize, rng: &mut StdRng) -> Vec<f32> {
    (0..k * d)
        .map(|_| rng.gen::<f32>() * CLUSTER_CENTER_SPREAD)
        .collect()
}

fn around_centers(count: usize, d: usize, centers: &[f32], rng: &mut StdRng) -> Result<Vec<f32>> {
    let k = centers.len() / d;
    let normal = gaussian(CLUSTER_STD)?;
    let mut out = Vec::with_capacity(count * d);
    for _ in 0..count {
        let c = rng.gen_range(0..k);
        for &x in &centers[c * d..(c + 1) * d] {
            out.push(x + normal.sample(rng));
        }
    }
    Ok(out)
}

/// Random direction with components in `[-1, 1)`, scaled to unit length.
fn unit_direction(d: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut v: Vec<f32> = (0..d).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    let norm = crate::distance::l2_norm(&v);
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn power_law(count: usize, d: usize, rng: &mut StdRng) -> Vec<f32> {
    // Row 0 sits at the origin.
    let mut out = vec![0.0f32; d];
    out.reserve((count.saturating_sub(1)) * d);
    for i in 1..count {
        let radius = ((i as f64).powf(-POWER_LAW_ALPHA) * 100.0) as f32;
        out.extend(unit_direction(d, rng).into_iter().map(|x| x * radius));
    }
    out
}

fn normalized(count: usize, d: usize, rng: &mut StdRng) -> Vec<f32> {
    (0..count).flat_map(|_| unit_direction(d, rng)).collect()
}

fn sparse(count: usize, d: usize, sparsity: f64, rng: &mut StdRng) -> Vec<f32> {
    let sparsity = sparsity.clamp(0.0, 1.0);
    (0..count * d)
        .map(|_| {
            if rng.gen::<f64>() > sparsity {
                rng.gen::<f32>()
            } else {
                0.0
            }
        })
        .collect()
}

fn perturbed(
    vectors: &[f32],
    n: usize,
    d: usize,
    nq: usize,
    noise: f32,
    rng: &mut StdRng,
) -> Result<Vec<f32>> {
    let normal = gaussian(noise)?;
    let spread = (n / nq).max(1);
    let mut out = Vec::with_capacity(nq * d);
    for i in 0..nq {
        let src = (i * n / nq + rng.gen_range(0..spread)) % n;
        for &x in &vectors[src * d..(src + 1) * d] {
            out.push(x + normal.sample(rng));
        }
    }
    Ok(out)
}
