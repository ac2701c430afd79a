//! Distance metrics understood by the harness and its engines.
//!
//! Engines report raw scores the way exhaustive baselines do: squared L2
//! distance (smaller is closer) or inner product (larger is closer). Use
//! [`Metric::rank_key`] whenever a single "smaller is better" ordering is needed.

pub mod scalar;

pub use scalar::{dot_product, euclidean_distance_squared, l2_norm};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Supported metrics for exact and approximate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Squared Euclidean distance: sum((a[i] - b[i])^2). Ascending order.
    #[serde(rename = "L2")]
    L2,
    /// Inner product: sum(a[i] * b[i]). Descending order.
    #[serde(rename = "IP")]
    InnerProduct,
}

impl Metric {
    /// Compute the raw score between two vectors.
    ///
    /// # Panics
    /// Panics if the vectors have different dimensions.
    #[inline]
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => euclidean_distance_squared(a, b),
            Metric::InnerProduct => dot_product(a, b),
        }
    }

    /// Map a raw score onto an ascending key (smaller is closer).
    ///
    /// Zero keys are always `+0.0` so `total_cmp` treats `-0.0` and `+0.0`
    /// scores as a tie.
    #[inline]
    pub fn rank_key(&self, score: f32) -> f32 {
        let key = match self {
            Metric::L2 => score,
            Metric::InnerProduct => -score,
        };
        key + 0.0
    }

    /// Score used to pad result slots that hold no neighbor.
    #[inline]
    pub fn sentinel(&self) -> f32 {
        match self {
            Metric::L2 => f32::INFINITY,
            Metric::InnerProduct => f32::NEG_INFINITY,
        }
    }

    /// Order two raw scores so the closer one comes first.
    #[inline]
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        self.rank_key(a)
            .partial_cmp(&self.rank_key(b))
            .unwrap_or(Ordering::Equal)
    }

    /// Short name used in cache records and fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "L2",
            Metric::InnerProduct => "IP",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_l2_is_squared() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        let dist = Metric::L2.score(&a, &b);
        assert!((dist - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_metric_inner_product_ranks_descending() {
        let q = vec![1.0, 0.0];
        let near = Metric::InnerProduct.score(&q, &[2.0, 0.0]);
        let far = Metric::InnerProduct.score(&q, &[0.5, 0.0]);
        assert_eq!(Metric::InnerProduct.compare(near, far), Ordering::Less);
        assert!(Metric::InnerProduct.rank_key(near) < Metric::InnerProduct.rank_key(far));
    }

    #[test]
    fn test_rank_key_signed_zero() {
        for metric in [Metric::L2, Metric::InnerProduct] {
            let a = metric.rank_key(0.0);
            let b = metric.rank_key(-0.0);
            assert_eq!(a.total_cmp(&b), Ordering::Equal);
            assert!(a.is_sign_positive());
        }
    }

    #[test]
    fn test_metric_serde_names() {
        assert_eq!(serde_json::to_string(&Metric::L2).unwrap(), "\"L2\"");
        assert_eq!(
            serde_json::to_string(&Metric::InnerProduct).unwrap(),
            "\"IP\""
        );
        let parsed: Metric = serde_json::from_str("\"IP\"").unwrap();
        assert_eq!(parsed, Metric::InnerProduct);
    }
}
