//! Exact ground truth and its content-addressed cache.
//!
//! Ground truth is the expensive part of a sweep: O(N×NQ×D) for every
//! distinct input. [`GroundTruthCache`] stores results on disk keyed by a
//! fingerprint of the exact input bytes plus `(d, k, metric)`, and
//! [`GroundTruthComputer`] checks it before running the exhaustive baseline.

mod cache;
mod compute;

pub use cache::{CacheKey, CacheRecord, GroundTruthCache};
pub use compute::{GroundTruth, GroundTruthComputer, GroundTruthSource};

use serde::{Deserialize, Serialize};

/// True nearest neighbor ids for one query, closest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    pub ids: Vec<i64>,
}

impl GroundTruthEntry {
    pub fn new(ids: Vec<i64>) -> Self {
        Self { ids }
    }
}

impl From<Vec<i64>> for GroundTruthEntry {
    fn from(ids: Vec<i64>) -> Self {
        Self { ids }
    }
}
