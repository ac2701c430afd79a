//! Bounded top-k collection shared by the in-tree engines.
//!
//! Candidates are ordered by `(rank key, id)`, so equal scores resolve to
//! the lowest id first and every engine produces the same order for ties.

use crate::distance::Metric;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate with its raw score and ascending rank key.
#[derive(Clone, Copy, Debug)]
struct Scored {
    id: i64,
    key: f32,
    score: f32,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: peek() is the current worst candidate.
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the `k` closest candidates seen so far.
pub(crate) struct TopK {
    k: usize,
    metric: Metric,
    heap: BinaryHeap<Scored>,
}

impl TopK {
    pub(crate) fn new(k: usize, metric: Metric) -> Self {
        Self {
            k,
            metric,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Offer a candidate with its raw score.
    #[inline]
    pub(crate) fn push(&mut self, id: i64, score: f32) {
        if self.k == 0 {
            return;
        }
        let candidate = Scored {
            id,
            key: self.metric.rank_key(score),
            score,
        };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    /// Fold another collector into this one.
    pub(crate) fn merge(mut self, other: TopK) -> TopK {
        for item in other.heap {
            self.push(item.id, item.score);
        }
        self
    }

    /// Drain into `(id, raw score)` pairs, closest first.
    pub(crate) fn into_sorted(self) -> Vec<(i64, f32)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|s| (s.id, s.score))
            .collect()
    }
}
