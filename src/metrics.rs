//! Quality and latency metrics for a recall test.
//!
//! Quality metrics compare each query's returned ids against its ground
//! truth row and average over every query in the set:
//!
//! - **Recall@K**: overlap of the top-K returned ids with the top-K true
//!   neighbors, divided by K. K shrinks to the shorter of the two rows, so an
//!   exact engine scores 1.0 even when the corpus is smaller than K.
//! - **Precision@k**: fraction of the top-k returned ids that appear anywhere
//!   in the ground truth row.
//! - **MRR**: reciprocal rank of the first returned id found in the ground
//!   truth row.
//! - **NDCG@k**: graded by ground truth position; the closest true neighbor of
//!   a row of length L has relevance L, the next L-1, and so on.
//!
//! Queries whose effective cutoff is zero contribute nothing but still count
//! toward the average.
//!
//! Latency metrics take one wall-clock sample per query:
//!
//! ```ignore
//! let perf = measure_latencies(&latencies);
//! println!("{}", perf); // QPS=48123, P50=19µs, P95=24µs, P99=31µs, Avg=20µs
//! ```

use crate::constants::RECALL_CUTOFFS;
use crate::error::{RecallError, Result};
use crate::groundtruth::GroundTruthEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Aggregated quality metrics for one test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallMetrics {
    pub recall1: f64,
    pub recall10: f64,
    pub recall100: f64,
    /// Recall at the configuration's own `k`.
    pub recall_k: f64,
    pub precision: f64,
    pub mrr: f64,
    pub ndcg: f64,
}

impl RecallMetrics {
    /// Recall at one of the standard cutoffs, `None` for any other value.
    pub fn at_cutoff(&self, cutoff: usize) -> Option<f64> {
        match cutoff {
            1 => Some(self.recall1),
            10 => Some(self.recall10),
            100 => Some(self.recall100),
            _ => None,
        }
    }
}

impl fmt::Display for RecallMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recall@1={:.4}, Recall@10={:.4}, Recall@100={:.4}, Precision={:.4}, MRR={:.4}, NDCG={:.4}",
            self.recall1, self.recall10, self.recall100, self.precision, self.mrr, self.ndcg
        )
    }
}

/// Latency distribution and throughput for one test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    /// Queries per second derived from the mean latency.
    pub qps: f64,
    pub total: Duration,
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QPS={:.0}, P50={:?}, P95={:?}, P99={:?}, Avg={:?}",
            self.qps,
            round_to_micros(self.p50),
            round_to_micros(self.p95),
            round_to_micros(self.p99),
            round_to_micros(self.avg)
        )
    }
}

/// Round to the nearest microsecond for display.
pub fn round_to_micros(d: Duration) -> Duration {
    let micros = (d.as_nanos() + 500) / 1_000;
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

fn mean_over_queries(total: f64, ground_truth: &[GroundTruthEntry], results: &[Vec<i64>]) -> f64 {
    if ground_truth.is_empty() || results.is_empty() {
        return 0.0;
    }
    total / ground_truth.len() as f64
}

/// Mean recall@k over all queries.
pub fn calculate_recall(ground_truth: &[GroundTruthEntry], results: &[Vec<i64>], k: usize) -> f64 {
    let mut total = 0.0;
    for (gt, res) in ground_truth.iter().zip(results) {
        let actual_k = k.min(res.len()).min(gt.ids.len());
        if actual_k == 0 {
            continue;
        }
        let truth: HashSet<i64> = gt.ids[..actual_k].iter().copied().collect();
        let hits = res[..actual_k].iter().filter(|id| truth.contains(id)).count();
        total += hits as f64 / actual_k as f64;
    }
    mean_over_queries(total, ground_truth, results)
}

/// Mean precision@k: returned ids found anywhere in the ground truth row.
pub fn calculate_precision(ground_truth: &[GroundTruthEntry], results: &[Vec<i64>], k: usize) -> f64 {
    let mut total = 0.0;
    for (gt, res) in ground_truth.iter().zip(results) {
        let actual_k = k.min(res.len());
        if actual_k == 0 {
            continue;
        }
        let truth: HashSet<i64> = gt.ids.iter().copied().collect();
        let relevant = res[..actual_k].iter().filter(|id| truth.contains(id)).count();
        total += relevant as f64 / actual_k as f64;
    }
    mean_over_queries(total, ground_truth, results)
}

/// Mean reciprocal rank of the first relevant returned id.
pub fn calculate_mrr(ground_truth: &[GroundTruthEntry], results: &[Vec<i64>]) -> f64 {
    let mut total = 0.0;
    for (gt, res) in ground_truth.iter().zip(results) {
        let truth: HashSet<i64> = gt.ids.iter().copied().collect();
        if let Some(rank) = res.iter().position(|id| truth.contains(id)) {
            total += 1.0 / (rank + 1) as f64;
        }
    }
    mean_over_queries(total, ground_truth, results)
}

/// Mean NDCG@k with ground truth position as graded relevance.
pub fn calculate_ndcg(ground_truth: &[GroundTruthEntry], results: &[Vec<i64>], k: usize) -> f64 {
    let discount = |pos: usize| ((pos + 2) as f64).log2();

    let mut total = 0.0;
    for (gt, res) in ground_truth.iter().zip(results) {
        let actual_k = k.min(res.len());
        if actual_k == 0 {
            continue;
        }
        let len = gt.ids.len();
        let relevance: std::collections::HashMap<i64, f64> = gt
            .ids
            .iter()
            .enumerate()
            .map(|(pos, &id)| (id, (len - pos) as f64))
            .collect();

        let dcg: f64 = res[..actual_k]
            .iter()
            .enumerate()
            .map(|(pos, id)| relevance.get(id).copied().unwrap_or(0.0) / discount(pos))
            .sum();
        let idcg: f64 = (0..actual_k.min(len))
            .map(|pos| (len - pos) as f64 / discount(pos))
            .sum();

        if idcg > 0.0 {
            total += dcg / idcg;
        }
    }
    mean_over_queries(total, ground_truth, results)
}

/// Every quality metric at once.
///
/// # Errors
/// `InvalidParameter` if the number of result rows differs from the number
/// of ground truth rows.
pub fn calculate_all(
    ground_truth: &[GroundTruthEntry],
    results: &[Vec<i64>],
    k: usize,
) -> Result<RecallMetrics> {
    if ground_truth.len() != results.len() {
        return Err(RecallError::invalid_parameter(format!(
            "mismatched lengths: ground truth has {} rows, results have {}",
            ground_truth.len(),
            results.len()
        )));
    }

    let [c1, c10, c100] = RECALL_CUTOFFS;
    Ok(RecallMetrics {
        recall1: calculate_recall(ground_truth, results, c1),
        recall10: calculate_recall(ground_truth, results, c10),
        recall100: calculate_recall(ground_truth, results, c100),
        recall_k: calculate_recall(ground_truth, results, k),
        precision: calculate_precision(ground_truth, results, k),
        mrr: calculate_mrr(ground_truth, results),
        ndcg: calculate_ndcg(ground_truth, results, k),
    })
}

/// Percentiles, extremes, and throughput of a latency sample.
///
/// Percentile `p` is element `len * p / 100` of the sorted sample. An empty
/// sample yields all-zero metrics.
pub fn measure_latencies(latencies: &[Duration]) -> PerformanceMetrics {
    if latencies.is_empty() {
        return PerformanceMetrics::default();
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();
    let len = sorted.len();
    let percentile = |p: usize| sorted[(len * p / 100).min(len - 1)];

    let total: Duration = latencies.iter().sum();
    let avg = total / len as u32;
    let qps = if avg.is_zero() {
        0.0
    } else {
        1.0 / avg.as_secs_f64()
    };

    PerformanceMetrics {
        p50: percentile(50),
        p95: percentile(95),
        p99: percentile(99),
        qps,
        total,
        avg,
        min: sorted[0],
        max: sorted[len - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt(rows: &[&[i64]]) -> Vec<GroundTruthEntry> {
        rows.iter().map(|r| GroundTruthEntry::new(r.to_vec())).collect()
    }

    fn res(rows: &[&[i64]]) -> Vec<Vec<i64>> {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_perfect_recall() {
        let truth = gt(&[&[1, 2, 3], &[4, 5, 6]]);
        let found = res(&[&[1, 2, 3], &[4, 5, 6]]);
        let m = calculate_all(&truth, &found, 3).unwrap();
        assert_eq!(m.recall1, 1.0);
        assert_eq!(m.recall10, 1.0);
        assert_eq!(m.recall100, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.mrr, 1.0);
        assert!((m.ndcg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_recall() {
        let truth = gt(&[&[1, 2, 3, 4]]);
        let found = res(&[&[1, 9, 3, 8]]);
        assert_eq!(calculate_recall(&truth, &found, 4), 0.5);
        assert_eq!(calculate_recall(&truth, &found, 1), 1.0);
        // Top-2 of truth is {1, 2}; only 1 was returned in the top 2.
        assert_eq!(calculate_recall(&truth, &found, 2), 0.5);
    }

    #[test]
    fn test_recall_cutoff_shrinks_to_shorter_row() {
        let truth = gt(&[&[7, 8]]);
        let found = res(&[&[8, 7, 1, 2]]);
        assert_eq!(calculate_recall(&truth, &found, 100), 1.0);
    }

    #[test]
    fn test_empty_rows_count_toward_mean() {
        let truth = gt(&[&[1], &[2]]);
        let found = res(&[&[1], &[]]);
        assert_eq!(calculate_recall(&truth, &found, 1), 0.5);
        assert_eq!(calculate_recall(&[], &[], 10), 0.0);
    }

    #[test]
    fn test_precision_uses_whole_truth_row() {
        let truth = gt(&[&[1, 2, 3, 4]]);
        let found = res(&[&[4, 3, 9]]);
        let p = calculate_precision(&truth, &found, 3);
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mrr() {
        let truth = gt(&[&[5], &[6], &[7]]);
        let found = res(&[&[5, 1], &[1, 6], &[1, 2]]);
        let mrr = calculate_mrr(&truth, &found);
        assert!((mrr - (1.0 + 0.5 + 0.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_penalizes_swaps() {
        let truth = gt(&[&[1, 2]]);
        let swapped = res(&[&[2, 1]]);
        let ndcg = calculate_ndcg(&truth, &swapped, 2);
        // dcg = 1/1 + 2/log2(3); idcg = 2/1 + 1/log2(3)
        let expected = (1.0 + 2.0 / 3f64.log2()) / (2.0 + 1.0 / 3f64.log2());
        assert!((ndcg - expected).abs() < 1e-12);
        assert!(ndcg < 1.0);
    }

    #[test]
    fn test_calculate_all_rejects_mismatched_rows() {
        let truth = gt(&[&[1], &[2]]);
        let found = res(&[&[1]]);
        assert!(matches!(
            calculate_all(&truth, &found, 1),
            Err(RecallError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_recall_is_bounded() {
        let truth = gt(&[&[1, 2, 3], &[4, 5, 6], &[7, 8, 9]]);
        let found = res(&[&[3, 3, 3], &[6, 5, 4, 1, 2], &[]]);
        for k in RECALL_CUTOFFS {
            let r = calculate_recall(&truth, &found, k);
            assert!((0.0..=1.0).contains(&r), "recall@{} = {}", k, r);
        }
    }

    #[test]
    fn test_latency_percentiles() {
        let latencies: Vec<Duration> = (1..=100).rev().map(Duration::from_millis).collect();
        let perf = measure_latencies(&latencies);
        assert_eq!(perf.p50, Duration::from_millis(51));
        assert_eq!(perf.p95, Duration::from_millis(96));
        assert_eq!(perf.p99, Duration::from_millis(100));
        assert_eq!(perf.min, Duration::from_millis(1));
        assert_eq!(perf.max, Duration::from_millis(100));
        assert_eq!(perf.total, Duration::from_millis(5050));
        assert_eq!(perf.avg, Duration::from_micros(50_500));
        assert!((perf.qps - 1.0 / 0.0505).abs() < 1e-6);
    }

    #[test]
    fn test_latency_single_sample_and_empty() {
        let perf = measure_latencies(&[Duration::from_micros(10)]);
        assert_eq!(perf.p99, Duration::from_micros(10));
        assert!((perf.qps - 100_000.0).abs() < 1e-6);

        assert_eq!(measure_latencies(&[]), PerformanceMetrics::default());
        assert_eq!(measure_latencies(&[Duration::ZERO]).qps, 0.0);
    }

    #[test]
    fn test_display_formats() {
        let m = RecallMetrics {
            recall1: 1.0,
            recall10: 0.95,
            ..Default::default()
        };
        assert_eq!(
            m.to_string(),
            "Recall@1=1.0000, Recall@10=0.9500, Recall@100=0.0000, Precision=0.0000, MRR=0.0000, NDCG=0.0000"
        );

        let p = PerformanceMetrics {
            qps: 1234.4,
            p50: Duration::from_nanos(1_499),
            p95: Duration::from_nanos(2_500),
            p99: Duration::from_millis(3),
            avg: Duration::from_micros(800),
            ..Default::default()
        };
        assert_eq!(p.to_string(), "QPS=1234, P50=1µs, P95=3µs, P99=3ms, Avg=800µs");
    }

    #[test]
    fn test_at_cutoff() {
        let m = RecallMetrics {
            recall100: 0.5,
            ..Default::default()
        };
        assert_eq!(m.at_cutoff(100), Some(0.5));
        assert_eq!(m.at_cutoff(5), None);
    }
}
