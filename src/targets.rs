//! Quality and performance thresholds, and the validator that checks them.
//!
//! Every threshold is optional. A missing threshold, or a zero one, is not
//! checked. Validation evaluates every configured threshold and reports all
//! violations together; it never stops at the first.

use crate::metrics::{round_to_micros, PerformanceMetrics, RecallMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Named recall target levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetPreset {
    HighPrecision,
    Balanced,
    HighThroughput,
    Approximate,
}

/// Minimum recall at the standard cutoffs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallTargets {
    pub min_recall1: Option<f64>,
    pub min_recall10: Option<f64>,
    pub min_recall100: Option<f64>,
}

impl RecallTargets {
    /// No recall checks.
    pub fn none() -> Self {
        Self::default()
    }

    /// Targets for a named level.
    ///
    /// | Preset | R@1 | R@10 | R@100 |
    /// |--------|-----|------|-------|
    /// | `HighPrecision` | 0.99 | 0.99 | 0.98 |
    /// | `Balanced` | 0.95 | 0.95 | 0.90 |
    /// | `HighThroughput` | 0.80 | 0.85 | 0.80 |
    /// | `Approximate` | 0.70 | 0.75 | 0.70 |
    pub fn preset(preset: TargetPreset) -> Self {
        let (r1, r10, r100) = match preset {
            TargetPreset::HighPrecision => (0.99, 0.99, 0.98),
            TargetPreset::Balanced => (0.95, 0.95, 0.90),
            TargetPreset::HighThroughput => (0.80, 0.85, 0.80),
            TargetPreset::Approximate => (0.70, 0.75, 0.70),
        };
        Self {
            min_recall1: Some(r1),
            min_recall10: Some(r10),
            min_recall100: Some(r100),
        }
    }

    pub fn with_min_recall1(mut self, min: f64) -> Self {
        self.min_recall1 = Some(min);
        self
    }

    pub fn with_min_recall10(mut self, min: f64) -> Self {
        self.min_recall10 = Some(min);
        self
    }

    pub fn with_min_recall100(mut self, min: f64) -> Self {
        self.min_recall100 = Some(min);
        self
    }
}

/// Latency and throughput limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTargets {
    pub max_p99: Option<Duration>,
    pub min_qps: Option<f64>,
}

impl PerformanceTargets {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_p99(mut self, max: Duration) -> Self {
        self.max_p99 = Some(max);
        self
    }

    pub fn with_min_qps(mut self, min: f64) -> Self {
        self.min_qps = Some(min);
        self
    }
}

/// Which metric a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetMetric {
    Recall1,
    Recall10,
    Recall100,
    P99Latency,
    Qps,
}

/// One threshold that was not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetViolation {
    RecallTooLow {
        cutoff: usize,
        observed: f64,
        minimum: f64,
    },
    LatencyTooHigh {
        observed: Duration,
        maximum: Duration,
    },
    ThroughputTooLow {
        observed: f64,
        minimum: f64,
    },
}

impl TargetViolation {
    pub fn metric(&self) -> TargetMetric {
        match self {
            Self::RecallTooLow { cutoff: 1, .. } => TargetMetric::Recall1,
            Self::RecallTooLow { cutoff: 10, .. } => TargetMetric::Recall10,
            Self::RecallTooLow { .. } => TargetMetric::Recall100,
            Self::LatencyTooHigh { .. } => TargetMetric::P99Latency,
            Self::ThroughputTooLow { .. } => TargetMetric::Qps,
        }
    }
}

impl fmt::Display for TargetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecallTooLow {
                cutoff,
                observed,
                minimum,
            } => write!(f, "Recall@{} too low: {:.4} < {:.4}", cutoff, observed, minimum),
            Self::LatencyTooHigh { observed, maximum } => write!(
                f,
                "P99 latency too high: {:?} > {:?}",
                round_to_micros(*observed),
                round_to_micros(*maximum)
            ),
            Self::ThroughputTooLow { observed, minimum } => {
                write!(f, "QPS too low: {:.0} < {:.0}", observed, minimum)
            }
        }
    }
}

fn enabled(threshold: Option<f64>) -> Option<f64> {
    threshold.filter(|&t| t > 0.0)
}

/// Check metrics against targets and return every violation.
///
/// Each violation is also logged at `warn` under the test's `name`.
pub fn validate(
    name: &str,
    recall_targets: &RecallTargets,
    perf_targets: &PerformanceTargets,
    metrics: &RecallMetrics,
    perf: &PerformanceMetrics,
) -> Vec<TargetViolation> {
    let mut violations = Vec::new();

    let recall_checks = [
        (1, recall_targets.min_recall1, metrics.recall1),
        (10, recall_targets.min_recall10, metrics.recall10),
        (100, recall_targets.min_recall100, metrics.recall100),
    ];
    for (cutoff, minimum, observed) in recall_checks {
        if let Some(minimum) = enabled(minimum) {
            if observed < minimum {
                violations.push(TargetViolation::RecallTooLow {
                    cutoff,
                    observed,
                    minimum,
                });
            }
        }
    }

    if let Some(maximum) = perf_targets.max_p99.filter(|m| !m.is_zero()) {
        if perf.p99 > maximum {
            violations.push(TargetViolation::LatencyTooHigh {
                observed: perf.p99,
                maximum,
            });
        }
    }

    if let Some(minimum) = enabled(perf_targets.min_qps) {
        if perf.qps < minimum {
            violations.push(TargetViolation::ThroughputTooLow {
                observed: perf.qps,
                minimum,
            });
        }
    }

    for v in &violations {
        warn!(test = name, metric = ?v.metric(), "{}", v);
    }
    violations
}
