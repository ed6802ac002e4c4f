//! Latency aggregation over raw millisecond samples.
//!
//! Nearest-rank percentiles, computed exactly from the recorded samples.
//! No histogram bucketing: the sample counts involved (one entry per
//! completed cycle) stay small enough to keep and sort directly.

use serde::Serialize;

/// Summary statistics for one latency series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
}

impl LatencyStats {
    /// Summarize a sample set. All fields are zero for an empty set.
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        Self {
            avg: sum as f64 / sorted.len() as f64,
            p50: nearest_rank(&sorted, 50.0),
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice:
/// `sorted[clamp(ceil(p/100 * n) - 1, 0, n - 1)]`. Returns 0 for an
/// empty slice.
pub fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_rank_matches_reference_vectors() {
        let sorted = [10, 20, 30, 40];
        assert_eq!(nearest_rank(&sorted, 95.0), 40);
        assert_eq!(nearest_rank(&sorted, 50.0), 20);
        assert_eq!(nearest_rank(&sorted, 99.0), 40);
        assert_eq!(nearest_rank(&sorted, 1.0), 10);
    }

    #[test]
    fn empty_sample_set_yields_all_zeros() {
        let stats = LatencyStats::from_samples(&[]);
        assert_eq!(stats, LatencyStats::default());
        assert_eq!(stats.avg, 0.0);
        assert_eq!(nearest_rank(&[], 50.0), 0);
    }

    #[test]
    fn single_sample_dominates_every_field() {
        let stats = LatencyStats::from_samples(&[42]);
        assert_eq!(stats.avg, 42.0);
        assert_eq!(stats.p50, 42);
        assert_eq!(stats.p99, 42);
        assert_eq!(stats.min, 42);
        assert_eq!(stats.max, 42);
    }

    #[test]
    fn stats_are_computed_over_unsorted_input() {
        let stats = LatencyStats::from_samples(&[40, 10, 30, 20]);
        assert_eq!(stats.avg, 25.0);
        assert_eq!(stats.p50, 20);
        assert_eq!(stats.p95, 40);
        assert_eq!(stats.min, 10);
        assert_eq!(stats.max, 40);
    }
}
