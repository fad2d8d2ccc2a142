//! Reduction of raw samples into summary statistics.
//!
//! Percentiles use the nearest-rank method on the ascending-sorted samples:
//! `p50` is the sample at index `floor(n * 0.5)` and `p90` the sample at index
//! `floor(n * 0.9)`. No interpolation happens between samples, so every reported
//! percentile is a value that was actually observed. Results are compared
//! against earlier runs, which is why this exact definition must not change.

use std::cmp::Ordering;

use serde::Serialize;

/// A numeric observation that can be summarized.
pub trait Sample: Copy + PartialOrd + Default {
    /// The sample as a float, used to compute averages.
    fn to_f64(self) -> f64;
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

impl Sample for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Average and nearest-rank percentiles of a sample sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary<T> {
    /// Arithmetic mean, `0` for an empty sequence.
    pub average: f64,
    /// The sample at index `floor(n * 0.5)` after sorting.
    pub p50: T,
    /// The sample at index `floor(n * 0.9)` after sorting.
    pub p90: T,
}

/// Reduces samples into a [`Summary`].
///
/// An empty sequence yields an average of `0` and default percentiles.
pub fn aggregate<T: Sample>(samples: &[T]) -> Summary<T> {
    if samples.is_empty() {
        return Summary {
            average: 0.0,
            p50: T::default(),
            p90: T::default(),
        };
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let len = sorted.len();
    let average = sorted.iter().map(|sample| sample.to_f64()).sum::<f64>() / len as f64;

    Summary {
        average,
        p50: sorted[nearest_rank(len, 0.5)],
        p90: sorted[nearest_rank(len, 0.9)],
    }
}

fn nearest_rank(len: usize, quantile: f64) -> usize {
    ((len as f64 * quantile) as usize).min(len - 1)
}

/// Operations per millisecond over the total time spent in them.
///
/// Returns `None` when no time was spent at all, since the rate is undefined.
pub fn aggregate_rate(count: usize, total_ms: f64) -> Option<f64> {
    (total_ms > 0.0).then(|| count as f64 / total_ms)
}

/// Throughput of an operation in objects per millisecond.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Throughput {
    /// Summary of a throughput measured individually for every call.
    PerCall(Summary<f64>),
    /// A single rate, derived as call count over the sum of call durations.
    Aggregate {
        /// The rate, `null` when the durations sum to zero.
        throughput: Option<f64>,
    },
}

/// Performance statistics of one operation against one backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfStats {
    /// Call latency in milliseconds.
    pub latency: Summary<f64>,
    /// Objects per millisecond.
    pub throughput: Throughput,
    /// Object size in bytes, tracked for reads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_size: Option<Summary<u64>>,
}

impl PerfStats {
    /// Starts building statistics from per-call latencies in milliseconds.
    pub fn builder(latencies: &[f64]) -> PerfStatsBuilder<'_> {
        PerfStatsBuilder {
            latencies,
            throughputs: None,
            object_sizes: None,
        }
    }
}

/// A builder for [`PerfStats`].
#[derive(Debug)]
pub struct PerfStatsBuilder<'a> {
    latencies: &'a [f64],
    throughputs: Option<&'a [f64]>,
    object_sizes: Option<&'a [u64]>,
}

impl<'a> PerfStatsBuilder<'a> {
    /// Summarizes a throughput measured for every call instead of the aggregate rate.
    pub fn per_call_throughput(mut self, throughputs: &'a [f64]) -> Self {
        self.throughputs = Some(throughputs);
        self
    }

    /// Also summarizes object sizes in bytes.
    pub fn object_sizes(mut self, object_sizes: &'a [u64]) -> Self {
        self.object_sizes = Some(object_sizes);
        self
    }

    /// Computes the statistics.
    pub fn build(self) -> PerfStats {
        let throughput = match self.throughputs {
            Some(throughputs) => Throughput::PerCall(aggregate(throughputs)),
            None => Throughput::Aggregate {
                throughput: aggregate_rate(self.latencies.len(), self.latencies.iter().sum()),
            },
        };

        PerfStats {
            latency: aggregate(self.latencies),
            throughput,
            object_size: self.object_sizes.map(aggregate),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn percentiles_use_nearest_rank() {
        let mut rng = SmallRng::seed_from_u64(7);

        for len in 1..200 {
            let samples: Vec<u64> = (0..len).map(|_| rng.random_range(0..10_000)).collect();
            let mut sorted = samples.clone();
            sorted.sort_unstable();

            let summary = aggregate(&samples);
            let expected_avg = samples.iter().sum::<u64>() as f64 / len as f64;

            assert_eq!(summary.p50, sorted[len / 2]);
            assert_eq!(summary.p90, sorted[(len as f64 * 0.9) as usize]);
            assert!((summary.average - expected_avg).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_samples_average_to_zero() {
        let summary = aggregate::<f64>(&[]);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.p50, 0.0);
        assert_eq!(summary.p90, 0.0);
    }

    #[test]
    fn small_sets_report_maximum_as_p90() {
        assert_eq!(aggregate(&[3.0, 1.0, 2.0]).p90, 3.0);
        assert_eq!(aggregate(&[3.0, 1.0, 2.0]).p50, 2.0);

        let ten: Vec<u64> = (1..=10).collect();
        let summary = aggregate(&ten);
        assert_eq!(summary.p50, 6);
        assert_eq!(summary.p90, 10);
        assert_eq!(summary.average, 5.5);
    }

    #[test]
    fn aggregate_rate_is_undefined_without_time() {
        assert_eq!(aggregate_rate(5, 0.0), None);
        assert_eq!(aggregate_rate(5, 10.0), Some(0.5));
    }

    #[test]
    fn builder_selects_throughput_variant() {
        let stats = PerfStats::builder(&[2.0, 2.0, 4.0]).build();
        assert_eq!(
            stats.throughput,
            Throughput::Aggregate {
                throughput: Some(3.0 / 8.0)
            }
        );
        assert_eq!(stats.object_size, None);

        let stats = PerfStats::builder(&[2.0, 4.0])
            .per_call_throughput(&[500.0, 250.0])
            .object_sizes(&[10, 20])
            .build();
        assert_eq!(stats.throughput, Throughput::PerCall(aggregate(&[500.0, 250.0])));
        assert_eq!(stats.object_size.unwrap().p50, 20);
    }

    #[test]
    fn serializes_report_shape() {
        let stats = PerfStats::builder(&[2.0]).object_sizes(&[7]).build();
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "latency": {"average": 2.0, "p50": 2.0, "p90": 2.0},
                "throughput": {"throughput": 0.5},
                "objectSize": {"average": 7.0, "p50": 7, "p90": 7},
            })
        );
    }
}
