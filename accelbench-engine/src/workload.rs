//! Timed workloads against one or both backends.
//!
//! A [`Workload`] issues one kind of call repeatedly, strictly one after
//! another, and times each call individually. The timer brackets exactly the one
//! call, plus reading the body for gets. Samples are reduced per backend into
//! [`PerfStats`] and returned as a [`Report`].
//!
//! The first failing call aborts the workload. Statistics over a truncated
//! sample set would be misleading, so nothing of a partial run is returned.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::time::Instant;

use crate::client::{BackendTarget, Backends, GetObjectResponse, MAX_LIST_KEYS};
use crate::digest;
use crate::error::Result;
use crate::report::{ObjectCount, Report};
use crate::stats::{PerfStats, aggregate_rate};

/// Number of listing calls issued per backend.
pub const LIST_ITERATIONS: usize = 10;

/// Prefix of generated key names.
const KEY_PREFIX: &str = "accelbench-perf";

/// How much of an object body a get reads before the timer stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Drain the complete body.
    Full,
    /// Stop after the first byte arrived.
    FirstByte,
}

/// Contents uploaded by a put workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// A fresh random payload of this many bytes for every key.
    Random(usize),
    /// The same bytes for every key.
    Fixed(Bytes),
}

impl Payload {
    fn generate(&self) -> Bytes {
        match self {
            Self::Random(len) => random_payload(*len),
            Self::Fixed(bytes) => bytes.clone(),
        }
    }
}

/// Generates `count` synthetic key names for put and delete workloads.
pub fn generate_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{KEY_PREFIX}{i}")).collect()
}

/// Generates a random alphanumeric payload of `len` bytes.
pub fn random_payload(len: usize) -> Bytes {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .collect::<Vec<u8>>()
        .into()
}

fn elapsed_ms(start: Instant) -> f64 {
    duration_ms(start.elapsed())
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// A timed workload against the selected backends of one bucket.
#[derive(Debug)]
pub struct Workload<'a> {
    backends: &'a Backends,
    bucket: &'a str,
    targets: Vec<BackendTarget>,
}

impl<'a> Workload<'a> {
    /// Creates a workload that runs against both backends.
    pub fn new(backends: &'a Backends, bucket: &'a str) -> Self {
        Self {
            backends,
            bucket,
            targets: BackendTarget::ALL.to_vec(),
        }
    }

    /// Restricts the workload to the given backends.
    pub fn targets(mut self, targets: impl IntoIterator<Item = BackendTarget>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Discovers up to `max_keys` existing keys by listing the origin once.
    ///
    /// The origin is listed regardless of the selected targets, since it holds the
    /// authoritative set of objects.
    pub async fn discover_keys(&self, max_keys: usize) -> Result<Vec<String>> {
        let keys = self
            .backends
            .client(BackendTarget::Origin)
            .list_objects(self.bucket, max_keys.min(MAX_LIST_KEYS))
            .await?;
        tracing::debug!(bucket = self.bucket, count = keys.len(), "discovered keys");
        Ok(keys)
    }

    /// Lists up to 1000 keys [`LIST_ITERATIONS`] times per backend.
    ///
    /// Besides latency, every call records the objects returned per millisecond.
    /// The latency set always holds [`LIST_ITERATIONS`] samples per backend. Calls
    /// that took no measurable time have no rate, so the throughput set may hold
    /// fewer samples, and none at all when every call was instant.
    pub async fn list(&self) -> Result<Report> {
        let mut report = Report::new();

        for &target in &self.targets {
            let client = self.backends.client(target);
            let mut latencies = Vec::with_capacity(LIST_ITERATIONS);
            let mut throughputs = Vec::with_capacity(LIST_ITERATIONS);

            for _ in 0..LIST_ITERATIONS {
                let start = Instant::now();
                let keys = client.list_objects(self.bucket, MAX_LIST_KEYS).await?;
                let latency = elapsed_ms(start);

                latencies.push(latency);
                throughputs.extend(aggregate_rate(keys.len(), latency));
            }

            tracing::debug!(%target, "finished list workload");
            let stats = PerfStats::builder(&latencies)
                .per_call_throughput(&throughputs)
                .build();
            report.insert_perf(format!("{target}_list_objects_v2_perf_stats"), stats);
        }

        Ok(report)
    }

    /// Uploads a payload for every key.
    ///
    /// Each payload is uploaded to every selected backend before moving on to the
    /// next key, so both backends store identical contents.
    pub async fn put(&self, keys: &[String], payload: &Payload) -> Result<Report> {
        let mut latencies = self.latency_sets(keys.len());

        for key in keys {
            let payload = payload.generate();
            for &target in &self.targets {
                let client = self.backends.client(target);

                let start = Instant::now();
                client.put_object(self.bucket, key, payload.clone()).await?;
                push(&mut latencies, target, elapsed_ms(start));
            }
        }

        tracing::debug!(count = keys.len(), "finished put workload");
        Ok(latency_report(latencies, "put_obj"))
    }

    /// Deletes every key from every selected backend.
    pub async fn delete(&self, keys: &[String]) -> Result<Report> {
        let mut latencies = self.latency_sets(keys.len());

        for key in keys {
            for &target in &self.targets {
                let client = self.backends.client(target);

                let start = Instant::now();
                client.delete_object(self.bucket, key).await?;
                push(&mut latencies, target, elapsed_ms(start));
            }
        }

        tracing::debug!(count = keys.len(), "finished delete workload");
        Ok(latency_report(latencies, "del_obj"))
    }

    /// Fetches every key from every selected backend.
    ///
    /// Besides latency, this records the object size and counts objects as
    /// compressed or uncompressed per backend.
    pub async fn get(&self, keys: &[String], mode: ReadMode) -> Result<Report> {
        let group = match mode {
            ReadMode::Full => "get_obj",
            ReadMode::FirstByte => "get_obj_ttfb",
        };
        self.read_objects(keys, mode, group).await
    }

    /// Fetches every key through the accelerator only.
    ///
    /// This measures the passthrough path for objects the accelerator does not
    /// cache, so there is no origin to compare against.
    pub async fn get_passthrough(&self, keys: &[String], mode: ReadMode) -> Result<Report> {
        let group = match mode {
            ReadMode::Full => "get_obj_pt",
            ReadMode::FirstByte => "get_obj_pt_ttfb",
        };
        let workload = Workload {
            backends: self.backends,
            bucket: self.bucket,
            targets: vec![BackendTarget::Accelerator],
        };
        workload.read_objects(keys, mode, group).await
    }

    async fn read_objects(&self, keys: &[String], mode: ReadMode, group: &str) -> Result<Report> {
        let mut report = Report::new();
        let mut counts = BTreeMap::new();

        for &target in &self.targets {
            let client = self.backends.client(target);
            let mut latencies = Vec::with_capacity(keys.len());
            let mut sizes = Vec::with_capacity(keys.len());
            let count: &mut ObjectCount = counts.entry(target).or_default();

            for key in keys {
                let start = Instant::now();
                let response = client.get_object(self.bucket, key).await?;
                let GetObjectResponse {
                    content_encoding,
                    content_length,
                    mut stream,
                } = response;

                match mode {
                    ReadMode::FirstByte => {
                        while let Some(chunk) = stream.try_next().await? {
                            if !chunk.is_empty() {
                                break;
                            }
                        }
                    }
                    ReadMode::Full => while stream.try_next().await?.is_some() {},
                }
                latencies.push(elapsed_ms(start));
                drop(stream);

                sizes.push(content_length);
                count.record(digest::is_compressed(content_encoding.as_deref(), key));
            }

            tracing::debug!(%target, ?mode, count = keys.len(), "finished get workload");
            let stats = PerfStats::builder(&latencies).object_sizes(&sizes).build();
            report.insert_perf(format!("{target}_{group}_perf_stats"), stats);
        }

        report.insert_object_counts(&counts);
        Ok(report)
    }

    fn latency_sets(&self, capacity: usize) -> BTreeMap<BackendTarget, Vec<f64>> {
        self.targets
            .iter()
            .map(|&target| (target, Vec::with_capacity(capacity)))
            .collect()
    }
}

fn push(latencies: &mut BTreeMap<BackendTarget, Vec<f64>>, target: BackendTarget, sample: f64) {
    latencies.entry(target).or_default().push(sample);
}

fn latency_report(latencies: BTreeMap<BackendTarget, Vec<f64>>, group: &str) -> Report {
    let mut report = Report::new();
    for (target, samples) in latencies {
        let stats = PerfStats::builder(&samples).build();
        report.insert_perf(format!("{target}_{group}_perf_stats"), stats);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_synthetic() {
        let keys = generate_keys(3);
        assert_eq!(
            keys,
            ["accelbench-perf0", "accelbench-perf1", "accelbench-perf2"]
        );
    }

    #[test]
    fn payload_is_alphanumeric() {
        let payload = random_payload(100);
        assert_eq!(payload.len(), 100);
        assert!(payload.iter().all(u8::is_ascii_alphanumeric));
    }

    #[test]
    fn fixed_payload_is_reused() {
        let payload = Payload::Fixed(Bytes::from_static(b"value"));
        assert_eq!(payload.generate(), "value");
        assert_eq!(Payload::Random(7).generate().len(), 7);
    }

    #[test]
    fn converts_durations_to_millis() {
        assert_eq!(duration_ms(Duration::from_millis(2)), 2.0);
        assert!(duration_ms(Duration::from_micros(2500)) > 2.0);
    }
}
