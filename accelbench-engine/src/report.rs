//! Value types returned to the caller of an invocation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::{BackendTarget, HeadObjectResponse};
use crate::error::{Error, ErrorPayload};
use crate::stats::PerfStats;
use crate::validate::ComparisonResult;

/// Report group holding the compressed/uncompressed breakdown of read objects.
pub const OBJECT_COUNT_GROUP: &str = "object_count";

/// Count of read objects by compression classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ObjectCount {
    /// Objects with gzip encoding or a `.gz` key.
    pub compressed: u64,
    /// All other objects.
    pub uncompressed: u64,
}

impl ObjectCount {
    /// Counts one object.
    pub fn record(&mut self, compressed: bool) {
        if compressed {
            self.compressed += 1;
        } else {
            self.uncompressed += 1;
        }
    }
}

/// A single named entry of a [`Report`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportGroup {
    /// Statistics of one operation against one backend.
    Perf(PerfStats),
    /// Object counts keyed by `<backend>Count`.
    ObjectCount(BTreeMap<String, ObjectCount>),
}

/// Statistic groups of a benchmark run, keyed by group name such as
/// `origin_get_obj_perf_stats`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report(BTreeMap<String, ReportGroup>);

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the statistics of one operation against one backend.
    pub fn insert_perf(&mut self, name: impl Into<String>, stats: PerfStats) {
        self.0.insert(name.into(), ReportGroup::Perf(stats));
    }

    /// Adds the per-backend object counts under [`OBJECT_COUNT_GROUP`].
    pub fn insert_object_counts(&mut self, counts: &BTreeMap<BackendTarget, ObjectCount>) {
        let counts = counts
            .iter()
            .map(|(backend, count)| (format!("{backend}Count"), *count))
            .collect();
        self.0
            .insert(OBJECT_COUNT_GROUP.to_owned(), ReportGroup::ObjectCount(counts));
    }

    /// Moves all groups of `other` into this report.
    pub fn merge(&mut self, other: Report) {
        self.0.extend(other.0);
    }

    /// Returns the group with the given name.
    pub fn get(&self, name: &str) -> Option<&ReportGroup> {
        self.0.get(name)
    }

    /// Returns the statistics group with the given name.
    pub fn perf(&self, name: &str) -> Option<&PerfStats> {
        match self.0.get(name)? {
            ReportGroup::Perf(stats) => Some(stats),
            ReportGroup::ObjectCount(_) => None,
        }
    }

    /// Returns the object count recorded for a backend.
    pub fn object_count(&self, backend: BackendTarget) -> Option<ObjectCount> {
        match self.0.get(OBJECT_COUNT_GROUP)? {
            ReportGroup::ObjectCount(counts) => counts.get(&format!("{backend}Count")).copied(),
            ReportGroup::Perf(_) => None,
        }
    }

    /// Names of all groups in this report.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// The outcome of one invocation, serialized as the response body.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Statistics of a benchmark run.
    Report(Report),
    /// Digests of one object fetched from both backends.
    Comparison(ComparisonResult),
    /// Raw digest of one object fetched from a single backend.
    Digest {
        /// MD5 of the raw payload as uppercase hex.
        md5: String,
    },
    /// Metadata of one object.
    Head(HeadObjectResponse),
    /// Keys returned by a single listing.
    Keys {
        /// The listed keys, in listing order.
        objects: Vec<String>,
    },
    /// The invocation failed as a whole.
    Error(ErrorPayload),
}

impl Response {
    /// Returns `true` if the invocation failed as a whole.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::Error(err.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_unions_groups() {
        let mut first = Report::new();
        first.insert_perf("origin_put_obj_perf_stats", PerfStats::builder(&[1.0]).build());
        let mut second = Report::new();
        second.insert_perf("origin_del_obj_perf_stats", PerfStats::builder(&[1.0]).build());

        first.merge(second);

        let names: Vec<_> = first.group_names().collect();
        assert_eq!(
            names,
            ["origin_del_obj_perf_stats", "origin_put_obj_perf_stats"]
        );
    }

    #[test]
    fn object_counts_are_keyed_by_backend() {
        let mut counts = BTreeMap::new();
        counts
            .entry(BackendTarget::Accelerator)
            .or_insert_with(ObjectCount::default)
            .record(true);

        let mut report = Report::new();
        report.insert_object_counts(&counts);

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "object_count": {
                    "acceleratorCount": {"compressed": 1, "uncompressed": 0},
                },
            })
        );
        assert_eq!(report.object_count(BackendTarget::Origin), None);
    }

    #[test]
    fn error_response_is_flat() {
        let response = Response::from(Error::InvalidRequest("missing field `bucket`".into()));

        assert!(response.is_error());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "kind": "InvalidRequest",
                "errorMessage": "missing field `bucket`",
            })
        );
    }
}
