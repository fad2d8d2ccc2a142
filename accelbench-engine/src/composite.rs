//! The combined benchmark of all object operations.

use crate::error::Result;
use crate::report::Report;
use crate::workload::{Payload, ReadMode, Workload, generate_keys};

/// Runs put, delete, list and get workloads in sequence and merges their reports.
///
/// Put and delete share one set of `num_keys` generated keys. The keys for the
/// get phase are discovered only after the deletes, so gets measure whatever
/// objects currently exist in the bucket. The first failing phase aborts the
/// remaining ones.
pub async fn run_all(workload: &Workload<'_>, num_keys: usize, object_length: usize) -> Result<Report> {
    let keys = generate_keys(num_keys);

    let mut report = workload.put(&keys, &Payload::Random(object_length)).await?;
    report.merge(workload.delete(&keys).await?);
    report.merge(workload.list().await?);

    let keys = workload.discover_keys(num_keys).await?;
    report.merge(workload.get(&keys, ReadMode::Full).await?);

    Ok(report)
}
