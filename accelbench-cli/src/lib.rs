//! Process bootstrap for the accelerator benchmark.
//!
//! This wires the [`accelbench_engine`] to two S3-compatible endpoints, one for the origin and
//! one for the accelerator, and executes a single request per invocation.

pub mod cli;
pub mod config;
pub mod observability;
pub mod s3_compatible;
