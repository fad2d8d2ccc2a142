//! Benchmark and validation engine for a caching accelerator in front of an
//! origin object store.
//!
//! The engine answers two questions:
//!
//! - Does the accelerator serve objects byte-identical to the origin? See
//!   [`validate::compare`], which fetches one object from both backends and
//!   reports content digests normalized for gzip framing.
//! - How do latency and throughput compare? See [`Workload`], which times
//!   list, put, delete and get calls against one or both backends and reduces
//!   the samples into nearest-rank percentiles with [`stats::aggregate`].
//!
//! Backends are reached only through the [`ObjectStoreClient`] trait. Callers
//! construct one client for the origin and one for the accelerator and hand
//! both to an [`Engine`], which executes [`Request`]s strictly sequentially.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod composite;
pub mod digest;
pub mod engine;
pub mod error;
pub mod in_memory;
pub mod report;
pub mod request;
pub mod stats;
pub mod validate;
pub mod workload;

pub use crate::client::{BackendTarget, Backends, BoxedClient, ObjectStoreClient};
pub use crate::engine::Engine;
pub use crate::error::{Error, ErrorPayload, Result};
pub use crate::report::{Report, Response};
pub use crate::request::{Operation, Request};
pub use crate::workload::{ReadMode, Workload};
