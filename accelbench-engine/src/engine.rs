//! Dispatch of validated requests to validators and workloads.

use crate::client::{Backends, BoxedClient};
use crate::composite;
use crate::digest;
use crate::error::{Error, Result};
use crate::report::Response;
use crate::request::{Operation, Request};
use crate::validate;
use crate::workload::{Payload, ReadMode, Workload, generate_keys};

/// Runs invocations against one origin and one accelerator client.
///
/// Every invocation produces a well-formed [`Response`]. Failures are returned
/// as [`Response::Error`] rather than propagated.
#[derive(Debug)]
pub struct Engine {
    backends: Backends,
}

impl Engine {
    /// Creates an engine for an already configured pair of clients.
    pub fn new(origin: BoxedClient, accelerator: BoxedClient) -> Self {
        Self {
            backends: Backends::new(origin, accelerator),
        }
    }

    /// Validates a raw JSON request and executes it.
    pub async fn handle(&self, request: serde_json::Value) -> Response {
        self.respond(Request::from_json(request)).await
    }

    /// Parses a serialized JSON request and executes it.
    pub async fn handle_slice(&self, request: &[u8]) -> Response {
        self.respond(Request::from_slice(request)).await
    }

    async fn respond(&self, request: Result<Request>) -> Response {
        match request {
            Ok(request) => self.execute(&request).await,
            Err(err) => {
                tracing::warn!(error = &err as &dyn std::error::Error, "rejected request");
                err.into()
            }
        }
    }

    /// Executes a validated request.
    pub async fn execute(&self, request: &Request) -> Response {
        tracing::info!(
            operation = %request.operation,
            bucket = request.bucket.as_str(),
            num_keys = request.num_keys,
            backend = ?request.backend,
            "executing request"
        );

        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    operation = %request.operation,
                    "request failed"
                );
                err.into()
            }
        }
    }

    async fn dispatch(&self, request: &Request) -> Result<Response> {
        let bucket = request.bucket.as_str();
        let workload = Workload::new(&self.backends, bucket).targets(request.targets());

        let report = match request.operation {
            Operation::List => workload.list().await?,
            Operation::Put => {
                let payload = match &request.value {
                    Some(value) => Payload::Fixed(value.clone().into()),
                    None => Payload::Random(request.object_length),
                };
                workload.put(&write_keys(request), &payload).await?
            }
            Operation::Delete => workload.delete(&write_keys(request)).await?,
            Operation::Get | Operation::GetTtfb => {
                let keys = workload.discover_keys(request.num_keys).await?;
                workload.get(&keys, read_mode(request.operation)).await?
            }
            Operation::GetPassthrough | Operation::GetPassthroughTtfb => {
                let keys = workload.discover_keys(request.num_keys).await?;
                workload
                    .get_passthrough(&keys, read_mode(request.operation))
                    .await?
            }
            Operation::All => {
                composite::run_all(&workload, request.num_keys, request.object_length).await?
            }
            Operation::ValidateMd5 | Operation::Compare => {
                let key = required_key(request)?;
                let result =
                    validate::compare(&self.backends, bucket, key, !request.bucket_clean).await;
                return Ok(Response::Comparison(result));
            }
            Operation::Head => {
                let client = self.backends.client(request.single_target());
                let head = client.head_object(bucket, required_key(request)?).await?;
                return Ok(Response::Head(head));
            }
            Operation::GetMd5 => {
                let client = self.backends.client(request.single_target());
                let response = client.get_object(bucket, required_key(request)?).await?;
                let md5 = digest::md5_hex(&response.payload().await?);
                return Ok(Response::Digest { md5 });
            }
            Operation::ListKeys => {
                let client = self.backends.client(request.single_target());
                let objects = client.list_objects(bucket, request.num_keys).await?;
                return Ok(Response::Keys { objects });
            }
        };

        Ok(Response::Report(report))
    }
}

fn read_mode(operation: Operation) -> ReadMode {
    match operation {
        Operation::GetTtfb | Operation::GetPassthroughTtfb => ReadMode::FirstByte,
        _ => ReadMode::Full,
    }
}

/// Keys for put and delete: the supplied key alone, or synthetic ones.
fn write_keys(request: &Request) -> Vec<String> {
    match &request.key {
        Some(key) => vec![key.clone()],
        None => generate_keys(request.num_keys),
    }
}

fn required_key(request: &Request) -> Result<&str> {
    request.key.as_deref().ok_or_else(|| {
        Error::InvalidRequest(format!(
            "operation `{}` requires field `key`",
            request.operation
        ))
    })
}
