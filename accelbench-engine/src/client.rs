//! The object store capability consumed by the engine.
//!
//! The engine never talks to a network itself. It is handed one
//! [`ObjectStoreClient`] for the origin and one for the accelerator, and every
//! measurement brackets exactly one call on one of them.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Upper bound for keys returned by a single listing request.
pub const MAX_LIST_KEYS: usize = 1000;

/// A type-erased [`ObjectStoreClient`] instance.
pub type BoxedClient = Box<dyn ObjectStoreClient>;

/// The body of an object, delivered in chunks.
pub type PayloadStream = BoxStream<'static, Result<Bytes>>;

/// Which of the two backends a call is issued against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTarget {
    /// The authoritative backing object store.
    #[serde(alias = "s3")]
    Origin,
    /// The caching layer under test.
    #[serde(alias = "bolt")]
    Accelerator,
}

impl BackendTarget {
    /// Both backends, in the order they are benchmarked.
    pub const ALL: [Self; 2] = [Self::Origin, Self::Accelerator];

    /// Name used as a prefix in report group names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a successful [`get_object`](ObjectStoreClient::get_object) call.
pub struct GetObjectResponse {
    /// The transport encoding announced by the backend, e.g. `gzip`.
    pub content_encoding: Option<String>,
    /// The object size in bytes as reported by the backend.
    pub content_length: u64,
    /// The response body.
    pub stream: PayloadStream,
}

impl GetObjectResponse {
    /// Loads the object payload fully into memory.
    pub async fn payload(self) -> Result<Bytes> {
        let bytes: BytesMut = self.stream.try_collect().await?;
        Ok(bytes.freeze())
    }
}

impl fmt::Debug for GetObjectResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectResponse")
            .field("content_encoding", &self.content_encoding)
            .field("content_length", &self.content_length)
            .field("stream", &format_args!("[Stream]"))
            .finish()
    }
}

/// Object metadata returned by [`head_object`](ObjectStoreClient::head_object).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadObjectResponse {
    /// The object size in bytes.
    pub content_length: u64,
    /// The transport encoding the object is stored with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// The entity tag, including its quotes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    /// Time of the last modification, as reported by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Version of the object in versioned buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Storage class of the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// Expiration rule matching the object, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

/// A bucket-scoped object store, either the origin or the accelerator.
///
/// Implementations own transport, authentication and endpoint selection. Missing
/// objects and rejected calls are reported as [`Error::Backend`](crate::Error::Backend)
/// carrying the store's error code.
#[async_trait::async_trait]
pub trait ObjectStoreClient: fmt::Debug + Send + Sync + 'static {
    /// The client name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Retrieves an object, returning its encoding, size and a stream of its body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectResponse>;

    /// Retrieves the metadata of an object without its body.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectResponse>;

    /// Stores or overwrites an object.
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()>;

    /// Deletes an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Lists up to `max_keys` keys of the bucket in the store's order.
    async fn list_objects(&self, bucket: &str, max_keys: usize) -> Result<Vec<String>>;
}

/// The pair of clients an invocation runs against.
///
/// Both handles are constructed by the caller and handed in, so the engine never
/// resolves endpoints or credentials on its own.
#[derive(Debug)]
pub struct Backends {
    origin: BoxedClient,
    accelerator: BoxedClient,
}

impl Backends {
    /// Pairs an already configured origin and accelerator client.
    pub fn new(origin: BoxedClient, accelerator: BoxedClient) -> Self {
        Self {
            origin,
            accelerator,
        }
    }

    /// Returns the client for the given backend.
    pub fn client(&self, target: BackendTarget) -> &dyn ObjectStoreClient {
        match target {
            BackendTarget::Origin => self.origin.as_ref(),
            BackendTarget::Accelerator => self.accelerator.as_ref(),
        }
    }
}
