//! An [`ObjectStoreClient`] for S3-compatible endpoints.
//!
//! Both the origin and the accelerator speak the S3 protocol, so the same client serves either
//! side. Buckets are named per request, so a bucket handle is created for every call.

use std::fmt;
use std::time::Duration;

use accelbench_engine::client::{GetObjectResponse, HeadObjectResponse};
use accelbench_engine::{Error, ObjectStoreClient, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::Endpoint;

/// The fields of an S3 `<Error>` document that end up in the error payload.
#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

impl ErrorDocument {
    /// Parses an error document, yielding an empty one for bodies that are not XML.
    fn parse(body: &str) -> Self {
        quick_xml::de::from_str(body).unwrap_or_default()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Builds the error for a call that was answered with a non-success status.
fn status_error(status: u16, body: &str) -> Error {
    let document = ErrorDocument::parse(body);
    let code = non_blank(document.code).unwrap_or_else(|| status_code_name(status));
    let message = non_blank(document.message)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    Error::backend(code, message)
}

/// Name of the error code that S3 reports for bodiless responses, such as `HEAD`.
fn status_code_name(status: u16) -> String {
    match status {
        301 => "PermanentRedirect".to_owned(),
        304 => "NotModified".to_owned(),
        400 => "BadRequest".to_owned(),
        403 => "Forbidden".to_owned(),
        404 => "NotFound".to_owned(),
        412 => "PreconditionFailed".to_owned(),
        503 => "SlowDown".to_owned(),
        _ => format!("Http{status}"),
    }
}

fn map_error(context: &'static str, err: S3Error) -> Error {
    match err {
        S3Error::HttpFailWithBody(status, body) => status_error(status, &body),
        other => Error::transport(context, other),
    }
}

fn check_status(status: u16, body: &[u8]) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(status_error(status, &String::from_utf8_lossy(body)))
    }
}

/// A client for one S3-compatible endpoint.
pub struct S3CompatibleClient {
    name: &'static str,
    region: Region,
    credentials: Credentials,
    path_style: bool,
    request_timeout: Option<Duration>,
}

impl S3CompatibleClient {
    /// Creates a client for the given endpoint.
    ///
    /// Credentials not present in the endpoint configuration are resolved from the environment.
    pub fn new(name: &'static str, config: &Endpoint) -> Result<Self> {
        let secret_key = config
            .secret_key
            .as_ref()
            .map(|secret| secret.expose_secret().as_str());

        let credentials = Credentials::new(config.access_key.as_deref(), secret_key, None, None, None)
            .map_err(|err| Error::transport("resolving credentials", err))?;

        Ok(Self {
            name,
            region: Region::Custom {
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
            },
            credentials,
            path_style: config.path_style,
            request_timeout: config.request_timeout,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|err| Error::transport("configuring bucket", err))?;

        if self.path_style {
            bucket = bucket.with_path_style();
        }

        if let Some(request_timeout) = self.request_timeout {
            bucket = bucket
                .with_request_timeout(request_timeout)
                .map_err(|err| Error::transport("configuring request timeout", err))?;
        }

        Ok(bucket)
    }
}

impl fmt::Debug for S3CompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3CompatibleClient")
            .field("name", &self.name)
            .field("endpoint", &self.region.endpoint())
            .field("path_style", &self.path_style)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ObjectStoreClient for S3CompatibleClient {
    fn name(&self) -> &'static str {
        self.name
    }

    #[tracing::instrument(level = "trace", fields(client = self.name, %bucket, %key), skip_all)]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectResponse> {
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .await
            .map_err(|err| map_error("reading object", err))?;
        check_status(response.status_code(), response.as_slice())?;

        let content_encoding = response
            .headers()
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-encoding"))
            .map(|(_, value)| value);

        // The response is buffered by the transport, so it is served as a single chunk.
        let bytes = Bytes::from(response.to_vec());
        tracing::trace!(len = bytes.len(), ?content_encoding, "read object");

        Ok(GetObjectResponse {
            content_encoding,
            content_length: bytes.len() as u64,
            stream: stream::iter(std::iter::once(Ok(bytes))).boxed(),
        })
    }

    #[tracing::instrument(level = "trace", fields(client = self.name, %bucket, %key), skip_all)]
    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectResponse> {
        let (head, status) = self
            .bucket(bucket)?
            .head_object(key)
            .await
            .map_err(|err| map_error("reading object metadata", err))?;
        check_status(status, &[])?;

        Ok(HeadObjectResponse {
            content_length: head
                .content_length
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or_default(),
            content_encoding: head.content_encoding,
            e_tag: head.e_tag,
            last_modified: head.last_modified,
            version_id: head.version_id,
            storage_class: head.storage_class,
            expiration: head.expiration,
        })
    }

    #[tracing::instrument(level = "trace", fields(client = self.name, %bucket, %key), skip_all)]
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .put_object(key, &payload)
            .await
            .map_err(|err| map_error("writing object", err))?;
        check_status(response.status_code(), response.as_slice())
    }

    #[tracing::instrument(level = "trace", fields(client = self.name, %bucket, %key), skip_all)]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|err| map_error("deleting object", err))?;
        check_status(response.status_code(), response.as_slice())
    }

    #[tracing::instrument(level = "trace", fields(client = self.name, %bucket), skip_all)]
    async fn list_objects(&self, bucket: &str, max_keys: usize) -> Result<Vec<String>> {
        let (page, status) = self
            .bucket(bucket)?
            .list_page(String::new(), None, None, None, Some(max_keys))
            .await
            .map_err(|err| map_error("listing objects", err))?;
        check_status(status, &[])?;

        let keys = page
            .contents
            .into_iter()
            .map(|object| object.key)
            .take(max_keys)
            .collect();
        Ok(keys)
    }
}
