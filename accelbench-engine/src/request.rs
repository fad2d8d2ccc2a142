//! Parsing and validation of invocation requests.
//!
//! Requests arrive as loosely typed JSON objects, often with every value encoded
//! as a string. [`Request::from_json`] validates such an object once and turns
//! it into a typed [`Request`]; nothing past this point deals with raw names.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::client::{BackendTarget, MAX_LIST_KEYS};
use crate::error::{Error, Result};

/// Default number of keys for put, delete and get workloads.
pub const DEFAULT_NUM_KEYS: usize = 1000;

/// Default payload length in bytes for put workloads.
pub const DEFAULT_OBJECT_LENGTH: usize = 100;

/// Largest accepted payload length in bytes for put workloads.
pub const MAX_OBJECT_LENGTH: usize = 64 * 1024 * 1024;

/// The operation an invocation performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Benchmark listing.
    List,
    /// Benchmark uploads of synthetic keys, or of the one supplied key.
    Put,
    /// Benchmark deletes of synthetic keys, or of the one supplied key.
    Delete,
    /// Benchmark full-body gets of discovered keys.
    Get,
    /// Benchmark time to first byte of discovered keys.
    GetTtfb,
    /// Benchmark full-body gets through the accelerator only.
    GetPassthrough,
    /// Benchmark time to first byte through the accelerator only.
    GetPassthroughTtfb,
    /// Put, delete, list and get in sequence.
    All,
    /// Compare content digests of one object on both backends.
    ValidateMd5,
    /// Compare content digests of one object on both backends.
    Compare,
    /// Fetch the metadata of one object from a single backend.
    Head,
    /// Fetch one object from a single backend and digest its raw bytes.
    GetMd5,
    /// List keys of a bucket on a single backend.
    ListKeys,
}

impl Operation {
    /// The canonical name of this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Get => "get",
            Self::GetTtfb => "get_ttfb",
            Self::GetPassthrough => "get_passthrough",
            Self::GetPassthroughTtfb => "get_passthrough_ttfb",
            Self::All => "all",
            Self::ValidateMd5 => "validate_md5",
            Self::Compare => "compare",
            Self::Head => "head",
            Self::GetMd5 => "get_md5",
            Self::ListKeys => "list_keys",
        }
    }

    /// Returns `true` for operations that act on the single object named by `key`.
    pub fn requires_key(self) -> bool {
        matches!(
            self,
            Self::ValidateMd5 | Self::Compare | Self::Head | Self::GetMd5
        )
    }

    /// Returns `true` for workloads that only run against the accelerator.
    pub fn is_passthrough(self) -> bool {
        matches!(self, Self::GetPassthrough | Self::GetPassthroughTtfb)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let operation = match s.to_ascii_lowercase().as_str() {
            "list" | "list_objects_v2" => Self::List,
            "put" | "put_object" => Self::Put,
            "delete" | "delete_object" => Self::Delete,
            "get" | "get_object" => Self::Get,
            "get_ttfb" | "get_object_ttfb" => Self::GetTtfb,
            "get_passthrough" | "get_object_passthrough" => Self::GetPassthrough,
            "get_passthrough_ttfb" | "get_object_passthrough_ttfb" => Self::GetPassthroughTtfb,
            "all" => Self::All,
            "validate_md5" | "validate_object_md5" => Self::ValidateMd5,
            "compare" => Self::Compare,
            "head" | "head_object" => Self::Head,
            "get_md5" => Self::GetMd5,
            "list_keys" => Self::ListKeys,
            _ => return Err(Error::InvalidRequest(format!("unknown operation `{s}`"))),
        };
        Ok(operation)
    }
}

fn parse_backend(s: &str) -> Result<BackendTarget> {
    match s.to_ascii_lowercase().as_str() {
        "origin" | "s3" => Ok(BackendTarget::Origin),
        "accelerator" | "bolt" => Ok(BackendTarget::Accelerator),
        _ => Err(Error::InvalidRequest(format!("unknown backend `{s}`"))),
    }
}

/// A JSON value that may arrive either natively typed or as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl Scalar {
    /// Returns `None` for empty strings, which count as absent.
    fn as_usize(&self, field: &str) -> Result<Option<usize>> {
        let invalid = || Error::InvalidRequest(format!("`{field}` must be a non-negative integer"));
        match self {
            Self::Number(n) => usize::try_from(*n).map(Some).map_err(|_| invalid()),
            Self::Text(s) if s.is_empty() => Ok(None),
            Self::Text(s) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Self::Bool(_) => Err(invalid()),
        }
    }

    fn as_flag(&self, field: &str) -> Result<Option<bool>> {
        match self {
            Self::Bool(b) => Ok(Some(*b)),
            Self::Text(s) if s.is_empty() => Ok(None),
            Self::Text(s) => match s.to_ascii_lowercase().as_str() {
                "on" | "true" => Ok(Some(true)),
                "off" | "false" => Ok(Some(false)),
                _ => Err(Error::InvalidRequest(format!(
                    "`{field}` must be one of ON, OFF, true or false"
                ))),
            },
            Self::Number(_) => Err(Error::InvalidRequest(format!("`{field}` must be a flag"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    #[serde(alias = "requestType")]
    operation: Option<String>,
    bucket: Option<String>,
    key: Option<String>,
    num_keys: Option<Scalar>,
    #[serde(alias = "objLength")]
    object_length: Option<Scalar>,
    #[serde(alias = "sdkType")]
    backend: Option<String>,
    bucket_clean: Option<Scalar>,
    value: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// A validated invocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// The operation to perform.
    pub operation: Operation,
    /// The bucket all calls are issued against.
    pub bucket: String,
    /// The object key. Required for single-object operations, and restricts
    /// put and delete to this one key when given.
    pub key: Option<String>,
    /// Number of keys for workloads, at most 1000.
    pub num_keys: usize,
    /// Payload length in bytes for uploads, at most [`MAX_OBJECT_LENGTH`].
    pub object_length: usize,
    /// Contents for uploads instead of a random payload.
    pub value: Option<String>,
    /// Restricts the operation to one backend.
    pub backend: Option<BackendTarget>,
    /// The origin copy is gone, so comparisons skip fetching it.
    pub bucket_clean: bool,
}

impl Request {
    /// Creates a request with default parameters.
    pub fn new(operation: Operation, bucket: impl Into<String>) -> Self {
        Self {
            operation,
            bucket: bucket.into(),
            key: None,
            num_keys: DEFAULT_NUM_KEYS,
            object_length: DEFAULT_OBJECT_LENGTH,
            value: None,
            backend: None,
            bucket_clean: false,
        }
    }

    /// Parses and validates a request from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(bytes)
            .map_err(|err| Error::InvalidRequest(format!("malformed request: {err}")))?;
        Self::from_json(value)
    }

    /// Validates a request given as a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawRequest = serde_json::from_value(value)
            .map_err(|err| Error::InvalidRequest(format!("malformed request: {err}")))?;

        let operation = match non_empty(raw.operation) {
            Some(name) => name.parse()?,
            None => Operation::All,
        };

        let bucket = non_empty(raw.bucket)
            .ok_or_else(|| Error::InvalidRequest("missing field `bucket`".into()))?;

        let key = non_empty(raw.key);
        if operation.requires_key() && key.is_none() {
            return Err(Error::InvalidRequest(format!(
                "operation `{operation}` requires field `key`"
            )));
        }

        let num_keys = match &raw.num_keys {
            Some(scalar) => scalar.as_usize("numKeys")?,
            None => None,
        };
        let object_length = match &raw.object_length {
            Some(scalar) => scalar.as_usize("objectLength")?,
            None => None,
        }
        .unwrap_or(DEFAULT_OBJECT_LENGTH);
        if object_length > MAX_OBJECT_LENGTH {
            return Err(Error::InvalidRequest(format!(
                "`objectLength` must be at most {MAX_OBJECT_LENGTH}"
            )));
        }
        let bucket_clean = match &raw.bucket_clean {
            Some(scalar) => scalar.as_flag("bucketClean")?,
            None => None,
        };

        let backend = non_empty(raw.backend)
            .map(|name| parse_backend(&name))
            .transpose()?;
        if operation.is_passthrough() && backend == Some(BackendTarget::Origin) {
            return Err(Error::InvalidRequest(format!(
                "operation `{operation}` only runs against the accelerator"
            )));
        }

        Ok(Self {
            operation,
            bucket,
            key,
            num_keys: num_keys.unwrap_or(DEFAULT_NUM_KEYS).min(MAX_LIST_KEYS),
            object_length,
            value: raw.value,
            backend,
            bucket_clean: bucket_clean.unwrap_or(false),
        })
    }

    /// Backends a benchmark runs against: the selected one, or both.
    pub fn targets(&self) -> Vec<BackendTarget> {
        match self.backend {
            Some(backend) => vec![backend],
            None => BackendTarget::ALL.to_vec(),
        }
    }

    /// Backend a single-object operation runs against, the accelerator by default.
    pub fn single_target(&self) -> BackendTarget {
        self.backend.unwrap_or(BackendTarget::Accelerator)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn applies_defaults() {
        let request = Request::from_json(json!({"bucket": "b"})).unwrap();
        assert_eq!(request, Request::new(Operation::All, "b"));
        assert_eq!(request.targets(), BackendTarget::ALL);
        assert_eq!(request.single_target(), BackendTarget::Accelerator);
    }

    #[test]
    fn accepts_string_encoded_values() {
        let request = Request::from_json(json!({
            "requestType": "PUT_OBJECT",
            "bucket": "b",
            "numKeys": "5",
            "objLength": "10",
            "sdkType": "s3",
        }))
        .unwrap();

        assert_eq!(request.operation, Operation::Put);
        assert_eq!(request.num_keys, 5);
        assert_eq!(request.object_length, 10);
        assert_eq!(request.backend, Some(BackendTarget::Origin));
    }

    #[test]
    fn clamps_num_keys() {
        let request = Request::from_json(json!({"bucket": "b", "numKeys": 5000})).unwrap();
        assert_eq!(request.num_keys, 1000);
    }

    #[test]
    fn accepts_single_object_put() {
        let request = Request::from_json(json!({
            "requestType": "PUT_OBJECT",
            "bucket": "b",
            "key": "greeting",
            "value": "hello",
        }))
        .unwrap();

        assert_eq!(request.operation, Operation::Put);
        assert_eq!(request.key.as_deref(), Some("greeting"));
        assert_eq!(request.value.as_deref(), Some("hello"));
    }

    #[test]
    fn accepts_largest_object_length() {
        let request =
            Request::from_json(json!({"bucket": "b", "objectLength": MAX_OBJECT_LENGTH})).unwrap();
        assert_eq!(request.object_length, MAX_OBJECT_LENGTH);
    }

    #[test]
    fn parses_bucket_clean() {
        let on = json!({"operation": "compare", "bucket": "b", "key": "k", "bucketClean": "ON"});
        assert!(Request::from_json(on).unwrap().bucket_clean);

        let off = json!({"operation": "compare", "bucket": "b", "key": "k", "bucketClean": false});
        assert!(!Request::from_json(off).unwrap().bucket_clean);
    }

    #[test]
    fn rejects_invalid_requests() {
        let cases = [
            json!({"operation": "get"}),
            json!({"operation": "frobnicate", "bucket": "b"}),
            json!({"operation": "compare", "bucket": "b"}),
            json!({"bucket": "b", "numKeys": "many"}),
            json!({"bucket": "b", "numKeys": -1}),
            json!({"bucket": "b", "objectLength": "100000000000"}),
            json!({"bucket": "b", "objectLength": MAX_OBJECT_LENGTH + 1}),
            json!({"bucket": "b", "backend": "gcs"}),
            json!({"operation": "get_passthrough", "bucket": "b", "backend": "origin"}),
            json!(["not", "an", "object"]),
        ];

        for case in cases {
            let err = Request::from_json(case.clone()).unwrap_err();
            assert!(
                matches!(err, Error::InvalidRequest(_)),
                "{case} yielded {err:?}"
            );
        }
    }

    #[test]
    fn operation_names_roundtrip() {
        let all = [
            Operation::List,
            Operation::Put,
            Operation::Delete,
            Operation::Get,
            Operation::GetTtfb,
            Operation::GetPassthrough,
            Operation::GetPassthroughTtfb,
            Operation::All,
            Operation::ValidateMd5,
            Operation::Compare,
            Operation::Head,
            Operation::GetMd5,
            Operation::ListKeys,
        ];
        for operation in all {
            assert_eq!(operation.as_str().parse::<Operation>().unwrap(), operation);
        }
    }
}
