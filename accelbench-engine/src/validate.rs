//! Content equivalence checks between the origin and the accelerator.
//!
//! A comparison fetches one object from both backends and reports the
//! normalized digest of each (see [`digest::normalize`]). It does not decide
//! whether the object matches; the caller inspects the digests. Failures are
//! reported inside the [`ComparisonResult`], so that one missing object never
//! aborts a batch of checks.

use serde::Serialize;

use crate::client::{Backends, BackendTarget};
use crate::digest;
use crate::error::{ErrorPayload, Result};

/// Digests of one object as served by both backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ComparisonResult {
    /// Both fetches succeeded.
    Digests {
        /// Digest of the origin copy, absent when the origin was not fetched.
        #[serde(rename = "origin-md5", skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
        /// Digest of the accelerator copy.
        #[serde(rename = "accelerator-md5")]
        accelerator: String,
    },
    /// A fetch or the digest computation failed.
    Failed(ErrorPayload),
}

impl ComparisonResult {
    /// Returns whether both digests are equal, or `None` if there is nothing to compare.
    pub fn is_match(&self) -> Option<bool> {
        match self {
            Self::Digests {
                origin: Some(origin),
                accelerator,
            } => Some(origin == accelerator),
            _ => None,
        }
    }
}

/// Fetches `key` from both backends and reports their content digests.
///
/// The accelerator is always fetched. The origin is fetched only if
/// `include_origin` is set; callers clear it when the origin copy is known to be
/// gone. The origin's content encoding decides gzip handling for both payloads.
/// Only when the origin is skipped does the accelerator's encoding stand in.
pub async fn compare(
    backends: &Backends,
    bucket: &str,
    key: &str,
    include_origin: bool,
) -> ComparisonResult {
    match try_compare(backends, bucket, key, include_origin).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(
                error = &err as &dyn std::error::Error,
                bucket,
                key,
                "comparison failed"
            );
            ComparisonResult::Failed(err.to_payload())
        }
    }
}

async fn try_compare(
    backends: &Backends,
    bucket: &str,
    key: &str,
    include_origin: bool,
) -> Result<ComparisonResult> {
    let response = backends
        .client(BackendTarget::Accelerator)
        .get_object(bucket, key)
        .await?;
    let accelerator_encoding = response.content_encoding.clone();
    let accelerator_payload = response.payload().await?;

    let origin_fetch = if include_origin {
        let response = backends
            .client(BackendTarget::Origin)
            .get_object(bucket, key)
            .await?;
        let encoding = response.content_encoding.clone();
        Some((encoding, response.payload().await?))
    } else {
        None
    };

    let encoding = match &origin_fetch {
        Some((encoding, _)) => encoding.clone(),
        None => accelerator_encoding,
    };

    let accelerator = digest::normalize(&accelerator_payload, encoding.as_deref(), key)?;
    let origin = origin_fetch
        .map(|(_, payload)| digest::normalize(&payload, encoding.as_deref(), key))
        .transpose()?;

    tracing::debug!(bucket, key, ?origin, %accelerator, "compared object digests");

    Ok(ComparisonResult::Digests {
        origin,
        accelerator,
    })
}
