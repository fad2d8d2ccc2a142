//! Error types for the benchmark engine.

use std::io;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while validating or benchmarking a backend.
#[derive(Debug, Error)]
pub enum Error {
    /// The object store rejected or failed a call.
    #[error("backend error: {code}: {message}")]
    Backend {
        /// The error code reported by the object store, e.g. `NoSuchKey`.
        code: String,
        /// The human-readable message reported by the object store.
        message: String,
    },

    /// A payload announced gzip framing but could not be decompressed.
    #[error("failed to decode gzip payload: {0}")]
    Decode(#[source] io::Error),

    /// Connectivity or serialization failure below the object store protocol.
    #[error("transport error: {context}")]
    Transport {
        /// What was being attempted when the failure happened.
        context: String,
        /// The underlying failure.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required request field is missing, unparseable or names an unknown operation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Creates a [`Error::Backend`] from an error code and message.
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a [`Error::Transport`] wrapping the underlying cause.
    pub fn transport<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Transport {
            context: context.into(),
            cause: cause.into(),
        }
    }

    /// The category name reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "BackendError",
            Self::Decode(_) => "DecodeError",
            Self::Transport { .. } => "TransportError",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }

    /// The backend-specific error code, if the object store reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            Self::Decode(err) => err.to_string(),
            Self::Transport { context, cause } => format!("{context}: {cause}"),
            Self::InvalidRequest(msg) => msg.clone(),
        }
    }

    /// Converts this error into the structured payload returned to callers.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            error_message: self.message(),
            error_code: self.code().map(str::to_owned),
        }
    }
}

/// The serializable form of an [`Error`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// The error category, see [`Error::kind`].
    pub kind: &'static str,
    /// Description of the failure.
    pub error_message: String,
    /// The object store's error code, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_payload_carries_code() {
        let payload = Error::backend("NoSuchKey", "The specified key does not exist.").to_payload();

        assert_eq!(payload.kind, "BackendError");
        assert_eq!(payload.error_code.as_deref(), Some("NoSuchKey"));
        assert_eq!(payload.error_message, "The specified key does not exist.");
    }

    #[test]
    fn payload_omits_missing_code() {
        let err = Error::transport("connecting to origin", io::Error::other("refused"));
        let json = serde_json::to_value(err.to_payload()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "kind": "TransportError",
                "errorMessage": "connecting to origin: refused",
            })
        );
    }
}
