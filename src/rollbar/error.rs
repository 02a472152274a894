//! Rollbar API error types.
//!
//! Every client operation returns [`ApiError`] on failure. Transport-level
//! failures (network, non-2xx status) are kept distinct from domain-level
//! failures reported inside a successful HTTP response (`err != 0` envelope)
//! and from decoding failures.

use thiserror::Error;

/// Errors that can occur when talking to the Rollbar API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (connect, TLS handshake, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP response, rejected before JSON decoding.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The response envelope carried a non-zero error code.
    #[error("rollbar returned error code {0}")]
    Domain(i64),

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// No enabled read-scoped access token exists for the project.
    #[error("read token not found")]
    ReadTokenNotFound,
}

impl ApiError {
    /// Decode error for a field whose value had an unexpected kind.
    pub(crate) fn field_kind(field: &str, expected: &str) -> Self {
        Self::Decode(format!("field {field}: expected {expected} value"))
    }
}
