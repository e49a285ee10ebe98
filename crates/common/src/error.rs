//! HTTP-facing error type shared across crates.

use thiserror::Error;

use crate::protocol::ErrorResponse;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400, including undecodable JSON bodies and query strings
/// - [`ServiceError::MissingRelation`] → 404
/// - [`ServiceError::EncryptionFailure`] → 500
/// - [`ServiceError::Upstream`] → 502
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: bad table name, unscoped write, or invalid JSON.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The remote store has no such table; callers should offer a setup step.
    #[error("relation does not exist: {0}")]
    MissingRelation(String),

    /// Encrypting an outbound field failed.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// The remote store rejected the call or could not be reached.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::MissingRelation(_) => 404,
            ServiceError::EncryptionFailure(_) => 500,
            ServiceError::Upstream(_) => 502,
        }
    }

    /// Machine-readable code used in [`ErrorResponse::code`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::MissingRelation(_) => "relation_does_not_exist",
            ServiceError::EncryptionFailure(_) => "encryption_failure",
            ServiceError::Upstream(_) => "upstream_error",
        }
    }

    /// Render as the standard error body.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}
