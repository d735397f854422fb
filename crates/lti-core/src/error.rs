//! The closed error taxonomy used throughout the launch, session, and crypto
//! pipelines. Every variant maps to one HTTP status when surfaced to a client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LtiError {
    /// A required builder option was missing or invalid. Detected at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// The incoming request was structurally invalid (missing fields, bad `target_link_uri`).
    #[error("malformed request: {0}")]
    RequestMalformed(String),

    /// State/nonce mismatch, signature failure, unknown issuer, missing/expired session.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The session is valid but lacks the roles required for this route.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A deployment or route was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// JWKS fetch, signing, or storage failure not attributable to the caller.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl LtiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RequestMalformed(_) => StatusCode::BAD_REQUEST,
            Self::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for LtiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Operational detail stays in the log; the body only gets a short, operator-safe reason.
        tracing::warn!(error = %self, status = %status, "lti request rejected");
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LtiError>;
