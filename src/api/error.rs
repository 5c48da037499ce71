//! Gateway error taxonomy.
//!
//! Errors map to plain HTTP statuses with no response envelope: client input
//! problems are 400, credential problems 401, missing cover art 404, and
//! anything upstream-side or encoder-side is a 500. Upstream data-path
//! failures are deliberately not retried or masked.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::jellyfin::UpstreamError;
use crate::value::EncodeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("required parameter is missing: {0}")]
    MissingParameter(&'static str),

    #[error("unsupported response format: {0}")]
    InvalidFormat(String),

    #[error("unreadable form body")]
    InvalidBody,

    #[error("wrong username or password")]
    WrongCredentials,

    #[error("requested data was not found: {0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Upstream(UpstreamError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_)
            | ApiError::InvalidFormat(_)
            | ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            ApiError::WrongCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::InvalidCredentials => ApiError::WrongCredentials,
            UpstreamError::CoverNotFound => ApiError::NotFound("cover art"),
            other => ApiError::Upstream(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        status.into_response()
    }
}
