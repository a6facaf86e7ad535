//! Error responses for the JSON API.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use buildcompare_core::{ConciergeError, EstimateError, RateLimitDecision, ValidationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
    retryable: bool,
}

/// Failure of an API request, rendered as `{ error, code, retryable }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests, please try again later.")]
    RateLimited(RateLimitDecision),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Concierge(#[from] ConciergeError),

    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Concierge(ConciergeError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Concierge(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Estimate(EstimateError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Estimate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limit.exceeded",
            Self::InvalidRequest(_) => "request.invalid",
            Self::Concierge(error) => error.code(),
            Self::Estimate(error) => error.code(),
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::InvalidRequest(_) => false,
            Self::Concierge(error) => error.retryable(),
            Self::Estimate(error) => error.retryable(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::InvalidRequest(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            retryable: self.retryable(),
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let Self::RateLimited(decision) = &self {
            append_rate_limit_headers(&mut response, decision);
        }
        response
    }
}

/// Copies the decision's `X-RateLimit-*` (and, on denial, `Retry-After`) headers.
pub fn append_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    for (name, value) in decision.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concierge_errors_map_to_documented_statuses() {
        let unavailable = ApiError::from(ConciergeError::Unavailable { failures: Vec::new() });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.code(), "upstream.unavailable");
        assert!(unavailable.retryable());

        let misconfigured = ApiError::from(ConciergeError::Misconfigured(String::from("bad key")));
        assert_eq!(misconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!misconfigured.retryable());

        let malformed = ApiError::from(ConciergeError::Malformed { failures: Vec::new() });
        assert_eq!(malformed.code(), "upstream.malformed");
    }

    #[test]
    fn estimate_errors_share_the_upstream_codes() {
        let unavailable = ApiError::from(EstimateError::Unavailable { failures: Vec::new() });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(unavailable.retryable());

        let unconfigured = ApiError::from(EstimateError::NotConfigured);
        assert_eq!(unconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unconfigured.code(), "upstream.misconfigured");
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let error = ApiError::from(ValidationError::IncompleteCoordinates);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "request.invalid");
    }
}
