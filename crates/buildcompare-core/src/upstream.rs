//! Classified errors raised by upstream providers.
//!
//! Every upstream failure is reduced to an [`UpstreamErrorKind`], and each
//! kind maps to exactly one [`FailureClass`]. The provider cascade only looks
//! at the class: transient failures move on to the next candidate, fatal ones
//! stop the cascade.

use std::fmt::{Display, Formatter};

/// Whether a failure should move the cascade on or stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Fatal,
}

/// Upstream error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// The attempt exceeded its time bound.
    Timeout,
    /// The candidate no longer exists, is decommissioned or is down.
    Unavailable,
    /// The upstream throttled us.
    RateLimited,
    /// Connection-level failure before a response arrived.
    Transport,
    /// The upstream answered but with nothing usable.
    EmptyResponse,
    /// The reply could not be parsed into the expected shape.
    Malformed,
    /// Credentials were rejected.
    Unauthorized,
    /// The request itself was rejected as invalid.
    InvalidRequest,
    /// No credentials or endpoint were configured for this upstream.
    NotConfigured,
}

impl UpstreamErrorKind {
    pub const fn class(self) -> FailureClass {
        match self {
            Self::Timeout
            | Self::Unavailable
            | Self::RateLimited
            | Self::Transport
            | Self::EmptyResponse
            | Self::Malformed => FailureClass::Transient,
            Self::Unauthorized | Self::InvalidRequest | Self::NotConfigured => FailureClass::Fatal,
        }
    }
}

/// Markers in an error message that mean the model is gone rather than the request being bad.
const UNAVAILABLE_MARKERS: [&str; 4] = [
    "decommissioned",
    "not found",
    "does not exist",
    "model_not_found",
];

/// Structured upstream error used by cascade classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    kind: UpstreamErrorKind,
    message: String,
    status: Option<u16>,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unavailable, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Transport, message)
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::EmptyResponse, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Malformed, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unauthorized, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidRequest, message)
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::NotConfigured, message)
    }

    /// Classifies a non-success HTTP reply from its status and error message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        let names_missing_model = UNAVAILABLE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker));

        let kind = match status {
            401 | 403 => UpstreamErrorKind::Unauthorized,
            404 => UpstreamErrorKind::Unavailable,
            408 => UpstreamErrorKind::Timeout,
            429 => UpstreamErrorKind::RateLimited,
            400 | 422 if names_missing_model => UpstreamErrorKind::Unavailable,
            400 | 422 => UpstreamErrorKind::InvalidRequest,
            500..=599 => UpstreamErrorKind::Unavailable,
            _ if names_missing_model => UpstreamErrorKind::Unavailable,
            _ => UpstreamErrorKind::Transport,
        };

        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    pub const fn kind(&self) -> UpstreamErrorKind {
        self.kind
    }

    pub const fn class(&self) -> FailureClass {
        self.kind.class()
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind.class(), FailureClass::Fatal)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            UpstreamErrorKind::Timeout => "upstream.timeout",
            UpstreamErrorKind::Unavailable => "upstream.unavailable",
            UpstreamErrorKind::RateLimited => "upstream.rate_limited",
            UpstreamErrorKind::Transport => "upstream.transport",
            UpstreamErrorKind::EmptyResponse => "upstream.empty_response",
            UpstreamErrorKind::Malformed => "upstream.malformed",
            UpstreamErrorKind::Unauthorized => "upstream.unauthorized",
            UpstreamErrorKind::InvalidRequest => "upstream.invalid_request",
            UpstreamErrorKind::NotConfigured => "upstream.not_configured",
        }
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for UpstreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decommissioned_model_is_transient() {
        let error = UpstreamError::from_status(
            400,
            "The model `llama-3.2-90b-vision-preview` has been decommissioned",
        );
        assert_eq!(error.kind(), UpstreamErrorKind::Unavailable);
        assert_eq!(error.class(), FailureClass::Transient);
    }

    #[test]
    fn bad_credentials_are_fatal() {
        let error = UpstreamError::from_status(401, "Invalid API Key");
        assert_eq!(error.kind(), UpstreamErrorKind::Unauthorized);
        assert!(error.is_fatal());
        assert_eq!(error.status(), Some(401));
    }

    #[test]
    fn plain_bad_request_is_fatal() {
        let error = UpstreamError::from_status(400, "messages: field required");
        assert_eq!(error.kind(), UpstreamErrorKind::InvalidRequest);
        assert!(error.is_fatal());
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert_eq!(UpstreamError::from_status(503, "overloaded").class(), FailureClass::Transient);
        assert_eq!(UpstreamError::from_status(429, "slow down").kind(), UpstreamErrorKind::RateLimited);
        assert_eq!(UpstreamError::from_status(404, "no such route").kind(), UpstreamErrorKind::Unavailable);
    }

    #[test]
    fn display_includes_code() {
        let error = UpstreamError::timeout("timeout");
        assert_eq!(error.to_string(), "timeout (upstream.timeout)");
    }
}
