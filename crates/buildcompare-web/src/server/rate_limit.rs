//! Admission middleware applying one rate-limit policy to a group of routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use buildcompare_core::{PolicyName, RateLimiter};

use super::error::{append_rate_limit_headers, ApiError};

/// Identity used when a request carries no client address header.
pub const FALLBACK_IDENTITY: &str = "127.0.0.1";

/// Middleware state: the shared limiter and the policy this route group uses.
#[derive(Clone)]
pub struct PolicyGate {
    limiter: Arc<RateLimiter>,
    policy: PolicyName,
}

impl PolicyGate {
    pub fn new(limiter: &Arc<RateLimiter>, policy: PolicyName) -> Self {
        Self {
            limiter: Arc::clone(limiter),
            policy,
        }
    }
}

/// Caller identity: first `X-Forwarded-For` entry, then `X-Real-IP`.
pub fn client_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(FALLBACK_IDENTITY)
        .to_owned()
}

pub async fn enforce(State(gate): State<PolicyGate>, request: Request, next: Next) -> Response {
    let identity = client_identity(request.headers());
    let decision = gate.limiter.check(&identity, gate.policy);

    if !decision.allowed {
        tracing::info!(
            policy = %gate.policy,
            identity = %identity,
            path = %request.uri().path(),
            "request rejected by rate limit"
        );
        return ApiError::RateLimited(decision).into_response();
    }

    let mut response = next.run(request).await;
    append_rate_limit_headers(&mut response, &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_loopback_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), FALLBACK_IDENTITY);

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers), "198.51.100.2");
    }
}
