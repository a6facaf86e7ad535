//! # Price Sources
//!
//! A [`PriceSource`] answers one [`PriceQuery`] with the listings one retailer
//! (or one listing feed) currently offers. The pricing service fans out over
//! every registered source and tolerates individual failures.
//!
//! | Source | Backing |
//! |--------|---------|
//! | [`SyntheticPriceSource`] | Fabricated listings for one retailer |
//! | [`HttpPriceSource`] | Remote listing feed speaking the `/api/v1/prices` format |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Location, PriceListing};
use crate::http_client::{HttpClient, HttpRequest};
use crate::synthetic::{SyntheticGenerator, SyntheticRetailer};
use crate::ValidationError;

/// Minimum query length after trimming.
pub const MIN_QUERY_CHARS: usize = 2;

/// Validated price lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuery {
    query: String,
    location: Location,
}

impl PriceQuery {
    pub fn new(query: impl Into<String>, location: Location) -> Result<Self, ValidationError> {
        let query = query.into().trim().to_owned();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Err(ValidationError::QueryTooShort {
                value: query,
                min: MIN_QUERY_CHARS,
            });
        }
        Ok(Self { query, location })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn location(&self) -> &Location {
        &self.location
    }

    /// Case-insensitive key identifying equivalent lookups.
    pub fn cache_key(&self) -> String {
        format!("{}|{}", self.query.to_lowercase(), self.location.cache_key())
    }
}

/// Source error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Timeout,
    InvalidResponse,
    Internal,
}

/// Structured source error used by the pricing fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: format!("source did not answer within {} ms", after.as_millis()),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// A provider of retailer listings.
pub trait PriceSource: Send + Sync {
    /// Stable identifier used in logs, throttling and diagnostics.
    fn id(&self) -> &str;

    /// Fetches current listings matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the source is unreachable, throttled or
    /// answers with something that is not a listing array.
    fn listings<'a>(
        &'a self,
        query: &'a PriceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PriceListing>, SourceError>> + Send + 'a>>;
}

/// Offline source fabricating one listing per lookup for a retailer.
pub struct SyntheticPriceSource {
    retailer: SyntheticRetailer,
    generator: Arc<SyntheticGenerator>,
    latency: Duration,
}

impl SyntheticPriceSource {
    pub fn new(retailer: SyntheticRetailer, generator: Arc<SyntheticGenerator>) -> Self {
        Self {
            retailer,
            generator,
            latency: Duration::ZERO,
        }
    }

    /// Simulated network latency before the listing is returned.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl PriceSource for SyntheticPriceSource {
    fn id(&self) -> &str {
        self.retailer.id
    }

    fn listings<'a>(
        &'a self,
        query: &'a PriceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PriceListing>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(vec![self.generator.listing(&self.retailer, query.query())])
        })
    }
}

/// Remote listing feed: `GET {base}/api/v1/prices/?query=..&region=..`.
#[derive(Clone)]
pub struct HttpPriceSource {
    id: String,
    base_url: String,
    http: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl HttpPriceSource {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
            timeout_ms: 5_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn url(&self, query: &PriceQuery) -> String {
        let mut url = format!(
            "{}/api/v1/prices/?query={}",
            self.base_url,
            urlencoding::encode(query.query())
        );
        match query.location() {
            Location::Region(region) => {
                url.push_str("&region=");
                url.push_str(region.as_str());
            }
            Location::Coordinates(coords) => {
                url.push_str(&format!(
                    "&lat={}&lng={}&radius={}",
                    coords.lat, coords.lng, coords.radius_km
                ));
            }
        }
        url
    }
}

impl PriceSource for HttpPriceSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn listings<'a>(
        &'a self,
        query: &'a PriceQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PriceListing>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let request = HttpRequest::get(self.url(query))
                .with_header("accept", "application/json")
                .with_timeout_ms(self.timeout_ms);

            let response = self
                .http
                .execute(request)
                .await
                .map_err(|e| SourceError::unavailable(format!("listing feed request failed: {e}")))?;

            match response.status {
                429 => return Err(SourceError::rate_limited("listing feed throttled the request")),
                status if !response.is_success() => {
                    return Err(SourceError::unavailable(format!(
                        "listing feed returned status {status}"
                    )))
                }
                _ => {}
            }

            let listings: Vec<PriceListing> = serde_json::from_str(&response.body).map_err(|e| {
                SourceError::invalid_response(format!("listing feed returned unexpected JSON: {e}"))
            })?;

            listings
                .into_iter()
                .filter_map(|listing| match listing.validate() {
                    Ok(()) => Some(Ok(listing)),
                    Err(error) => {
                        tracing::debug!(source = %self.id, error = %error, "dropping invalid listing");
                        None
                    }
                })
                .collect()
        })
    }
}
