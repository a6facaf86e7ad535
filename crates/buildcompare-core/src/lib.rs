//! # BuildCompare Core
//!
//! Request dispatch core for the BuildCompare materials price-comparison
//! service.
//!
//! ## Overview
//!
//! - **Rate limiting** of inbound requests per caller and named policy
//! - **Provider cascade** over ordered upstream candidates with per-attempt
//!   timeouts and transient/fatal failure classification
//! - **Quote aggregation** into best price, average and potential savings
//! - **Material analysis** of photos through vision models, with synthetic
//!   fallback when no model answers
//! - **Concierge chat** answered by a knowledge backend first, then by chat
//!   completion models
//! - **Retailer price lookups** fanned out over throttled, cached sources
//! - **Take-offs and BOQ drafts**: fixed-rate quantity calculations and
//!   model-drafted bills of quantities
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregate`] | Per-material best price, average, savings and ranking |
//! | [`analysis`] | Vision-model material extraction with synthetic fallback |
//! | [`cache`] | TTL cache for price lookups |
//! | [`calculations`] | Brick, mortar, paint and roof tile take-offs |
//! | [`cascade`] | Ordered provider fallback |
//! | [`circuit_breaker`] | Optional per-candidate circuit breakers |
//! | [`completion`] | OpenAI-compatible chat completion provider |
//! | [`concierge`] | Two-tier chat answering |
//! | [`domain`] | Materials, quotes, listings and locations |
//! | [`error`] | Core error types |
//! | [`estimator`] | Model-drafted bills of quantities |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Model output to material item list |
//! | [`price_source`] | Retailer listing sources |
//! | [`pricing`] | Fan-out lookups and multi-material comparison |
//! | [`rag`] | Knowledge backend client |
//! | [`rate_limit`] | Fixed-window inbound admission control |
//! | [`stream`] | Chunked delivery of a complete answer |
//! | [`synthetic`] | Deterministic-when-seeded synthetic data |
//! | [`throttling`] | Outbound request budgets |
//! | [`upstream`] | Upstream failure classification |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HTTP handlers  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Rate Limiter   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Analyzer /      │────▶│ Provider Cascade │──▶ completion, rag
//! │ Concierge       │     └──────────────────┘
//! └─────────────────┘
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Price Service   │────▶│ Price Sources    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Aggregation     │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are classified before they reach a cascade:
//!
//! ```rust
//! use buildcompare_core::{FailureClass, UpstreamError};
//!
//! fn should_try_next(error: &UpstreamError) -> bool {
//!     error.class() == FailureClass::Transient
//! }
//! ```
//!
//! ## Security
//!
//! - Provider API keys are read from the environment only and never logged
//! - Upstream error bodies are not forwarded to clients

pub mod aggregate;
pub mod analysis;
pub mod cache;
pub mod calculations;
pub mod cascade;
pub mod circuit_breaker;
pub mod completion;
pub mod concierge;
pub mod domain;
pub mod error;
pub mod estimator;
pub mod http_client;
pub mod normalize;
pub mod price_source;
pub mod pricing;
pub mod rag;
pub mod rate_limit;
pub mod stream;
pub mod synthetic;
pub mod throttling;
pub mod upstream;

// Aggregation
pub use aggregate::{
    aggregate, aggregate_with, ComparisonResult, RankingOptions, SavingsFormula, SortKey,
};

// Material analysis
pub use analysis::{AnalysisReport, AnalyzerConfig, ImageUpload, MaterialAnalyzer};

// Caching
pub use cache::{CacheMode, TtlCache};

// Take-offs
pub use calculations::{calculate, CalcType, CalculationReport, TakeOff};

// Cascade and breakers
pub use cascade::{
    CascadeError, CascadeFailure, CascadeOutcome, CascadeSuccess, ProviderCascade,
};
pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Completion and knowledge backends
pub use completion::{
    ChatMessage, CompletionProvider, CompletionRequest, OpenAiCompatibleProvider,
    DEFAULT_CHAT_MODELS, DEFAULT_VISION_MODELS, GROQ_BASE_URL,
};
pub use rag::{AnswerBackend, RagBackend};

// Concierge chat
pub use concierge::{ChatAnswer, Concierge, ConciergeConfig, ConciergeError, ConciergeTier};

// Domain models
pub use domain::{
    Coordinates, DataMode, Location, Material, MaterialCategory, PriceListing, Region,
    SupplierQuote,
};

// Bill of quantities
pub use estimator::{BoqEstimate, EstimateError, Estimator, EstimatorConfig, ProjectSpec};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};

// Price lookups
pub use price_source::{
    HttpPriceSource, PriceQuery, PriceSource, SourceError, SourceErrorKind, SyntheticPriceSource,
};
pub use pricing::{ComparisonReport, PriceLookup, PriceService, PricingConfig, SourceFailure};

// Rate limiting
pub use rate_limit::{
    Clock, ManualClock, PolicyName, PolicyTable, RateLimitDecision, RateLimitPolicy, RateLimiter,
    SystemClock,
};

// Streaming
pub use stream::{chunk_stream, ChunkConfig};

// Synthetic data
pub use synthetic::SyntheticGenerator;

// Outbound throttling
pub use throttling::OutboundThrottle;

// Upstream classification
pub use upstream::{FailureClass, UpstreamError, UpstreamErrorKind};
