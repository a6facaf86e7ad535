//! API server: shared state, startup and shutdown.

mod error;
pub mod handlers;
mod rate_limit;
mod routes;

pub use error::ApiError;
pub use rate_limit::{client_identity, PolicyGate, FALLBACK_IDENTITY};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use buildcompare_core::rate_limit::SWEEP_INTERVAL;
use buildcompare_core::{
    AnalyzerConfig, AnswerBackend, BreakerRegistry, ChunkConfig, CompletionProvider, Concierge,
    ConciergeConfig, Estimator, EstimatorConfig, HttpAuth, HttpClient, HttpPriceSource, MaterialAnalyzer, OpenAiCompatibleProvider,
    PriceService, PricingConfig, ProviderCascade, RagBackend, RateLimiter, ReqwestHttpClient,
    SyntheticGenerator,
};

use crate::config::Config;

/// Id under which a configured listing feed is registered.
const LISTING_FEED_ID: &str = "listing-feed";

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub analyzer: Arc<MaterialAnalyzer>,
    pub concierge: Arc<Concierge>,
    pub estimator: Arc<Estimator>,
    pub prices: Arc<PriceService>,
    pub chunking: ChunkConfig,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        if config.chat_models.is_empty() {
            bail!("at least one chat model is required");
        }
        if config.vision_models.is_empty() {
            bail!("at least one vision model is required");
        }

        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let synthetic = Arc::new(
            config
                .synthetic_seed
                .map_or_else(SyntheticGenerator::new, SyntheticGenerator::with_seed),
        );

        let completion: Option<Arc<dyn CompletionProvider>> = config
            .groq_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| {
                Arc::new(OpenAiCompatibleProvider::new(
                    Arc::clone(&http),
                    config.completion_url.clone(),
                    HttpAuth::BearerToken(key.to_owned()),
                )) as Arc<dyn CompletionProvider>
            });
        if completion.is_none() {
            tracing::warn!("GROQ_API_KEY not set, analysis will return synthetic materials");
        }

        let backend: Option<Arc<dyn AnswerBackend>> = config.backend_url.as_ref().map(|url| {
            Arc::new(
                RagBackend::new(Arc::clone(&http), url.clone())
                    .with_context_results(config.backend_context_results),
            ) as Arc<dyn AnswerBackend>
        });

        let vision_timeout = Duration::from_millis(config.vision_timeout_ms);
        let chat_timeout = Duration::from_millis(config.chat_timeout_ms);

        let mut analyzer = MaterialAnalyzer::new(
            completion.clone(),
            AnalyzerConfig {
                vision_models: config.vision_models.clone(),
                model_timeout: vision_timeout,
                ..AnalyzerConfig::default()
            },
            Arc::clone(&synthetic),
        );
        let mut concierge = Concierge::new(
            backend,
            completion.clone(),
            ConciergeConfig {
                primary_timeout: Duration::from_millis(config.primary_timeout_ms),
                model_timeout: chat_timeout,
                chat_models: config.chat_models.clone(),
                ..ConciergeConfig::default()
            },
        );

        let mut estimator = Estimator::new(
            completion,
            EstimatorConfig {
                models: config.chat_models.clone(),
                model_timeout: chat_timeout,
                ..EstimatorConfig::default()
            },
        );

        if config.circuit_breaker {
            let breakers = Arc::new(BreakerRegistry::default());
            analyzer = analyzer
                .with_cascade(ProviderCascade::new(vision_timeout).with_breakers(Arc::clone(&breakers)));
            concierge = concierge
                .with_cascade(ProviderCascade::new(chat_timeout).with_breakers(Arc::clone(&breakers)));
            estimator =
                estimator.with_cascade(ProviderCascade::new(chat_timeout).with_breakers(breakers));
        }

        let pricing = PricingConfig {
            source_timeout: Duration::from_millis(config.source_timeout_ms),
            compare_concurrency: config.compare_concurrency,
            savings_formula: config.savings_formula.into(),
            ..PricingConfig::default()
        };
        let mut prices = PriceService::new(pricing, synthetic).with_synthetic_retailers();
        if let Some(url) = &config.price_feed_url {
            let feed = HttpPriceSource::new(LISTING_FEED_ID, url.clone(), Arc::clone(&http))
                .with_timeout_ms(config.source_timeout_ms);
            prices = prices.with_source(Arc::new(feed));
        }

        Ok(Self {
            limiter: Arc::new(RateLimiter::new(config.policy_table())),
            analyzer: Arc::new(analyzer),
            concierge: Arc::new(concierge),
            estimator: Arc::new(estimator),
            prices: Arc::new(prices),
            chunking: config.chunking(),
        })
    }
}

/// Start the API server and run until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    tracing::info!(
        sources = ?state.prices.source_ids(),
        live_analysis = state.analyzer.is_live(),
        "dispatch core ready"
    );

    let sweeper = state.limiter.spawn_sweeper(SWEEP_INTERVAL);
    let cache_sweeper = state.prices.spawn_cache_sweeper(SWEEP_INTERVAL);
    let app = create_router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    cache_sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
