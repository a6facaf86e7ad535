//! Retailer price lookups and multi-material comparison.
//!
//! A lookup fans out to every registered [`PriceSource`] at once. Each source
//! is bounded by its own timeout and outbound throttle; a source that fails,
//! times out or is out of budget is logged and skipped, so a lookup always
//! returns whatever the remaining sources produced. Results are cached per
//! normalized query and location.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::aggregate::{aggregate_with, ComparisonResult, SavingsFormula};
use crate::cache::{CacheMode, TtlCache};
use crate::domain::{DataMode, Location, Material, PriceListing, Region, SupplierQuote};
use crate::price_source::{PriceQuery, PriceSource, SourceError, SyntheticPriceSource};
use crate::synthetic::{SyntheticGenerator, RETAILERS};
use crate::throttling::OutboundThrottle;

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub source_timeout: Duration,
    pub cache_ttl: Duration,
    pub throttle_window: Duration,
    pub throttle_limit: u32,
    /// Materials priced concurrently by [`PriceService::compare_materials`].
    pub compare_concurrency: usize,
    pub savings_formula: SavingsFormula,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(300),
            throttle_window: Duration::from_secs(60),
            throttle_limit: 10,
            compare_concurrency: 4,
            savings_formula: SavingsFormula::default(),
        }
    }
}

/// A source that contributed nothing to a lookup, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub error: SourceError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceLookup {
    pub listings: Vec<PriceListing>,
    pub failures: Vec<SourceFailure>,
    pub cached: bool,
}

/// Per-material comparison results in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub mode: DataMode,
    pub results: Vec<ComparisonResult>,
}

struct RegisteredSource {
    source: Arc<dyn PriceSource>,
    throttle: OutboundThrottle,
}

pub struct PriceService {
    sources: Vec<RegisteredSource>,
    cache: TtlCache<Vec<PriceListing>>,
    config: PricingConfig,
    synthetic: Arc<SyntheticGenerator>,
}

impl PriceService {
    /// A service with no sources registered.
    pub fn new(config: PricingConfig, synthetic: Arc<SyntheticGenerator>) -> Self {
        Self {
            sources: Vec::new(),
            cache: TtlCache::new(config.cache_ttl),
            config,
            synthetic,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        let throttle = OutboundThrottle::new(self.config.throttle_window, self.config.throttle_limit);
        self.sources.push(RegisteredSource { source, throttle });
        self
    }

    /// Registers the synthetic Builders Warehouse, Cashbuild and Leroy Merlin feeds.
    pub fn with_synthetic_retailers(self) -> Self {
        let synthetic = Arc::clone(&self.synthetic);
        RETAILERS.into_iter().fold(self, |service, retailer| {
            service.with_source(Arc::new(SyntheticPriceSource::new(retailer, Arc::clone(&synthetic))))
        })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|registered| registered.source.id()).collect()
    }

    /// Cached lookups, including expired ones not yet swept.
    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }

    /// Drops expired listing entries.
    pub async fn sweep_cache(&self) -> usize {
        let removed = self.cache.clear_expired().await;
        if removed > 0 {
            tracing::debug!(removed, "swept expired listing cache entries");
        }
        removed
    }

    /// Runs [`sweep_cache`](Self::sweep_cache) every `period` until the service is dropped.
    pub fn spawn_cache_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let service = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.sweep_cache().await;
            }
        })
    }

    /// Listings from every source that answered, in registration order.
    pub async fn lookup(&self, query: &PriceQuery, mode: CacheMode) -> PriceLookup {
        let key = query.cache_key();
        if mode == CacheMode::Use {
            if let Some(listings) = self.cache.get(&key).await {
                tracing::debug!(query = query.query(), "price lookup served from cache");
                return PriceLookup {
                    listings,
                    failures: Vec::new(),
                    cached: true,
                };
            }
        }

        let outcomes = join_all(
            self.sources
                .iter()
                .map(|registered| self.fetch_from(registered, query)),
        )
        .await;

        let mut listings = Vec::new();
        let mut failures = Vec::new();
        for (registered, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(found) => listings.extend(found),
                Err(error) => {
                    tracing::warn!(source = registered.source.id(), error = %error, "price source skipped");
                    failures.push(SourceFailure {
                        source: registered.source.id().to_owned(),
                        error,
                    });
                }
            }
        }

        if mode != CacheMode::Bypass && !listings.is_empty() {
            self.cache.put(key, listings.clone()).await;
        }

        PriceLookup {
            listings,
            failures,
            cached: false,
        }
    }

    async fn fetch_from(
        &self,
        registered: &RegisteredSource,
        query: &PriceQuery,
    ) -> Result<Vec<PriceListing>, SourceError> {
        registered.throttle.try_acquire().map_err(|wait| {
            SourceError::rate_limited(format!(
                "outbound budget spent, next slot in {} ms",
                wait.as_millis()
            ))
        })?;

        tokio::time::timeout(self.config.source_timeout, registered.source.listings(query))
            .await
            .unwrap_or_else(|_| Err(SourceError::timeout(self.config.source_timeout)))
    }

    /// Supplier quotes for one material, derived from a lookup of its name.
    pub async fn quotes_for(&self, material: &Material, location: Location) -> Vec<SupplierQuote> {
        let query = match PriceQuery::new(material.name.as_str(), location) {
            Ok(query) => query,
            Err(error) => {
                tracing::debug!(material = %material.name, error = %error, "material name is not a usable query");
                return Vec::new();
            }
        };

        self.lookup(&query, CacheMode::Use)
            .await
            .listings
            .iter()
            .enumerate()
            .map(|(index, listing)| SupplierQuote::from_listing(index, listing))
            .collect()
    }

    /// Prices every material with bounded concurrency and aggregates each.
    ///
    /// Results keep the order of `materials`. When no material received a
    /// single quote the report is rebuilt from synthetic quotes and tagged
    /// `mock` (no sources registered) or `mock-fallback`.
    pub async fn compare_materials(&self, materials: Vec<Material>, location: Location) -> ComparisonReport {
        let priced: Vec<(Material, Vec<SupplierQuote>)> = stream::iter(materials)
            .map(|material| async move {
                let quotes = self.quotes_for(&material, location).await;
                (material, quotes)
            })
            .buffered(self.config.compare_concurrency.max(1))
            .collect()
            .await;

        let nothing_found = !priced.is_empty() && priced.iter().all(|(_, quotes)| quotes.is_empty());
        if !nothing_found {
            return ComparisonReport {
                mode: DataMode::Live,
                results: self.aggregate_all(priced),
            };
        }

        let mode = if self.sources.is_empty() {
            DataMode::Mock
        } else {
            tracing::warn!(materials = priced.len(), "no live quotes found, using synthetic quotes");
            DataMode::MockFallback
        };
        let region = location.region().unwrap_or(Region::Gauteng);
        let synthetic = priced
            .into_iter()
            .map(|(material, _)| {
                let quotes = self.synthetic.quotes_for(&material, region);
                (material, quotes)
            })
            .collect();

        ComparisonReport {
            mode,
            results: self.aggregate_all(synthetic),
        }
    }

    fn aggregate_all(&self, priced: Vec<(Material, Vec<SupplierQuote>)>) -> Vec<ComparisonResult> {
        priced
            .into_iter()
            .map(|(material, quotes)| aggregate_with(material, quotes, self.config.savings_formula))
            .collect()
    }
}
