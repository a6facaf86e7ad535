//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment (or a `.env` file).

use std::time::Duration;

use buildcompare_core::rag::DEFAULT_CONTEXT_RESULTS;
use buildcompare_core::{
    ChunkConfig, PolicyName, PolicyTable, RateLimitPolicy, SavingsFormula, DEFAULT_CHAT_MODELS,
    DEFAULT_VISION_MODELS, GROQ_BASE_URL,
};
use clap::{Parser, ValueEnum};

/// Savings formula selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SavingsFormulaArg {
    /// (average - best) * quantity
    #[default]
    AverageVsBest,
    /// (max - min) * quantity
    MaxVsMin,
}

impl From<SavingsFormulaArg> for SavingsFormula {
    fn from(arg: SavingsFormulaArg) -> Self {
        match arg {
            SavingsFormulaArg::AverageVsBest => Self::AverageVsBest,
            SavingsFormulaArg::MaxVsMin => Self::MaxVsMin,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "buildcompare")]
#[command(about = "Materials price comparison API")]
#[command(version)]
pub struct Config {
    /// Interface to bind
    #[arg(long, env = "BUILDCOMPARE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "BUILDCOMPARE_PORT", default_value_t = 3001)]
    pub port: u16,

    /// API key for the chat and vision completion provider.
    /// Without it analysis runs on synthetic data.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// OpenAI-compatible completion endpoint
    #[arg(long, env = "BUILDCOMPARE_COMPLETION_URL", default_value = GROQ_BASE_URL)]
    pub completion_url: String,

    /// Knowledge backend answering chat questions before the completion models
    #[arg(long, env = "BUILDCOMPARE_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Passages the knowledge backend retrieves per question (1 to 10)
    #[arg(long, env = "BUILDCOMPARE_BACKEND_CONTEXT_RESULTS", default_value_t = DEFAULT_CONTEXT_RESULTS)]
    pub backend_context_results: u32,

    /// Listing feed queried alongside the synthetic retailer feeds
    #[arg(long, env = "BUILDCOMPARE_PRICE_FEED_URL")]
    pub price_feed_url: Option<String>,

    /// Chat models, tried in order
    #[arg(long, env = "BUILDCOMPARE_CHAT_MODELS", value_delimiter = ',', default_values = DEFAULT_CHAT_MODELS)]
    pub chat_models: Vec<String>,

    /// Vision models, tried in order
    #[arg(long, env = "BUILDCOMPARE_VISION_MODELS", value_delimiter = ',', default_values = DEFAULT_VISION_MODELS)]
    pub vision_models: Vec<String>,

    #[arg(long, env = "BUILDCOMPARE_RATE_DEFAULT_MAX")]
    pub rate_default_max: Option<u32>,
    #[arg(long, env = "BUILDCOMPARE_RATE_DEFAULT_WINDOW_MS")]
    pub rate_default_window_ms: Option<u64>,
    #[arg(long, env = "BUILDCOMPARE_RATE_SCRAPING_MAX")]
    pub rate_scraping_max: Option<u32>,
    #[arg(long, env = "BUILDCOMPARE_RATE_SCRAPING_WINDOW_MS")]
    pub rate_scraping_window_ms: Option<u64>,
    #[arg(long, env = "BUILDCOMPARE_RATE_AUTH_MAX")]
    pub rate_auth_max: Option<u32>,
    #[arg(long, env = "BUILDCOMPARE_RATE_AUTH_WINDOW_MS")]
    pub rate_auth_window_ms: Option<u64>,

    /// Budget for the knowledge backend before falling back
    #[arg(long, env = "BUILDCOMPARE_PRIMARY_TIMEOUT_MS", default_value_t = 3_000)]
    pub primary_timeout_ms: u64,

    /// Budget for each chat model attempt
    #[arg(long, env = "BUILDCOMPARE_CHAT_TIMEOUT_MS", default_value_t = 20_000)]
    pub chat_timeout_ms: u64,

    /// Budget for each vision model attempt
    #[arg(long, env = "BUILDCOMPARE_VISION_TIMEOUT_MS", default_value_t = 30_000)]
    pub vision_timeout_ms: u64,

    /// Budget for each price source call
    #[arg(long, env = "BUILDCOMPARE_SOURCE_TIMEOUT_MS", default_value_t = 5_000)]
    pub source_timeout_ms: u64,

    /// Materials priced concurrently by /api/v1/compare
    #[arg(long, env = "BUILDCOMPARE_COMPARE_CONCURRENCY", default_value_t = 4)]
    pub compare_concurrency: usize,

    #[arg(long, env = "BUILDCOMPARE_SAVINGS_FORMULA", value_enum, default_value_t = SavingsFormulaArg::AverageVsBest)]
    pub savings_formula: SavingsFormulaArg,

    /// Skip models that keep failing for a short while
    #[arg(long, env = "BUILDCOMPARE_CIRCUIT_BREAKER")]
    pub circuit_breaker: bool,

    /// Characters per streamed chat chunk
    #[arg(long, env = "BUILDCOMPARE_CHUNK_CHARS", default_value_t = 12)]
    pub chunk_chars: usize,

    /// Pause between streamed chat chunks
    #[arg(long, env = "BUILDCOMPARE_CHUNK_DELAY_MS", default_value_t = 15)]
    pub chunk_delay_ms: u64,

    /// Seed for synthetic data, for reproducible demos
    #[arg(long, env = "BUILDCOMPARE_SYNTHETIC_SEED")]
    pub synthetic_seed: Option<u64>,
}

impl Config {
    /// Built-in policies with any per-policy overrides applied.
    pub fn policy_table(&self) -> PolicyTable {
        let overrides = [
            (PolicyName::Default, self.rate_default_max, self.rate_default_window_ms),
            (PolicyName::Scraping, self.rate_scraping_max, self.rate_scraping_window_ms),
            (PolicyName::Auth, self.rate_auth_max, self.rate_auth_window_ms),
        ];

        overrides
            .into_iter()
            .fold(PolicyTable::default(), |table, (name, max, window_ms)| {
                if max.is_none() && window_ms.is_none() {
                    return table;
                }
                let current = *table.get(name);
                let window = window_ms.map_or(current.window, Duration::from_millis);
                let max_requests = max.unwrap_or(current.max_requests);
                table.with_policy(RateLimitPolicy::new(name, window, max_requests))
            })
    }

    pub fn chunking(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_chars: self.chunk_chars,
            delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::parse_from(["buildcompare"]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.chat_models, DEFAULT_CHAT_MODELS.to_vec());
        assert_eq!(config.vision_models.len(), 4);
        assert_eq!(config.policy_table(), PolicyTable::default());
        assert_eq!(config.chunking(), ChunkConfig::default());
        assert!(!config.circuit_breaker);
        assert_eq!(config.backend_context_results, DEFAULT_CONTEXT_RESULTS);
    }

    #[test]
    fn policy_overrides_replace_only_named_fields() {
        let config = Config::parse_from([
            "buildcompare",
            "--rate-scraping-max",
            "3",
            "--rate-auth-window-ms",
            "1000",
        ]);
        let table = config.policy_table();

        assert_eq!(table.get(PolicyName::Scraping).max_requests, 3);
        assert_eq!(table.get(PolicyName::Scraping).window, Duration::from_secs(60));
        assert_eq!(table.get(PolicyName::Auth).window, Duration::from_secs(1));
        assert_eq!(table.get(PolicyName::Auth).max_requests, 5);
        assert_eq!(table.get(PolicyName::Default).max_requests, 100);
    }

    #[test]
    fn model_lists_split_on_commas() {
        let config = Config::parse_from(["buildcompare", "--chat-models", "a,b,c"]);
        assert_eq!(config.chat_models, vec!["a", "b", "c"]);
        assert_eq!(
            SavingsFormula::from(config.savings_formula),
            SavingsFormula::AverageVsBest
        );
    }
}
