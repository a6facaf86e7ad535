//! Two-tier chat answering.
//!
//! The primary tier is the self-hosted answer backend, given a short time
//! bound. Any primary failure falls through to the secondary tier: a
//! completion provider walked through its chat model cascade. Every request
//! starts again from the primary tier.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::cascade::{CascadeError, CascadeFailure, CascadeOutcome, ProviderCascade};
use crate::completion::{ChatMessage, CompletionProvider, CompletionRequest, DEFAULT_CHAT_MODELS};
use crate::rag::AnswerBackend;
use crate::upstream::{UpstreamError, UpstreamErrorKind};

pub const CONCIERGE_PERSONA: &str = "\
You are BuildCompare Concierge, an expert South African construction assistant.
Your goal is to help users with Bill of Quantities (BoQ), material estimation and local building standards (SANS 10400, NHBRC).

Key traits:
- Friendly South African persona (\"Sawubona!\", \"Howzit\").
- Expert knowledge of South African brands (PPC, AfriSam, Corobrik, Cashbuild, Builders Warehouse).
- Emphasis on compliance (NHBRC, SABS standards).
- Practical advice for home builders.

When asked about cement, explain the grades (32.5 vs 42.5) for plaster versus structural use and mention local brands.
When asked about house planning, break the work into stages (legal, professional team, structural, internal services, finishes) and give budget estimates in ZAR (R8,000 - R12,000 per square metre).

Always format responses with Markdown headers and bullet points.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConciergeTier {
    Primary,
    Secondary,
}

impl ConciergeTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl Display for ConciergeTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text answer and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub text: String,
    pub tier: ConciergeTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum ConciergeError {
    /// Both tiers failed transiently.
    #[error("chat service is temporarily unavailable")]
    Unavailable { failures: Vec<CascadeFailure> },

    /// Credentials or request shape were rejected, or nothing is configured.
    #[error("chat service is misconfigured: {0}")]
    Misconfigured(String),

    /// Every model answered, but never with usable text.
    #[error("chat provider returned a malformed reply")]
    Malformed { failures: Vec<CascadeFailure> },
}

impl ConciergeError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "upstream.unavailable",
            Self::Misconfigured(_) => "upstream.misconfigured",
            Self::Malformed { .. } => "upstream.malformed",
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConciergeConfig {
    pub primary_timeout: Duration,
    pub model_timeout: Duration,
    pub chat_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_millis(3_000),
            model_timeout: Duration::from_secs(20),
            chat_models: DEFAULT_CHAT_MODELS.iter().map(|model| (*model).to_owned()).collect(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

pub struct Concierge {
    primary: Option<Arc<dyn AnswerBackend>>,
    secondary: Option<Arc<dyn CompletionProvider>>,
    config: ConciergeConfig,
    cascade: ProviderCascade,
}

impl Concierge {
    pub fn new(
        primary: Option<Arc<dyn AnswerBackend>>,
        secondary: Option<Arc<dyn CompletionProvider>>,
        config: ConciergeConfig,
    ) -> Self {
        let cascade = ProviderCascade::new(config.model_timeout);
        Self {
            primary,
            secondary,
            config,
            cascade,
        }
    }

    /// Replaces the secondary model cascade, e.g. to attach breakers.
    pub fn with_cascade(mut self, cascade: ProviderCascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    pub async fn answer(&self, message: &str) -> Result<ChatAnswer, ConciergeError> {
        let mut failures = Vec::new();

        if let Some(primary) = &self.primary {
            match self.ask_primary(primary.as_ref(), message).await {
                Ok(text) => {
                    return Ok(ChatAnswer {
                        text,
                        tier: ConciergeTier::Primary,
                        model: None,
                    })
                }
                Err(error) => {
                    tracing::warn!(error = %error, "primary answer backend failed, falling back to completion provider");
                    failures.push(CascadeFailure {
                        candidate: ConciergeTier::Primary.to_string(),
                        error,
                    });
                }
            }
        }

        let Some(secondary) = &self.secondary else {
            return Err(if failures.is_empty() {
                ConciergeError::Misconfigured(String::from("no chat provider configured"))
            } else {
                ConciergeError::Unavailable { failures }
            });
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(CONCIERGE_PERSONA),
            ChatMessage::user(message),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let result = self
            .cascade
            .run(&self.config.chat_models, |model| {
                let model = model.clone();
                let secondary = Arc::clone(secondary);
                let request = &request;
                async move { CascadeOutcome::from(secondary.complete(&model, request).await) }
            })
            .await;

        match result {
            Ok(success) => Ok(ChatAnswer {
                text: success.payload,
                tier: ConciergeTier::Secondary,
                model: Some(success.candidate),
            }),
            Err(CascadeError::Fatal { error, .. }) => {
                Err(ConciergeError::Misconfigured(error.message().to_owned()))
            }
            Err(CascadeError::Exhausted {
                failures: secondary_failures,
                ..
            }) => {
                let all_malformed = !secondary_failures.is_empty()
                    && secondary_failures
                        .iter()
                        .all(|failure| failure.error.kind() == UpstreamErrorKind::Malformed);
                failures.extend(secondary_failures);
                if all_malformed {
                    Err(ConciergeError::Malformed { failures })
                } else {
                    Err(ConciergeError::Unavailable { failures })
                }
            }
        }
    }

    async fn ask_primary(
        &self,
        primary: &dyn AnswerBackend,
        message: &str,
    ) -> Result<String, UpstreamError> {
        tokio::time::timeout(self.config.primary_timeout, primary.answer(message))
            .await
            .unwrap_or_else(|_| Err(UpstreamError::timeout("timeout")))
    }
}
