//! Bill of quantities drafted by chat models from a short project description.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::material_from_value;
use crate::cascade::{CascadeError, CascadeFailure, CascadeOutcome, ProviderCascade};
use crate::completion::{ChatMessage, CompletionProvider, CompletionRequest, DEFAULT_CHAT_MODELS};
use crate::domain::Material;
use crate::normalize::parse_items;
use crate::upstream::{UpstreamError, UpstreamErrorKind};

pub const BOQ_PROMPT: &str = "\
You are an expert South African Quantity Surveyor.
Generate a Bill of Quantities (BOQ) for a standard 3 bedroom house (approx. 120 square metres) built to the specification below.

Return a JSON object with a single key \"materials\" holding a list of objects with these keys:
- \"name\": material name (e.g. \"Cement 42.5N\")
- \"category\": one of cement, bricks, steel, timber, paint, roofing, other
- \"quantity\": number
- \"unit\": e.g. bag, m3, unit, length
- \"brand\": recommended South African brand (e.g. PPC, Corobrik)

Include a 10% waste allowance in every quantity. Return ONLY the JSON.";

const DEFAULT_FOUNDATION: &str = "Standard strip footings";
const DEFAULT_STRUCTURE: &str = "Double skin brick walls";
const DEFAULT_ROOFING: &str = "Concrete roof tiles";
const DEFAULT_FINISHING: &str = "Standard plaster and paint";

/// Building choices per stage; blank stages get a conventional default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSpec {
    pub foundation: String,
    pub structure: String,
    pub roofing: String,
    pub finishing: String,
}

impl ProjectSpec {
    pub fn prompt(&self) -> String {
        let stage = |value: &str, fallback: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                fallback.to_owned()
            } else {
                value.to_owned()
            }
        };
        format!(
            "Foundation: {}\nStructure: {}\nRoofing: {}\nFinishing: {}",
            stage(&self.foundation, DEFAULT_FOUNDATION),
            stage(&self.structure, DEFAULT_STRUCTURE),
            stage(&self.roofing, DEFAULT_ROOFING),
            stage(&self.finishing, DEFAULT_FINISHING),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoqEstimate {
    pub model: String,
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, Error)]
pub enum EstimateError {
    #[error("no estimator model configured")]
    NotConfigured,

    #[error("estimator is misconfigured: {0}")]
    Misconfigured(String),

    #[error("estimator is temporarily unavailable")]
    Unavailable { failures: Vec<CascadeFailure> },

    /// Every model answered, but never with a usable materials list.
    #[error("estimator models returned no usable bill of quantities")]
    Malformed { failures: Vec<CascadeFailure> },
}

impl EstimateError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured | Self::Misconfigured(_) => "upstream.misconfigured",
            Self::Unavailable { .. } => "upstream.unavailable",
            Self::Malformed { .. } => "upstream.malformed",
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<CascadeError> for EstimateError {
    fn from(error: CascadeError) -> Self {
        match error {
            CascadeError::Fatal { error, .. } => Self::Misconfigured(error.message().to_owned()),
            CascadeError::Exhausted { failures, .. } => {
                let all_malformed = !failures.is_empty()
                    && failures
                        .iter()
                        .all(|failure| failure.error.kind() == UpstreamErrorKind::Malformed);
                if all_malformed {
                    Self::Malformed { failures }
                } else {
                    Self::Unavailable { failures }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub models: Vec<String>,
    pub model_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_CHAT_MODELS.iter().map(|model| (*model).to_owned()).collect(),
            model_timeout: Duration::from_secs(20),
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

pub struct Estimator {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: EstimatorConfig,
    cascade: ProviderCascade,
}

impl Estimator {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>, config: EstimatorConfig) -> Self {
        let cascade = ProviderCascade::new(config.model_timeout);
        Self {
            provider,
            config,
            cascade,
        }
    }

    pub fn with_cascade(mut self, cascade: ProviderCascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn is_live(&self) -> bool {
        self.provider.is_some()
    }

    /// Asks the chat models in order for a materials list. A reply that does
    /// not parse into at least one material counts as a transient failure, so
    /// the next model is tried.
    pub async fn estimate(&self, project: &ProjectSpec) -> Result<BoqEstimate, EstimateError> {
        let Some(provider) = &self.provider else {
            return Err(EstimateError::NotConfigured);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(BOQ_PROMPT),
            ChatMessage::user(project.prompt()),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .json();

        let success = self
            .cascade
            .run(&self.config.models, |model| {
                let model = model.clone();
                let provider = Arc::clone(provider);
                let request = &request;
                async move {
                    let reply = provider.complete(&model, request).await;
                    CascadeOutcome::from(reply.and_then(|text| materials_from_reply(&text)))
                }
            })
            .await?;

        tracing::debug!(
            model = %success.candidate,
            materials = success.payload.len(),
            "estimator model answered"
        );
        Ok(BoqEstimate {
            model: success.candidate,
            materials: success.payload,
        })
    }
}

fn materials_from_reply(text: &str) -> Result<Vec<Material>, UpstreamError> {
    let items = parse_items(text).map_err(|error| UpstreamError::malformed(error.to_string()))?;
    if items.is_empty() {
        return Err(UpstreamError::malformed("bill of quantities has no materials"));
    }
    Ok(items
        .iter()
        .enumerate()
        .map(|(index, item)| material_from_value(index, item))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::MaterialCategory;

    struct ScriptedModels {
        replies: Vec<(&'static str, Result<String, UpstreamError>)>,
        calls: AtomicUsize,
    }

    impl CompletionProvider for ScriptedModels {
        fn complete<'a>(
            &'a self,
            model: &'a str,
            _request: &'a CompletionRequest,
        ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .iter()
                .find(|(name, _)| *name == model)
                .map_or_else(|| Err(UpstreamError::unavailable("unscripted")), |(_, reply)| reply.clone());
            Box::pin(async move { reply })
        }
    }

    fn estimator(replies: Vec<(&'static str, Result<String, UpstreamError>)>) -> (Estimator, Arc<ScriptedModels>) {
        let models = Arc::new(ScriptedModels {
            replies,
            calls: AtomicUsize::new(0),
        });
        let estimator = Estimator::new(Some(models.clone()), EstimatorConfig::default());
        (estimator, models)
    }

    #[test]
    fn blank_stages_use_defaults() {
        let project = ProjectSpec {
            roofing: String::from("IBR sheeting"),
            ..ProjectSpec::default()
        };
        let prompt = project.prompt();
        assert!(prompt.contains("Foundation: Standard strip footings"));
        assert!(prompt.contains("Roofing: IBR sheeting"));
        assert!(prompt.contains("Finishing: Standard plaster and paint"));
    }

    #[tokio::test]
    async fn no_provider_is_not_configured() {
        let estimator = Estimator::new(None, EstimatorConfig::default());
        let error = estimator
            .estimate(&ProjectSpec::default())
            .await
            .expect_err("nothing configured");
        assert!(matches!(error, EstimateError::NotConfigured));
        assert_eq!(error.code(), "upstream.misconfigured");
        assert!(!estimator.is_live());
    }

    #[tokio::test]
    async fn wrapped_materials_are_normalized() {
        let (estimator, _) = estimator(vec![(
            "llama-3.1-8b-instant",
            Ok(String::from(
                r#"{"materials":[{"name":"Cement 42.5N","category":"Cement","quantity":180,"unit":"bag","brand":"PPC"},{"name":"Stock brick"}]}"#,
            )),
        )]);

        let estimate = estimator.estimate(&ProjectSpec::default()).await.expect("estimate");
        assert_eq!(estimate.model, "llama-3.1-8b-instant");
        assert_eq!(estimate.materials.len(), 2);
        assert_eq!(estimate.materials[0].category, MaterialCategory::Cement);
        assert_eq!(estimate.materials[0].quantity, 180.0);
        assert_eq!(estimate.materials[1].unit, "unit");
    }

    #[tokio::test]
    async fn unparseable_reply_falls_through_to_next_model() {
        let (estimator, models) = estimator(vec![
            ("llama-3.1-8b-instant", Ok(String::from("Here is your BOQ!"))),
            (
                "llama-3.3-70b-versatile",
                Ok(String::from(r#"[{"name":"Roof tiles","quantity":1400}]"#)),
            ),
        ]);

        let estimate = estimator.estimate(&ProjectSpec::default()).await.expect("estimate");
        assert_eq!(estimate.model, "llama-3.3-70b-versatile");
        assert_eq!(estimate.materials[0].name, "Roof tiles");
        assert_eq!(models.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_lists_everywhere_are_malformed() {
        let empty = || Ok(String::from(r#"{"materials":[]}"#));
        let (estimator, _) = estimator(
            DEFAULT_CHAT_MODELS
                .iter()
                .map(|model| (*model, empty()))
                .collect(),
        );

        let error = estimator
            .estimate(&ProjectSpec::default())
            .await
            .expect_err("no materials");
        assert_eq!(error.code(), "upstream.malformed");
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn rejected_key_stops_the_cascade() {
        let (estimator, models) = estimator(vec![(
            "llama-3.1-8b-instant",
            Err(UpstreamError::from_status(401, "Invalid API Key")),
        )]);

        let error = estimator
            .estimate(&ProjectSpec::default())
            .await
            .expect_err("bad key");
        assert!(matches!(error, EstimateError::Misconfigured(ref message) if message == "Invalid API Key"));
        assert_eq!(models.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outage_is_retryable() {
        let (estimator, _) = estimator(Vec::new());
        let error = estimator
            .estimate(&ProjectSpec::default())
            .await
            .expect_err("every model down");
        assert_eq!(error.code(), "upstream.unavailable");
        assert!(error.retryable());
    }
}
