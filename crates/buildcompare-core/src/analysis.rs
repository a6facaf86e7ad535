//! Material identification from an uploaded photo.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::cascade::{CascadeError, CascadeOutcome, ProviderCascade};
use crate::completion::{ChatMessage, CompletionProvider, CompletionRequest, DEFAULT_VISION_MODELS};
use crate::domain::{DataMode, Material, MaterialCategory};
use crate::normalize::{parse_items, NormalizeError};
use crate::synthetic::SyntheticGenerator;
use crate::ValidationError;

pub const ANALYSIS_PROMPT: &str = "\
You are an expert Quantity Surveyor.
Analyze this image of construction material.
Identify the MAIN item visible. Do not list background items.

Return a VALID JSON array with this structure:
[
  {
    \"id\": \"item-1\",
    \"name\": \"Detailed Name (e.g. 50kg Cement Bag)\",
    \"brand\": \"Brand Name if visible (e.g. PPC, AfriSam)\",
    \"category\": \"cement\" (or bricks, steel, timber, paint, roofing, other),
    \"quantity\": 1,
    \"unit\": \"unit\" (or bag, m3, length)
  }
]

IMPORTANT: Return ONLY the JSON. No Markdown. No text before or after.";

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// `data:{mime};base64,{payload}`, defaulting to JPEG.
    pub fn data_url(&self) -> String {
        let mime = self
            .content_type
            .as_deref()
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        format!("data:{mime};base64,{}", STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub mode: DataMode,
    pub materials: Vec<Material>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("vision models failed: {0}")]
    Upstream(#[from] CascadeError),
    #[error(transparent)]
    Parse(#[from] NormalizeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub vision_models: Vec<String>,
    pub model_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            vision_models: DEFAULT_VISION_MODELS.iter().map(|model| (*model).to_owned()).collect(),
            model_timeout: Duration::from_secs(30),
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

/// Turns photos into material lines, live when a vision provider is configured.
pub struct MaterialAnalyzer {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: AnalyzerConfig,
    cascade: ProviderCascade,
    synthetic: Arc<SyntheticGenerator>,
}

impl MaterialAnalyzer {
    pub fn new(
        provider: Option<Arc<dyn CompletionProvider>>,
        config: AnalyzerConfig,
        synthetic: Arc<SyntheticGenerator>,
    ) -> Self {
        let cascade = ProviderCascade::new(config.model_timeout);
        Self {
            provider,
            config,
            cascade,
            synthetic,
        }
    }

    pub fn with_cascade(mut self, cascade: ProviderCascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn is_live(&self) -> bool {
        self.provider.is_some()
    }

    /// Analyzes `image`, or fabricates materials from `file_name` when no
    /// provider is configured. An image is required in live mode.
    ///
    /// Upstream and parse failures are absorbed into a `mock-fallback` report.
    pub async fn analyze(
        &self,
        file_name: &str,
        image: Option<&ImageUpload>,
    ) -> Result<AnalysisReport, ValidationError> {
        let Some(provider) = &self.provider else {
            tracing::warn!("no vision provider configured, returning synthetic materials");
            return Ok(self.synthetic_report(file_name, DataMode::Mock));
        };

        let image = image
            .filter(|image| !image.bytes.is_empty())
            .ok_or(ValidationError::EmptyField { field: "file" })?;

        match self.analyze_live(provider.as_ref(), image).await {
            Ok(materials) => Ok(AnalysisReport {
                success: true,
                mode: DataMode::Live,
                materials,
            }),
            Err(error) => {
                tracing::warn!(error = %error, file_name, "live analysis failed, returning synthetic materials");
                Ok(self.synthetic_report(file_name, DataMode::MockFallback))
            }
        }
    }

    async fn analyze_live(
        &self,
        provider: &dyn CompletionProvider,
        image: &ImageUpload,
    ) -> Result<Vec<Material>, AnalysisError> {
        let request = CompletionRequest::new(vec![ChatMessage::user_with_image(
            ANALYSIS_PROMPT,
            image.data_url(),
        )])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .json();

        let success = self
            .cascade
            .run(&self.config.vision_models, |model| {
                let model = model.clone();
                let request = &request;
                async move { CascadeOutcome::from(provider.complete(&model, request).await) }
            })
            .await?;

        tracing::debug!(model = %success.candidate, "vision model answered");
        let items = parse_items(&success.payload)?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| material_from_value(index, item))
            .collect())
    }

    fn synthetic_report(&self, file_name: &str, mode: DataMode) -> AnalysisReport {
        let file_name = if file_name.trim().is_empty() {
            "image.jpg"
        } else {
            file_name
        };
        AnalysisReport {
            success: true,
            mode,
            materials: self.synthetic.materials_for_file(file_name),
        }
    }
}

/// Maps one model-produced item onto a material, filling defaults for missing fields.
pub fn material_from_value(index: usize, item: &Value) -> Material {
    let text = |field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let quantity = match item.get("quantity") {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|quantity| quantity.is_finite() && *quantity > 0.0)
    .unwrap_or(1.0);

    Material {
        id: format!("ai-{}-{index}", uuid::Uuid::new_v4()),
        name: text("name").unwrap_or("Unknown Item").to_owned(),
        brand: Some(text("brand").unwrap_or("Generic").to_owned()),
        category: text("category").map_or(MaterialCategory::Other, MaterialCategory::parse_lenient),
        quantity,
        unit: text("unit").unwrap_or("unit").to_owned(),
    }
}
