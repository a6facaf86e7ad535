//! OpenAI-compatible chat completion client.
//!
//! Groq serves the chat and vision models over the OpenAI wire format, so one
//! client covers both the secondary chat tier and image analysis.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::upstream::UpstreamError;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model cascade, cheapest first.
pub const DEFAULT_CHAT_MODELS: [&str; 2] = ["llama-3.1-8b-instant", "llama-3.3-70b-versatile"];

/// Default vision model cascade. Preview models come first because they are
/// periodically re-enabled.
pub const DEFAULT_VISION_MODELS: [&str; 4] = [
    "llama-3.2-90b-vision-preview",
    "llama-3.2-11b-vision-preview",
    "llama-3.2-90b-vision",
    "llama-3.2-11b-vision",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User turn carrying a prompt and an image given as a URL or data URL.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

/// Model-independent part of a completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for `response_format: json_object`.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 1024,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// A provider that turns a request into text using a named model.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    timeout_ms: u64,
}

impl OpenAiCompatibleProvider {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, auth: HttpAuth) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth,
            timeout_ms: 30_000,
        }
    }

    /// Groq endpoint with bearer authentication.
    pub fn groq(http: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::new(http, GROQ_BASE_URL, HttpAuth::BearerToken(api_key.into()))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn build_request(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<HttpRequest, UpstreamError> {
        let body = WireRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        HttpRequest::post_json(url, &body)
            .map(|request| request.with_auth(&self.auth).with_timeout_ms(self.timeout_ms))
            .map_err(|e| UpstreamError::invalid_request(format!("failed to encode completion request: {e}")))
    }
}

impl CompletionProvider for OpenAiCompatibleProvider {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>> {
        Box::pin(async move {
            let http_request = self.build_request(model, request)?;
            let response = self.http.execute(http_request).await?;

            if !response.is_success() {
                return Err(UpstreamError::from_status(
                    response.status,
                    error_message(&response.body),
                ));
            }

            let parsed: WireResponse = serde_json::from_str(&response.body).map_err(|e| {
                UpstreamError::malformed(format!("completion response is not valid JSON: {e}"))
            })?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();

            if content.trim().is_empty() {
                return Err(UpstreamError::empty_response("empty completion"));
            }

            Ok(content)
        })
    }
}

/// Pulls `error.message` out of an OpenAI-style error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpResponse, ScriptedHttpClient};
    use crate::upstream::UpstreamErrorKind;

    fn provider(client: ScriptedHttpClient) -> (OpenAiCompatibleProvider, Arc<ScriptedHttpClient>) {
        let client = Arc::new(client);
        (OpenAiCompatibleProvider::groq(client.clone(), "gsk-test"), client)
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let (provider, client) = provider(ScriptedHttpClient::new().with_reply(Ok(
            HttpResponse::ok_json(r#"{"choices":[{"message":{"role":"assistant","content":"Sawubona!"}}]}"#),
        )));

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let text = provider
            .complete("llama-3.1-8b-instant", &request)
            .await
            .expect("completion succeeds");
        assert_eq!(text, "Sawubona!");

        let sent = &client.requests()[0];
        assert_eq!(sent.url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(
            sent.headers.get("authorization").map(String::as_str),
            Some("Bearer gsk-test")
        );
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap_or("{}")).expect("json");
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn vision_request_serializes_image_part_and_json_format() {
        let (provider, client) = provider(ScriptedHttpClient::new().with_reply(Ok(
            HttpResponse::ok_json(r#"{"choices":[{"message":{"content":"[]"}}]}"#),
        )));

        let request = CompletionRequest::new(vec![ChatMessage::user_with_image(
            "identify",
            "data:image/png;base64,AAAA",
        )])
        .with_temperature(0.1)
        .json();
        provider
            .complete("llama-3.2-11b-vision", &request)
            .await
            .expect("completion succeeds");

        let body: Value =
            serde_json::from_str(client.requests()[0].body.as_deref().unwrap_or("{}")).expect("json");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[tokio::test]
    async fn decommissioned_model_error_is_unavailable() {
        let (provider, _) = provider(ScriptedHttpClient::new().with_reply(Ok(HttpResponse::with_status(
            400,
            r#"{"error":{"message":"The model `llama-3.2-90b-vision-preview` has been decommissioned","type":"invalid_request_error"}}"#,
        ))));

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let error = provider
            .complete("llama-3.2-90b-vision-preview", &request)
            .await
            .expect_err("decommissioned model fails");
        assert_eq!(error.kind(), UpstreamErrorKind::Unavailable);
        assert!(error.message().contains("decommissioned"));
    }

    #[tokio::test]
    async fn blank_content_is_empty_response() {
        let (provider, _) = provider(ScriptedHttpClient::new().with_reply(Ok(
            HttpResponse::ok_json(r#"{"choices":[{"message":{"content":"  "}}]}"#),
        )));

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let error = provider
            .complete("llama-3.1-8b-instant", &request)
            .await
            .expect_err("blank content fails");
        assert_eq!(error.kind(), UpstreamErrorKind::EmptyResponse);
    }
}
