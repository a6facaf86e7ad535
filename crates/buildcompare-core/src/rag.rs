use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::http_client::{HttpClient, HttpRequest};
use crate::upstream::UpstreamError;

/// Number of knowledge-base passages the backend retrieves per question.
pub const DEFAULT_CONTEXT_RESULTS: u32 = 3;
pub const MAX_CONTEXT_RESULTS: u32 = 10;

/// Primary chat tier: answers a free-text question.
pub trait AnswerBackend: Send + Sync {
    fn answer<'a>(
        &'a self,
        question: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>>;
}

#[derive(Serialize)]
struct RagQuery<'a> {
    query: &'a str,
    n_context_results: u32,
}

#[derive(Deserialize)]
struct RagReply {
    #[serde(default)]
    llm_response: Option<String>,
}

/// Client for the self-hosted retrieval-augmented answer service.
#[derive(Clone)]
pub struct RagBackend {
    http: Arc<dyn HttpClient>,
    base_url: String,
    context_results: u32,
    timeout_ms: u64,
}

impl RagBackend {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            context_results: DEFAULT_CONTEXT_RESULTS,
            timeout_ms: 10_000,
        }
    }

    /// Passages retrieved per question; the backend accepts 1 to 10.
    pub fn with_context_results(mut self, context_results: u32) -> Self {
        self.context_results = context_results.clamp(1, MAX_CONTEXT_RESULTS);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl AnswerBackend for RagBackend {
    fn answer<'a>(
        &'a self,
        question: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>> {
        Box::pin(async move {
            let body = RagQuery {
                query: question,
                n_context_results: self.context_results,
            };
            let request = HttpRequest::post_json(format!("{}/rag/query", self.base_url), &body)
                .map_err(|e| UpstreamError::invalid_request(format!("failed to encode rag query: {e}")))?
                .with_timeout_ms(self.timeout_ms);

            let response = self.http.execute(request).await?;
            if !response.is_success() {
                return Err(UpstreamError::from_status(response.status, response.body));
            }

            let reply: RagReply = serde_json::from_str(&response.body)
                .map_err(|e| UpstreamError::malformed(format!("rag reply is not valid JSON: {e}")))?;

            match reply.llm_response {
                Some(text) if is_in_band_error(&text) => Err(UpstreamError::unavailable(format!(
                    "rag backend reported a failure: {}",
                    text.trim()
                ))),
                Some(text) if !text.trim().is_empty() => Ok(text),
                _ => Err(UpstreamError::empty_response("rag backend returned no answer")),
            }
        })
    }
}

/// The backend answers 200 with an `Error...` text when its own model call fails.
fn is_in_band_error(text: &str) -> bool {
    text.trim_start().starts_with("Error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse, ScriptedHttpClient};
    use crate::upstream::UpstreamErrorKind;

    #[tokio::test]
    async fn posts_query_and_reads_llm_response() {
        let client = Arc::new(ScriptedHttpClient::new().with_reply(Ok(HttpResponse::ok_json(
            r#"{"llm_response":"Use 42.5N for structural work.","context":[]}"#,
        ))));
        let backend = RagBackend::new(client.clone(), "http://localhost:8000/");

        let answer = backend.answer("Which cement grade?").await.expect("answer");
        assert_eq!(answer, "Use 42.5N for structural work.");

        let request = &client.requests()[0];
        assert_eq!(request.url, "http://localhost:8000/rag/query");
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap_or("{}")).expect("json body");
        assert_eq!(body["query"], "Which cement grade?");
        assert_eq!(body["n_context_results"], 3);
    }

    #[tokio::test]
    async fn missing_answer_is_empty_response() {
        let client = Arc::new(ScriptedHttpClient::new().with_reply(Ok(HttpResponse::ok_json("{}"))));
        let backend = RagBackend::new(client, "http://localhost:8000");

        let error = backend.answer("hello").await.expect_err("no answer");
        assert_eq!(error.kind(), UpstreamErrorKind::EmptyResponse);
    }

    #[tokio::test]
    async fn in_band_error_text_is_unavailable() {
        for reply in [
            r#"{"llm_response":"Error: Groq API key not configured."}"#,
            r#"{"llm_response":"Error generating response: upstream 502"}"#,
        ] {
            let client = Arc::new(ScriptedHttpClient::new().with_reply(Ok(HttpResponse::ok_json(reply))));
            let backend = RagBackend::new(client, "http://localhost:8000");

            let error = backend.answer("hello").await.expect_err("in-band failure");
            assert_eq!(error.kind(), UpstreamErrorKind::Unavailable);
            assert!(error.message().contains("Groq API key") || error.message().contains("502"));
        }
    }

    #[tokio::test]
    async fn context_results_are_clamped_to_backend_range() {
        let client = Arc::new(ScriptedHttpClient::new().with_reply(Ok(HttpResponse::ok_json(
            r#"{"llm_response":"ok"}"#,
        ))));
        let backend = RagBackend::new(client.clone(), "http://localhost:8000").with_context_results(25);

        backend.answer("hello").await.expect("answer");
        let body: serde_json::Value =
            serde_json::from_str(client.requests()[0].body.as_deref().unwrap_or("{}")).expect("json body");
        assert_eq!(body["n_context_results"], 10);
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = Arc::new(
            ScriptedHttpClient::new().with_reply(Err(HttpError::new("connection failed: refused"))),
        );
        let backend = RagBackend::new(client, "http://localhost:8000");

        let error = backend.answer("hello").await.expect_err("backend down");
        assert_eq!(error.kind(), UpstreamErrorKind::Transport);
    }
}
