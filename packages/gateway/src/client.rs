use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::document::Document;
use crate::error::{GatewayError, Result};

/// One multimodal extraction call: documents first, then the prompt text.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub documents: Vec<Document>,
    pub prompt: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Trait for extraction model clients, enabling mocking in tests.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Return the model's raw text answer.
    async fn generate(&self, request: &ExtractionRequest) -> Result<String>;
}

/// Gemini `generateContent` client.
///
/// `Debug` is implemented by hand so the API key never reaches logs.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    model: String,
    retry_delays: Vec<Duration>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        })
    }

    /// Replace the backoff schedule. One retry is made per entry.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url, self.model
        )
    }
}

#[async_trait]
impl ExtractionClient for GeminiClient {
    #[tracing::instrument(skip_all, fields(model = %self.model, documents = request.documents.len()))]
    async fn generate(&self, request: &ExtractionRequest) -> Result<String> {
        let url = self.endpoint();

        let mut parts: Vec<Part<'_>> = request
            .documents
            .iter()
            .map(|doc| Part::Inline {
                inline_data: InlineData {
                    mime_type: &doc.mime_type,
                    data: doc.to_base64(),
                },
            })
            .collect();
        parts.push(Part::Text {
            text: &request.prompt,
        });

        let body = GenerateContentRequest {
            contents: [Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: "application/json",
            },
        };

        let max_attempts = self.retry_delays.len() + 1;
        let mut last_error: Option<GatewayError> = None;
        let mut next_delay = Duration::ZERO;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                debug!(attempt, "retrying extraction request after {:?}", next_delay);
                tokio::time::sleep(next_delay).await;
            }

            // Base delay for the next retry; a rate limit may raise it below.
            next_delay = self
                .retry_delays
                .get(attempt)
                .or(self.retry_delays.last())
                .copied()
                .unwrap_or(Duration::ZERO);

            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, error = %e, "extraction request failed");
                    last_error = Some(GatewayError::Http(e));
                    continue;
                }
            };

            let status = resp.status().as_u16();

            if status == 429 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(attempt, retry_after, "extraction API rate limited");
                next_delay = Duration::from_secs(retry_after).max(next_delay);
                last_error = Some(GatewayError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status >= 500 {
                let body_text = resp.text().await.unwrap_or_default();
                warn!(attempt, status, body = %body_text, "extraction API server error");
                last_error = Some(GatewayError::Api {
                    status,
                    message: body_text,
                });
                continue;
            }

            if status != 200 {
                let body_text = resp.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GeminiErrorResponse>(&body_text)
                    .ok()
                    .and_then(|r| r.error)
                    .map(|e| e.message)
                    .unwrap_or(body_text);
                return Err(GatewayError::Api { status, message });
            }

            let api_response: GenerateContentResponse = resp
                .json()
                .await
                .map_err(|e| GatewayError::MalformedJson(format!("response envelope: {e}")))?;

            if let Some(usage) = &api_response.usage_metadata {
                debug!(
                    input_tokens = usage.prompt_token_count,
                    output_tokens = usage.candidates_token_count,
                    "extraction token usage"
                );
            }

            let text = api_response
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .filter_map(|part| part.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();

            if text.trim().is_empty() {
                warn!(attempt, "extraction model returned empty response");
                last_error = Some(GatewayError::EmptyResponse);
                continue;
            }

            return Ok(text);
        }

        Err(last_error.unwrap_or(GatewayError::EmptyResponse))
    }
}

/// Test utilities for the extraction client.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Mock extraction client. Returns pre-configured responses in order and
    /// records every request it receives.
    pub struct MockExtractionClient {
        responses: Mutex<Vec<Result<String>>>,
        requests: Mutex<Vec<ExtractionRequest>>,
    }

    impl MockExtractionClient {
        pub fn new(responses: Vec<Result<String>>) -> Self {
            // Reverse so we can pop from the end
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn with_response(content: &str) -> Self {
            Self::new(vec![Ok(content.to_string())])
        }

        /// Requests received so far, oldest first.
        pub fn requests(&self) -> Vec<ExtractionRequest> {
            self.requests
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ExtractionClient for MockExtractionClient {
        async fn generate(&self, request: &ExtractionRequest) -> Result<String> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let mut responses = self
                .responses
                .lock()
                .map_err(|e| GatewayError::MalformedJson(format!("mock lock poisoned: {e}")))?;
            responses.pop().unwrap_or(Err(GatewayError::EmptyResponse))
        }
    }
}
