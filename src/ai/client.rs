//! Client for a Gemini-style `generateContent` endpoint.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::retry::{retry, RetryPolicy};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI API key not configured")]
    MissingApiKey,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AiError {
    /// Rate limits, server errors and transport failures are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(status)
            }
            AiError::Network(_) => true,
            AiError::MissingApiKey | AiError::MalformedResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    generation: GenerationConfig,
    retry_policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            generation: GenerationConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    /// Send `prompt` and return the text of the first candidate, retrying
    /// transient failures according to the client's policy.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: &self.generation,
        };

        retry(&self.retry_policy, AiError::is_retryable, || {
            self.send_once(api_key, &request)
        })
        .await
    }

    async fn send_once(&self, api_key: &str, request: &GenerateRequest<'_>) -> Result<String, AiError> {
        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        extract_text(&body)
    }
}

fn network_error(err: reqwest::Error) -> AiError {
    AiError::Network(err.without_url().to_string())
}

fn extract_text(body: &str) -> Result<String, AiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AiError::MalformedResponse(e.to_string()))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::MalformedResponse("response contained no candidates".to_string()))?;

    candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|part| part.text)
        .ok_or_else(|| AiError::MalformedResponse("first candidate has no text part".to_string()))
}
