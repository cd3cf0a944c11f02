//! HTTP client for the Gemini generative API.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::models::LlmConfig;

/// A text-in, text-out generative service.
pub trait LlmService: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}

/// Gemini HTTP client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Create a client from configuration. Fails when no API key is
    /// set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl LlmService for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Transport(format!("request timed out after {}s", self.timeout_secs))
            } else {
                LlmError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::ResponseParse("empty candidate text".to_string()));
        }
        Ok(text)
    }
}

/// Canned-response service for tests.
#[cfg(test)]
pub struct MockLlm {
    responses: std::sync::Mutex<Vec<Result<String, LlmError>>>,
    pub calls: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl MockLlm {
    /// Responses are consumed in order; the last one repeats.
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        let mut responses = responses;
        responses.reverse();
        Self {
            responses: std::sync::Mutex::new(responses),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn with_response(response: &str) -> Self {
        Self::new(vec![Ok(response.to_string())])
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl LlmService for MockLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop().unwrap()
        } else {
            match responses.last() {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(e)) => Err(LlmError::Transport(e.to_string())),
                None => Err(LlmError::Transport("no canned response".to_string())),
            }
        }
    }
}
