//! LLM fallback extraction: prompt construction, the Gemini client,
//! response validation, and the retrying page extractor.

pub mod client;
pub mod parser;
pub mod prompt;

pub use client::{GeminiClient, LlmService};
pub use parser::{calculate_confidence, parse_response};
pub use prompt::build_extraction_prompt;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::ProcedureRecord;

/// Cost per million estimated tokens, in USD.
const COST_PER_MILLION_TOKENS: f64 = 0.075;

/// One page's LLM extraction outcome.
#[derive(Debug, Clone, Default)]
pub struct LlmExtraction {
    pub records: Vec<ProcedureRecord>,
    pub confidence: f32,
    pub errors: Vec<String>,
}

/// Accumulated usage of the LLM service over a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LlmUsage {
    pub calls: u64,
    pub estimated_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl LlmUsage {
    /// Record one call. Tokens are estimated at four characters each.
    pub fn record(&mut self, prompt_chars: usize, response_chars: usize) {
        self.calls += 1;
        let tokens = ((prompt_chars + response_chars) / 4) as u64;
        self.estimated_tokens += tokens;
        self.estimated_cost_usd =
            self.estimated_tokens as f64 / 1_000_000.0 * COST_PER_MILLION_TOKENS;
    }
}

/// Page extractor over an [`LlmService`], with retry and usage
/// accounting.
pub struct LlmExtractor<S: LlmService> {
    service: S,
    max_retries: u32,
    usage: LlmUsage,
}

impl<S: LlmService> LlmExtractor<S> {
    pub fn new(service: S, max_retries: u32) -> Self {
        Self {
            service,
            max_retries: max_retries.max(1),
            usage: LlmUsage::default(),
        }
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage
    }

    /// Extract one page through the service.
    ///
    /// Transport failures retry with linear backoff (one second times
    /// the attempt number). Exhausted retries yield an empty extraction
    /// carrying the last error, never an `Err`: the caller falls back
    /// to the deterministic result.
    pub async fn extract_page(
        &mut self,
        page_text: &str,
        page_number: u32,
        total_pages: Option<usize>,
    ) -> LlmExtraction {
        let prompt = build_extraction_prompt(page_text, page_number, total_pages);

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.service.generate(&prompt).await {
                Ok(response) => {
                    self.usage.record(prompt.len(), response.len());
                    let (records, errors) = parse_response(&response, page_text);
                    let confidence = records
                        .first()
                        .map(|r| r.extraction_confidence)
                        .unwrap_or(0.0);
                    info!(
                        page = page_number,
                        records = records.len(),
                        confidence,
                        "llm extraction complete"
                    );
                    return LlmExtraction {
                        records,
                        confidence,
                        errors,
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(page = page_number, attempt, error = %last_error, "llm call failed");
                    if attempt < self.max_retries {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            1000 * u64::from(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        LlmExtraction {
            records: Vec::new(),
            confidence: 0.0,
            errors: vec![crate::error::LlmError::RetriesExhausted {
                attempts: self.max_retries,
                last: last_error,
            }
            .to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::client::MockLlm;
    use super::*;
    use crate::error::LlmError;
    use pretty_assertions::assert_eq;

    const GOOD_PAYLOAD: &str = r#"{"procedures": [{"code": "03.01.01.004-8", "description": "CONSULTA DE PROFISSIONAIS", "complexity": "ATENÇÃO BÁSICA"}]}"#;

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let mock = MockLlm::new(vec![
            Err(LlmError::Transport("connection reset".to_string())),
            Ok(GOOD_PAYLOAD.to_string()),
        ]);
        let mut extractor = LlmExtractor::new(mock, 2);

        let extraction = extractor
            .extract_page("03.01.01.004-8 Procedimento: CONSULTA", 1, None)
            .await;
        assert_eq!(extraction.records.len(), 1);
        assert!(extraction.errors.is_empty());
        assert_eq!(extractor.usage().calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_empty_extraction() {
        let mock = MockLlm::new(vec![Err(LlmError::Transport("down".to_string()))]);
        let mut extractor = LlmExtractor::new(mock, 2);

        let extraction = extractor.extract_page("texto", 1, None).await;
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.confidence, 0.0);
        assert_eq!(extraction.errors.len(), 1);
        assert!(extraction.errors[0].contains("retries exhausted after 2 attempts"));
    }

    #[tokio::test]
    async fn test_usage_accounting() {
        let mock = MockLlm::with_response(GOOD_PAYLOAD);
        let mut extractor = LlmExtractor::new(mock, 1);
        extractor.extract_page("texto da página", 1, None).await;

        let usage = extractor.usage();
        assert_eq!(usage.calls, 1);
        assert!(usage.estimated_tokens > 0);
        assert!(usage.estimated_cost_usd > 0.0);
    }
}
