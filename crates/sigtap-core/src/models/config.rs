//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the sigtap pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigtapConfig {
    /// Document processing configuration.
    pub processing: ProcessingConfig,

    /// Hybrid extraction strategy configuration.
    pub hybrid: HybridConfig,

    /// LLM service configuration.
    pub llm: LlmConfig,
}

/// Document processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Pages per batch for normal documents.
    pub batch_size: usize,

    /// Pages per batch once a document exceeds `large_document_pages`.
    pub large_batch_size: usize,

    /// Page count above which the larger batch size applies.
    pub large_document_pages: usize,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            large_batch_size: 20,
            large_document_pages: 1000,
            max_pages: 0,
        }
    }
}

/// Hybrid extraction strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Page confidence below which the LLM fallback is consulted.
    pub confidence_threshold: f32,

    /// Minimum records per page; fewer triggers the LLM fallback.
    pub min_procedures: usize,

    /// Retry attempts for each LLM call.
    pub max_retries: u32,

    /// LLM call budget per batch; 0 disables the fallback entirely.
    pub max_llm_pages_per_batch: usize,

    /// Pause before each LLM call, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 75.0,
            min_procedures: 1,
            max_retries: 2,
            max_llm_pages_per_batch: 10,
            cooldown_ms: 500,
        }
    }
}

/// LLM service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. Empty means the service is not configured.
    pub api_key: String,

    /// Model identifier.
    pub model: String,

    /// Service base URL.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Sampling temperature. Kept low for extraction.
    pub temperature: f32,

    /// Maximum output tokens per call.
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            temperature: 0.1,
            max_output_tokens: 8192,
        }
    }
}

impl SigtapConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Effective batch size for a document of `total_pages`.
    pub fn batch_size_for(&self, total_pages: usize) -> usize {
        if total_pages > self.processing.large_document_pages {
            self.processing.large_batch_size
        } else {
            self.processing.batch_size
        }
    }

    /// True when an LLM credential is present.
    pub fn llm_configured(&self) -> bool {
        !self.llm.api_key.is_empty()
    }

    /// Check values against their working ranges.
    ///
    /// Returns one human-readable issue per problem; an empty list
    /// means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(0.0..=100.0).contains(&self.hybrid.confidence_threshold) {
            issues.push(format!(
                "hybrid.confidence_threshold must be between 0 and 100, got {}",
                self.hybrid.confidence_threshold
            ));
        }
        if self.hybrid.max_retries == 0 {
            issues.push("hybrid.max_retries must be at least 1".to_string());
        }
        if self.processing.batch_size == 0 {
            issues.push("processing.batch_size must be at least 1".to_string());
        }
        if self.processing.large_batch_size == 0 {
            issues.push("processing.large_batch_size must be at least 1".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            issues.push(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.timeout_secs == 0 {
            issues.push("llm.timeout_secs must be at least 1".to_string());
        }

        issues
    }
}
