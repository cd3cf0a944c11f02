//! Core library for SIGTAP procedure table extraction.
//!
//! This crate provides:
//! - Page layout reconstruction from positioned text fragments
//! - Deterministic category extractors for procedure blocks
//! - LLM fallback extraction with strict response validation
//! - Confidence-driven hybrid merge of both sources
//! - Batched whole-document processing

pub mod error;
pub mod models;
pub mod layout;
pub mod extract;
pub mod llm;
pub mod hybrid;
pub mod processor;

pub use error::{Result, SigtapError};
pub use models::{
    Complexity, ExtractionMethod, ProcedureRecord, SigtapConfig,
};
pub use layout::{PageLayout, PositionalIndex, TextFragment};
pub use extract::{extract_page, PageExtraction, StatsSheet};
pub use llm::{GeminiClient, LlmExtractor, LlmService, LlmUsage};
pub use hybrid::{HybridEngine, HybridPageResult, MergeStrategy, StrategyCounts};
pub use processor::{
    CancellationToken, DocumentProcessor, PageSource, ProcessingResult, ProcessingSummary,
    Progress,
};
