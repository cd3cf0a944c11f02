//! Error types for the sigtap-core library.

use thiserror::Error;

/// Main error type for the sigtap library.
#[derive(Error, Debug)]
pub enum SigtapError {
    /// Page layout error.
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// LLM service error.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// The page source collaborator failed. This is the only condition
    /// fatal to a whole document run.
    #[error("document source error: {0}")]
    Document(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to page layout reconstruction.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The page supplied no text fragments at all.
    #[error("page {0} has no text fragments")]
    EmptyPage(u32),

    /// A fragment carried coordinates that cannot be indexed.
    #[error("invalid fragment coordinates: ({x}, {y})")]
    InvalidCoordinates { x: f32, y: f32 },
}

/// Errors related to the LLM extraction service.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The service is not configured (missing credential or disabled).
    #[error("llm service not configured")]
    NotConfigured,

    /// Transport failure talking to the service.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Non-success HTTP status from the service.
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON payload.
    #[error("response parsing failed: {0}")]
    ResponseParse(String),

    /// All retry attempts were exhausted.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Result type for the sigtap library.
pub type Result<T> = std::result::Result<T, SigtapError>;
