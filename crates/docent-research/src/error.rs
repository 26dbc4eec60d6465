//! Error types for the research crate.

use thiserror::Error;

/// Result type alias using the research error type.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Error type for research operations.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] docent_llm::LlmError),

    /// The evaluator returned output that does not match the feedback schema.
    #[error("Malformed evaluator output: {0}")]
    Schema(#[from] SchemaError),

    /// State store misuse.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Research plan error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Search backend error.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResearchError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Structured feedback failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Not JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// JSON that does not fit the feedback shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Grade is fail but no follow-up queries were given.
    #[error("grade is fail but follow_up_queries is empty")]
    MissingFollowUps,

    /// Grade is pass but follow-up queries were given.
    #[error("grade is pass but {0} follow_up_queries were given")]
    UnexpectedFollowUps(usize),
}

/// State store misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A stage wrote a key it does not own.
    #[error("{writer} is not allowed to write '{key}'")]
    UnauthorizedWriter { key: String, writer: String },

    /// A stage read a key that has not been produced yet.
    #[error("'{0}' has not been written yet")]
    Missing(String),
}

/// Research plan errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// No goals could be parsed.
    #[error("plan contains no goals")]
    Empty,

    /// The plan was already approved and handed off.
    #[error("plan is frozen; research is already executing")]
    Frozen,
}

/// Search backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The request could not be sent or completed.
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    /// The response body could not be parsed.
    #[error("failed to parse {provider} response: {message}")]
    Parse { provider: String, message: String },

    /// Provider misconfigured (missing API key, etc.).
    #[error("search configuration error: {0}")]
    Config(String),
}
