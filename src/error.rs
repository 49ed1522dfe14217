//! Error types for the agent router

use thiserror::Error;

/// Result type alias for routing and execution operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Step Failures
    // =============================

    #[error("Tool '{0}' not found in registry")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    Validation(String),

    // =============================
    // Planning / Routing
    // =============================

    #[error("Malformed plan: {0}")]
    PlanMalformed(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // =============================
    // Collaborators
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
