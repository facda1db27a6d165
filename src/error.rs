//! Error types for the voice task assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

/// Infrastructure failures.
///
/// Domain outcomes (not found, invalid task id, validation) are never
/// errors: callable functions report those as text in a `ToolOutput`.
#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Core Errors
    // =============================

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Function not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid function arguments: {0}")]
    InvalidToolInput(String),

    #[error("Session error: {0}")]
    SessionError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
