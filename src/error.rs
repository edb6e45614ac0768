use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No input provided")]
    BadRequest,

    #[error("{reason}")]
    Validation {
        reason: String,
        query: String,
        suggestions: Vec<String>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("API configuration error: {0}")]
    ApiConfig(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Llm(format!("LLM API call failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
