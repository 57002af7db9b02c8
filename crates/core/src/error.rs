//! Error types for WikiVoice.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, encyclopedia, prompt and
//! pipeline errors. Each variant carries a stable classification code so the
//! query-handling boundary can tell recoverable and fatal failures apart.

use thiserror::Error;

/// Message shown to users when a request cannot be answered at all.
pub const RETRY_MESSAGE: &str =
    "I'm sorry, I couldn't process your question right now. Please try again.";

/// Unified error type for WikiVoice.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, status, malformed payload)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Encyclopedia service errors
    #[error("Encyclopedia error: {0}")]
    Encyclopedia(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Rejected user input
    #[error("Invalid query: {0}")]
    Validation(String),

    /// Topic extraction failed; the pipeline recovers by using the raw utterance
    #[error("Topic extraction failed: {0}")]
    Extraction(String),

    /// The answer could not be generated
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// A remote call or the whole request ran past its deadline
    #[error("Remote timeout: {0}")]
    RemoteTimeout(String),

    /// The originating request went away
    #[error("Request cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable classification code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Io(_) => "io_error",
            AppError::Llm(_) => "llm_error",
            AppError::Encyclopedia(_) => "encyclopedia_error",
            AppError::Prompt(_) => "prompt_error",
            AppError::Validation(_) => "invalid_query",
            AppError::Extraction(_) => "extraction_failed_recovered",
            AppError::GenerationUnavailable(_) => "generation_unavailable",
            AppError::RemoteTimeout(_) => "remote_timeout",
            AppError::Cancelled => "cancelled",
            AppError::Serialization(_) => "serialization_error",
            AppError::Other(_) => "internal_error",
        }
    }

    /// Text that is safe to show to the person asking the question.
    ///
    /// Local setup problems (config, prompts, files, malformed input files)
    /// are shown as-is since retrying will not fix them. Remote failures get
    /// the generic retry text.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(reason) => reason.clone(),
            AppError::Cancelled => "The request was cancelled.".to_string(),
            AppError::Config(_)
            | AppError::Prompt(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => self.to_string(),
            AppError::Llm(_)
            | AppError::Encyclopedia(_)
            | AppError::Extraction(_)
            | AppError::GenerationUnavailable(_)
            | AppError::RemoteTimeout(_)
            | AppError::Other(_) => RETRY_MESSAGE.to_string(),
        }
    }

    /// Whether this error came from a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::RemoteTimeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
