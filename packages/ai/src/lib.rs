#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AI-written safety analysis for a perimeter risk assessment.
//!
//! Supports Google Gemini and `OpenAI`, plus any `OpenAI`-compatible
//! local/self-hosted server (Ollama, vLLM, llama.cpp, LM Studio) via the
//! `AI_BASE_URL` environment variable. The model is asked for a fixed
//! JSON shape which is validated before it reaches a caller, and results
//! are cached so repeated lookups of the same area don't pay for another
//! completion.

pub mod analysis;
pub mod providers;

use crime_risk_http::HttpError;
use thiserror::Error;

/// Errors that can occur during AI operations.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request to LLM provider failed.
    #[error(transparent)]
    Http(HttpError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The model's answer did not match the requested shape.
    #[error("Invalid AI response: {message}")]
    InvalidResponse {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

impl From<HttpError> for AiError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Status { status, body } => Self::Provider {
                message: format!("HTTP {status}: {}", crime_risk_http::error_message(&body)),
            },
            other => Self::Http(other),
        }
    }
}
