//! Error type returned by every handler.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use crime_risk_risk::RiskError;

/// Handler error, rendered as `{"error": "..."}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad input from the caller.
    #[error("{message}")]
    Validation {
        /// Shown to the caller.
        message: String,
    },

    /// Unknown route.
    #[error("{message}")]
    NotFound {
        /// Shown to the caller.
        message: String,
    },

    /// An optional collaborator is not configured on this deployment.
    #[error("{message}")]
    Unavailable {
        /// Shown to the caller.
        message: String,
    },

    /// A collaborator (database, model, routing service) failed.
    #[error("{message}")]
    Upstream {
        /// Shown to the caller.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Internal {
        /// Shown to the caller.
        message: String,
    },
}

impl ApiError {
    /// A validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Logs `source` and returns an upstream error that only carries
    /// `context`.
    pub fn upstream(context: &str, source: &dyn std::error::Error) -> Self {
        log::error!("{context}: {source}");
        Self::Upstream {
            message: context.to_string(),
        }
    }
}

impl From<RiskError> for ApiError {
    fn from(e: RiskError) -> Self {
        match e {
            RiskError::Validation { message } => Self::Validation { message },
            RiskError::Config { .. } => {
                log::error!("{e}");
                Self::Internal {
                    message: "Risk engine misconfigured".to_string(),
                }
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
