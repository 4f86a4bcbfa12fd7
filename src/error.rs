use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use crate::locale::{Locale, Text};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures talking to the hosted text-generation model.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to the model API failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model API responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model API did not start streaming within {0:?}")]
    Timeout(Duration),
}

/// Errors returned by `POST /api/ghost-chat` before any of the body is streamed.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Carries the already-localized message sent back to the caller.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("conversation generation failed: {source}")]
    Generation {
        #[source]
        source: GenerationError,
        locale: Locale,
    },
}

impl ApiError {
    pub fn validation(locale: Locale, key: Text) -> Self {
        ApiError::Validation(locale.text(key).to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Validation(message) => {
                warn!(%message, "Rejected ghost-chat request");
                message.clone()
            }
            ApiError::Generation { source, locale } => {
                error!(error = %source, "Conversation generation failed");
                locale.text(Text::GenerationFailed).to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Terminal failures of a conversation request on the consuming side.
///
/// A single malformed NDJSON line is not one of these; it is skipped.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("conversation did not finish within {0:?}")]
    Timeout(Duration),
    #[error("invalid input: {0}")]
    Validation(String),
}

impl ConsumerError {
    /// The message shown to the user; timeouts are reported apart from other transport failures.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            ConsumerError::Timeout(_) => locale.text(Text::Timeout).to_string(),
            ConsumerError::Status(408) | ConsumerError::Status(504) => {
                locale.text(Text::Timeout).to_string()
            }
            ConsumerError::Status(_) => locale.text(Text::GhostsDidNotAppear).to_string(),
            ConsumerError::Transport(_) => locale.text(Text::NetworkError).to_string(),
            ConsumerError::Validation(message) => message.clone(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ConsumerError::Timeout(_) | ConsumerError::Status(408) | ConsumerError::Status(504)
        )
    }
}

impl From<reqwest::Error> for ConsumerError {
    fn from(err: reqwest::Error) -> Self {
        ConsumerError::Transport(Box::new(err))
    }
}

impl From<std::io::Error> for ConsumerError {
    fn from(err: std::io::Error) -> Self {
        ConsumerError::Transport(Box::new(err))
    }
}
