use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use wardgate_face::EncodeError;
use wardgate_store::{CodeError, MediaError, StoreError};

use crate::engine::EngineError;

/// Every way a request can fail.
///
/// The `Display` text is for logs only; clients see [`ApiError::public_message`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation: {0}")]
    Validation(String),
    /// The request body could not be read as the expected format.
    #[error("rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("record store: {0}")]
    Storage(#[from] StoreError),
    #[error("media: {0}")]
    Media(#[from] MediaError),
    #[error("face engine: {0}")]
    Engine(#[from] EngineError),
    #[error("face engine not loaded")]
    EngineUnavailable,
    #[error("background task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<CodeError> for ApiError {
    fn from(err: CodeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap an extractor rejection, keeping the status axum chose for it.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Rejected { status, message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Rejected { status, .. } => *status,
            Self::Storage(_) | Self::Media(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine(EngineError::ChannelClosed) | Self::EngineUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Engine(EngineError::LiveImage(EncodeError::Image(_))) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Rejected { message, .. } => message.clone(),
            Self::Storage(_) => "Could not save the record".into(),
            Self::Media(_) => "Could not store the image".into(),
            Self::Engine(EngineError::ChannelClosed) | Self::EngineUnavailable => {
                "Face recognition is unavailable".into()
            }
            Self::Engine(EngineError::LiveImage(EncodeError::Image(_))) => "Unreadable image".into(),
            Self::Engine(_) => "Face recognition failed".into(),
            Self::Task(_) => "Internal error".into(),
        }
    }

    /// Log at a level matching who is at fault.
    pub fn log(&self) {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, "request rejected");
        }
    }
}

/// JSON failure body: `{"success": false, "error": "..."}`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = json!({ "success": false, "error": self.public_message() });
        (self.status(), Json(body)).into_response()
    }
}

/// Plain-text failure body: `Error: ...`.
#[derive(Debug)]
pub struct TextError(pub ApiError);

impl From<ApiError> for TextError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for TextError {
    fn into_response(self) -> Response {
        self.0.log();
        (self.0.status(), format!("Error: {}", self.0.public_message())).into_response()
    }
}
