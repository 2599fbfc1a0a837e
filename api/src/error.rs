use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use helpdesk_agent::pipeline::PipelineError;
use helpdesk_core::error::{self, ApiError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Session already escalated or closed (409)
    SessionClosed {
        session_id: String,
        cause: Option<String>,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::SessionClosed { session_id, cause } => {
                let message = match &cause {
                    Some(cause) => format!("Session '{session_id}' was escalated ({cause}) and is closed"),
                    None => format!("Session '{session_id}' is closed"),
                };
                (
                    StatusCode::CONFLICT,
                    ApiError {
                        error: error::codes::SESSION_CLOSED.to_string(),
                        message,
                        field: Some("session_id".to_string()),
                        received: Some(serde_json::Value::String(session_id)),
                        request_id,
                        docs_hint: Some(
                            "Start a new conversation by omitting session_id or using a new one."
                                .to_string(),
                        ),
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyQuery => AppError::Validation {
                message: "query must not be empty".to_string(),
                field: Some("query".to_string()),
                received: None,
                docs_hint: Some("Send the user's message as a non-empty 'query' string.".to_string()),
            },
            PipelineError::SessionClosed(closed) => AppError::SessionClosed {
                session_id: closed.session_id,
                cause: closed.cause.map(|c| c.as_str().to_string()),
            },
        }
    }
}
