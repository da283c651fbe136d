use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::session::runner::CommandError;
use crate::session::SessionError;

/// Success envelope shared by every session route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Handler error. Operational errors are shown to the caller as is;
/// anything else is logged and replaced by a generic message.
#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    fn operational(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            is_operational: true,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// The session is in a phase that does not accept the command.
    pub fn invalid_phase(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "INVALID_PHASE", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, "SESSION_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            is_operational: false,
            ..Self::operational(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            tracing::warn!(status = %self.status, code = self.code, error = %self.message, "Session command rejected");
            self.message
        } else {
            tracing::error!(status = %self.status, code = self.code, error = %self.message, "Session command failed");
            "Internal server error".to_string()
        };
        (self.status, Json(ErrorBody::new(self.code, message))).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidTransition { .. } => AppError::invalid_phase(err.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Closed => AppError::unavailable("session runner has stopped"),
            CommandError::Session(e) => e.into(),
        }
    }
}

fn envelope<T: Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse { success: true, data }))
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    envelope(StatusCode::OK, data)
}

/// The command was queued for the session runner.
pub fn accepted<T: Serialize>(data: T) -> impl IntoResponse {
    envelope(StatusCode::ACCEPTED, data)
}
