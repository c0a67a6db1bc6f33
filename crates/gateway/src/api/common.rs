// Common DTOs and error mapping for the HTTP API
//
// Every handler returns Result<_, ApiError>. The backend error kind decides
// the status code; the body is always `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sightline_core::{GatewayError, RpcError, RpcErrorKind};
use utoipa::ToSchema;

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Status code for a backend error kind
pub fn status_for_kind(kind: RpcErrorKind) -> StatusCode {
    match kind {
        RpcErrorKind::NotFound => StatusCode::NOT_FOUND,
        RpcErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        RpcErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        RpcErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        RpcErrorKind::AlreadyExists => StatusCode::CONFLICT,
        RpcErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        RpcErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        RpcErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        RpcErrorKind::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        RpcErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        RpcErrorKind::Internal | RpcErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by API handlers
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<RpcError> for ApiError {
    fn from(e: RpcError) -> Self {
        Self::new(status_for_kind(e.kind), e.message)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            GatewayError::Rpc(e) => e.into(),
            e @ GatewayError::QueryProbeAccepted { .. } => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "Request rejected");
        }
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}
