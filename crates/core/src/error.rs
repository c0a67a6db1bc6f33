// Error types for the gateway core
//
// RpcError is what the backend collaborator fails with. GatewayError is what
// the request-handling components return; it keeps the RPC error kind intact
// so the HTTP layer can map it to a status code.

use std::fmt;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Classification of a failed backend call.
///
/// Mirrors the gRPC status codes the orchestration frontend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    NotFound,
    InvalidArgument,
    PermissionDenied,
    Unauthenticated,
    AlreadyExists,
    FailedPrecondition,
    ResourceExhausted,
    DeadlineExceeded,
    Unimplemented,
    Unavailable,
    Internal,
    Unknown,
}

impl RpcErrorKind {
    /// Map a numeric gRPC status code.
    pub fn from_grpc_code(code: i64) -> Self {
        match code {
            3 => RpcErrorKind::InvalidArgument,
            4 => RpcErrorKind::DeadlineExceeded,
            5 => RpcErrorKind::NotFound,
            6 => RpcErrorKind::AlreadyExists,
            7 => RpcErrorKind::PermissionDenied,
            8 => RpcErrorKind::ResourceExhausted,
            9 => RpcErrorKind::FailedPrecondition,
            12 => RpcErrorKind::Unimplemented,
            13 => RpcErrorKind::Internal,
            14 => RpcErrorKind::Unavailable,
            16 => RpcErrorKind::Unauthenticated,
            _ => RpcErrorKind::Unknown,
        }
    }

    /// Map an HTTP status code, for backends that only report the status line.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => RpcErrorKind::InvalidArgument,
            401 => RpcErrorKind::Unauthenticated,
            403 => RpcErrorKind::PermissionDenied,
            404 => RpcErrorKind::NotFound,
            409 => RpcErrorKind::AlreadyExists,
            412 => RpcErrorKind::FailedPrecondition,
            429 => RpcErrorKind::ResourceExhausted,
            501 => RpcErrorKind::Unimplemented,
            503 => RpcErrorKind::Unavailable,
            504 => RpcErrorKind::DeadlineExceeded,
            500..=599 => RpcErrorKind::Internal,
            _ => RpcErrorKind::Unknown,
        }
    }
}

impl fmt::Display for RpcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RpcErrorKind::NotFound => "NotFound",
            RpcErrorKind::InvalidArgument => "InvalidArgument",
            RpcErrorKind::PermissionDenied => "PermissionDenied",
            RpcErrorKind::Unauthenticated => "Unauthenticated",
            RpcErrorKind::AlreadyExists => "AlreadyExists",
            RpcErrorKind::FailedPrecondition => "FailedPrecondition",
            RpcErrorKind::ResourceExhausted => "ResourceExhausted",
            RpcErrorKind::DeadlineExceeded => "DeadlineExceeded",
            RpcErrorKind::Unimplemented => "Unimplemented",
            RpcErrorKind::Unavailable => "Unavailable",
            RpcErrorKind::Internal => "Internal",
            RpcErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A failed call to the orchestration backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RpcError {
    pub kind: RpcErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::Unavailable, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RpcErrorKind::NotFound
    }
}

/// Errors returned by the request-handling components
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller input rejected before any backend call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend call failed; the kind is preserved unchanged
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The query-type probe was answered instead of rejected
    #[error("Query probe '{query_type}' was accepted by the backend; supported query types cannot be listed")]
    QueryProbeAccepted { query_type: String },
}

impl GatewayError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    /// The backend error kind, if this error came from the backend
    pub fn rpc_kind(&self) -> Option<RpcErrorKind> {
        match self {
            GatewayError::Rpc(e) => Some(e.kind),
            _ => None,
        }
    }
}
