//! Error kinds shared across the HTTP and MCP facades.
//!
//! Mirrors the shape of `agent_api_types::ApiError` in the Substrate
//! workspace: a small closed enum mapped to HTTP status codes at the edge,
//! never leaking internal detail (stack traces) into response bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("{0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("path escapes sandbox root: {0}")]
    PathEscape(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn path_escape(msg: impl Into<String>) -> Self {
        Self::PathEscape(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status for this error on a write path. A path escape here is a
    /// caller mistake worth reporting plainly, so it maps to 400.
    pub fn status(&self) -> StatusCode {
        match self {
            SandboxError::Validation(_) => StatusCode::BAD_REQUEST,
            SandboxError::NotFound(_) => StatusCode::NOT_FOUND,
            SandboxError::PathEscape(_) => StatusCode::BAD_REQUEST,
            SandboxError::Conflict(_) => StatusCode::CONFLICT,
            SandboxError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP status for this error on a read path. A path escape reported as
    /// 404 rather than 400 here so a prober can't distinguish "exists outside
    /// the sandbox" from "doesn't exist at all".
    pub fn status_for_read(&self) -> StatusCode {
        match self {
            SandboxError::PathEscape(_) => StatusCode::NOT_FOUND,
            other => other.status(),
        }
    }

    /// `true` if this is a `Conflict` carrying the non-empty-directory code,
    /// used by the `/fs/{path}` DELETE handler to attach `code:"DIRECTORY_NOT_EMPTY"`.
    pub fn is_directory_not_empty(&self) -> bool {
        matches!(self, SandboxError::Conflict(msg) if msg.contains("DIR_NOT_EMPTY"))
    }

    fn body(&self) -> serde_json::Value {
        let code = match self {
            SandboxError::PathEscape(_) => Some("PATH_ESCAPE"),
            _ if self.is_directory_not_empty() => Some("DIRECTORY_NOT_EMPTY"),
            _ => None,
        };
        json!({
            "error": self.to_string(),
            "code": code,
        })
    }

    /// Response for a read-path handler (`GET`/`HEAD`), using
    /// [`SandboxError::status_for_read`] instead of the write-path default.
    pub fn into_read_response(self) -> Response {
        let status = if self.is_directory_not_empty() {
            StatusCode::CONFLICT
        } else {
            self.status_for_read()
        };
        (status, axum::Json(self.body())).into_response()
    }
}

impl IntoResponse for SandboxError {
    fn into_response(self) -> Response {
        let status = if self.is_directory_not_empty() {
            StatusCode::CONFLICT
        } else {
            self.status()
        };
        (status, axum::Json(self.body())).into_response()
    }
}
