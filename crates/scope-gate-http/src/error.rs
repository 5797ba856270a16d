// crates/scope-gate-http/src/error.rs
// ============================================================================
// Module: HTTP Error Responses
// Description: Maps engine and authentication errors to HTTP responses.
// Purpose: Keep denials user-facing and configuration defects opaque.
// Dependencies: scope-gate-core, axum, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Authorization denials become 403 responses that name the failure.
//! Configuration errors and defects (unknown scopes, omitted permission
//! checks, storage failures) become 500 responses with a stable code and a
//! generic message. Token gate failures keep the gate's own status and body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use scope_gate_core::AuthzError;
use scope_gate_core::AuthzErrorKind;
use scope_gate_core::TokenAuthError;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned from guarded HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authorization engine error.
    #[error(transparent)]
    Authz(#[from] AuthzError),
    /// Token authentication error.
    #[error(transparent)]
    TokenAuth(#[from] TokenAuthError),
}

impl ApiError {
    /// Returns the HTTP status for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authz(err) => match err.kind() {
                AuthzErrorKind::Denied => StatusCode::FORBIDDEN,
                AuthzErrorKind::Configuration | AuthzErrorKind::Defect => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::TokenAuth(err) => StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Returns the structured JSON body for the error.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Authz(err) => match err.kind() {
                AuthzErrorKind::Denied => json!({
                    "code": err.code(),
                    "message": err.to_string(),
                }),
                AuthzErrorKind::Configuration | AuthzErrorKind::Defect => json!({
                    "code": err.code(),
                    "message": "Internal server error.",
                }),
            },
            Self::TokenAuth(err) => err.body(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
