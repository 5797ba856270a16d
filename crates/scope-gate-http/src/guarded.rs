// crates/scope-gate-http/src/guarded.rs
// ============================================================================
// Module: Guarded Handlers
// Description: Runs axum handler bodies under the enforcement guard.
// Purpose: Roll back and fail successful responses that skipped scoping.
// Dependencies: scope-gate-core, axum
// ============================================================================

//! ## Overview
//! [`run_guarded`] wraps a handler body in [`EnforcementGuard::run`]. A 2xx
//! response commits only when the request recorded its scope decision;
//! otherwise the transaction rolls back and the caller receives a 500
//! `PermissionCheckOmitted` response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::response::IntoResponse;
use axum::response::Response;
use scope_gate_core::EnforcementGuard;
use scope_gate_core::GuardedResponse;
use scope_gate_core::RequestContext;
use scope_gate_core::TransactionManager;

use crate::error::ApiError;

// ============================================================================
// SECTION: Responses
// ============================================================================

/// axum response checked by the enforcement guard.
#[derive(Debug)]
pub struct HttpResponse(pub Response);

impl GuardedResponse for HttpResponse {
    fn is_success(&self) -> bool {
        self.0.status().is_success()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        self.0
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs a handler body under the guard and renders the outcome.
pub fn run_guarded<M, H>(
    guard: &EnforcementGuard,
    ctx: &mut RequestContext,
    transactions: &M,
    handler: H,
) -> Response
where
    M: TransactionManager,
    H: FnOnce(&mut RequestContext) -> Result<Response, ApiError>,
{
    match guard.run(ctx, transactions, |ctx| handler(ctx).map(HttpResponse)) {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}
