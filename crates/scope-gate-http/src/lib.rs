// crates/scope-gate-http/src/lib.rs
// ============================================================================
// Module: Scope Gate HTTP Adapters
// Description: axum middleware, extractors, and error responses.
// Purpose: Wire the token gate and enforcement guard into axum services.
// Dependencies: scope-gate-core, axum
// ============================================================================

//! ## Overview
//! `scope-gate-http` adapts the Scope Gate core to axum. The token middleware
//! authenticates requests and stores the resulting [`RequestContext`] in the
//! request extensions; [`GateContext`] hands it to handlers; [`ApiError`]
//! turns engine errors into structured JSON responses; and [`run_guarded`]
//! runs a handler under the enforcement guard.
//!
//! [`RequestContext`]: scope_gate_core::RequestContext

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod error;
pub mod guarded;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthenticatedPrincipal;
pub use auth::CsrfExempt;
pub use auth::GateContext;
pub use auth::REQUEST_ID_HEADER;
pub use auth::TokenAuthState;
pub use auth::token_auth_middleware;
pub use error::ApiError;
pub use guarded::HttpResponse;
pub use guarded::run_guarded;
