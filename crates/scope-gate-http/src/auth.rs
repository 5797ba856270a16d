// crates/scope-gate-http/src/auth.rs
// ============================================================================
// Module: Token Authentication Middleware
// Description: axum middleware and extractor for the token gate.
// Purpose: Bind a principal to each request before handlers run.
// Dependencies: scope-gate-core, axum
// ============================================================================

//! ## Overview
//! [`token_auth_middleware`] reads the configured header, runs the token gate,
//! and stores the resulting [`RequestContext`] in the request extensions. An
//! upstream [`AuthenticatedPrincipal`] extension (session authentication)
//! bypasses the token lookup. Failures short-circuit with the gate's
//! structured JSON body and status code.
//!
//! Security posture: header values are untrusted; non-ASCII values and
//! oversized headers are treated as carrying no token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use scope_gate_core::AuthState;
use scope_gate_core::Principal;
use scope_gate_core::RequestContext;
use scope_gate_core::RequestMethod;
use scope_gate_core::TokenAuthenticator;

use crate::error::ApiError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the caller-supplied request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Request identifiers longer than this are ignored.
const MAX_REQUEST_ID_LENGTH: usize = 128;

// ============================================================================
// SECTION: Extensions
// ============================================================================

/// Principal bound to the request, by session or token authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub Principal);

/// Marker: the request authenticated by token and may skip anti-forgery checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfExempt;

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Shared state for [`token_auth_middleware`].
#[derive(Clone)]
pub struct TokenAuthState {
    /// Token gate.
    gate: Arc<TokenAuthenticator>,
    /// Header read for the token.
    header: HeaderName,
}

impl TokenAuthState {
    /// Creates middleware state reading the `Authorization` header.
    #[must_use]
    pub fn new(gate: TokenAuthenticator) -> Self {
        Self {
            gate: Arc::new(gate),
            header: AUTHORIZATION,
        }
    }

    /// Reads the token from another header.
    #[must_use]
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Returns the header read for the token.
    #[must_use]
    pub const fn header(&self) -> &HeaderName {
        &self.header
    }
}

/// Authenticates the request and stores its [`RequestContext`].
///
/// On success with a token, inserts [`AuthenticatedPrincipal`] and
/// [`CsrfExempt`]. Unsupported methods are answered with 405.
pub async fn token_auth_middleware(
    State(state): State<TokenAuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let upstream = request.extensions().get::<AuthenticatedPrincipal>().cloned();
    let mut ctx = match new_context(request.method(), request.headers(), upstream.as_ref()) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let header = request.headers().get(&state.header).and_then(|value| value.to_str().ok());
    match state.gate.authenticate(&mut ctx, header) {
        Ok(AuthState::Authenticated) => {
            if upstream.is_none() {
                request.extensions_mut().insert(AuthenticatedPrincipal(ctx.principal().clone()));
            }
            if ctx.csrf_exempt() {
                request.extensions_mut().insert(CsrfExempt);
            }
        }
        Ok(AuthState::Unauthenticated | AuthState::Resolving) => {}
        Err(err) => return ApiError::from(err).into_response(),
    }
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

// ============================================================================
// SECTION: Extractor
// ============================================================================

/// Request context handed to handlers.
///
/// Uses the context stored by [`token_auth_middleware`] when present;
/// otherwise builds one from the upstream principal, if any.
#[derive(Debug, Clone)]
pub struct GateContext(pub RequestContext);

impl<S> FromRequestParts<S> for GateContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(Self(ctx.clone()));
        }
        let upstream = parts.extensions.get::<AuthenticatedPrincipal>();
        new_context(&parts.method, &parts.headers, upstream).map(Self)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a fresh context for a request.
fn new_context(
    method: &Method,
    headers: &HeaderMap,
    upstream: Option<&AuthenticatedPrincipal>,
) -> Result<RequestContext, Response> {
    let Some(method) = RequestMethod::parse(method.as_str()) else {
        return Err(StatusCode::METHOD_NOT_ALLOWED.into_response());
    };
    let ctx = match upstream {
        Some(AuthenticatedPrincipal(principal)) => {
            RequestContext::for_principal(method, principal.clone())
        }
        None => RequestContext::new(method),
    };
    Ok(match request_id(headers) {
        Some(id) => ctx.with_request_id(id),
        None => ctx,
    })
}

/// Returns the request identifier header when it is short visible ASCII.
fn request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?;
    if value.is_empty() || value.len() > MAX_REQUEST_ID_LENGTH {
        return None;
    }
    Some(value.to_string())
}
