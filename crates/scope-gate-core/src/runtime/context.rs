// crates/scope-gate-core/src/runtime/context.rs
// ============================================================================
// Module: Scope Gate Request Context
// Description: Explicit per-request authorization state.
// Purpose: Thread the principal, decision log, and grant cache through a request.
// Dependencies: crate::core, crate::runtime::resolver
// ============================================================================

//! ## Overview
//! A [`RequestContext`] is created for each request and owned by it. It is
//! never stored in process-wide state. The evaluator appends to its
//! [`ScopeDecisionLog`]; the enforcement guard reads it once the handler is
//! done.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Action;
use crate::core::Principal;
use crate::core::RequestMethod;
use crate::runtime::resolver::HeldPermissions;

// ============================================================================
// SECTION: Decision Log
// ============================================================================

/// Append-only record of the action categories a scope decision ran for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDecisionLog {
    /// Recorded actions in decision order.
    actions: Vec<Action>,
}

impl ScopeDecisionLog {
    /// Returns true when a decision was recorded for the action.
    #[must_use]
    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Returns true when no decision has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns recorded actions in decision order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Appends a decision.
    pub(crate) fn record(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Clears the log at the start of a top-level request.
    pub(crate) fn reset(&mut self) {
        self.actions.clear();
    }
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request authorization state.
///
/// # Invariants
/// - The principal is fixed once bound by authentication.
/// - The decision log only grows during a top-level request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Principal the request is evaluated for; anonymous until authenticated.
    principal: Principal,
    /// Whether a principal has been bound.
    authenticated: bool,
    /// Request method.
    method: RequestMethod,
    /// Request identifier when provided.
    request_id: Option<String>,
    /// Scope decisions made so far.
    decisions: ScopeDecisionLog,
    /// Whether a permission lookup ran.
    permission_checked: bool,
    /// Parsed permission map for the principal, filled on first use.
    held: Option<HeldPermissions>,
    /// Whether anti-forgery checks may be skipped.
    csrf_exempt: bool,
    /// Guard nesting depth.
    depth: u32,
}

impl RequestContext {
    /// Creates an anonymous context for a request.
    #[must_use]
    pub fn new(method: RequestMethod) -> Self {
        Self {
            principal: Principal::anonymous(),
            authenticated: false,
            method,
            request_id: None,
            decisions: ScopeDecisionLog::default(),
            permission_checked: false,
            held: None,
            csrf_exempt: false,
            depth: 0,
        }
    }

    /// Creates a context already bound to a principal (upstream session).
    #[must_use]
    pub fn for_principal(method: RequestMethod, principal: Principal) -> Self {
        let mut ctx = Self::new(method);
        ctx.authenticate(principal);
        ctx
    }

    /// Attaches a request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the principal (anonymous when unauthenticated).
    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns true when a principal has been bound.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Binds the authenticated principal and drops any cached grants.
    pub fn authenticate(&mut self, principal: Principal) {
        self.principal = principal;
        self.authenticated = true;
        self.held = None;
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> RequestMethod {
        self.method
    }

    /// Returns the request identifier.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the scope decision log.
    #[must_use]
    pub const fn decisions(&self) -> &ScopeDecisionLog {
        &self.decisions
    }

    /// Returns true when a permission lookup ran.
    #[must_use]
    pub const fn permission_checked(&self) -> bool {
        self.permission_checked
    }

    /// Returns true when anti-forgery checks may be skipped.
    #[must_use]
    pub const fn csrf_exempt(&self) -> bool {
        self.csrf_exempt
    }

    /// Marks a handler that needs no scoping.
    ///
    /// Records the decision implied by the request method so the guard
    /// accepts the request.
    pub fn mark_unscoped(&mut self) {
        self.permission_checked = true;
        self.decisions.record(self.method.implied_action());
    }

    /// Records a decision for an action.
    pub(crate) fn record_decision(&mut self, action: Action) {
        self.decisions.record(action);
    }

    /// Marks that a permission lookup ran.
    pub(crate) const fn mark_permission_checked(&mut self) {
        self.permission_checked = true;
    }

    /// Marks the request as exempt from anti-forgery checks.
    pub(crate) const fn mark_csrf_exempt(&mut self) {
        self.csrf_exempt = true;
    }

    /// Returns the cached permission map.
    pub(crate) const fn held_permissions(&self) -> Option<&HeldPermissions> {
        self.held.as_ref()
    }

    /// Caches the parsed permission map.
    pub(crate) fn cache_held_permissions(&mut self, held: HeldPermissions) {
        self.held = Some(held);
    }

    /// Returns the guard nesting depth.
    pub(crate) const fn depth(&self) -> u32 {
        self.depth
    }

    /// Sets the guard nesting depth.
    pub(crate) const fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }

    /// Clears enforcement state at the start of a top-level request.
    pub(crate) fn reset_enforcement(&mut self) {
        self.permission_checked = false;
        self.decisions.reset();
    }
}
