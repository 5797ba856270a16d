// crates/scope-gate-core/src/runtime/guard.rs
// ============================================================================
// Module: Scope Gate Enforcement Guard
// Description: Request wrapper that enforces a recorded scope decision.
// Purpose: Fail requests whose handler never ran the required scope check.
// Dependencies: crate::{audit, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`EnforcementGuard::run`] wraps a handler in a transaction. When the handler
//! succeeds, the decision log must cover the action implied by the request
//! method or the transaction is rolled back and the request fails with
//! [`AuthzError::PermissionCheckOmitted`].
//!
//! Nested runs (sub-resource dispatch) share the outer transaction and skip
//! the check, so it runs exactly once per top-level request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::audit::EnforcementAuditEvent;
use crate::audit::NoopAuditSink;
use crate::core::Action;
use crate::interfaces::Transaction;
use crate::interfaces::TransactionManager;
use crate::runtime::context::RequestContext;
use crate::runtime::error::AuthzError;

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Handler result that knows whether it is a success response.
pub trait GuardedResponse {
    /// Returns true for 2xx-class responses.
    fn is_success(&self) -> bool;
}

impl GuardedResponse for u16 {
    fn is_success(&self) -> bool {
        (200 .. 300).contains(self)
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Enforces the per-request scope decision invariant.
#[derive(Clone)]
pub struct EnforcementGuard {
    /// Audit sink for violations.
    audit: Arc<dyn AuditSink>,
}

impl Default for EnforcementGuard {
    fn default() -> Self {
        Self::new(Arc::new(NoopAuditSink))
    }
}

impl EnforcementGuard {
    /// Creates a guard that reports violations to the sink.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
        }
    }

    /// Runs a handler inside a transaction and enforces the decision log.
    ///
    /// - Handler error: roll back and propagate.
    /// - Non-success response: commit and return it unchecked.
    /// - Success without the required decision: roll back and fail.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, a converted [`AuthzError::Store`] when the
    /// transaction fails, or [`AuthzError::PermissionCheckOmitted`].
    pub fn run<M, R, E, H>(
        &self,
        ctx: &mut RequestContext,
        transactions: &M,
        handler: H,
    ) -> Result<R, E>
    where
        M: TransactionManager,
        R: GuardedResponse,
        E: From<AuthzError>,
        H: FnOnce(&mut RequestContext) -> Result<R, E>,
    {
        let depth = ctx.depth();
        if depth > 0 {
            ctx.set_depth(depth + 1);
            let outcome = handler(ctx);
            ctx.set_depth(depth);
            return outcome;
        }

        ctx.reset_enforcement();
        let transaction = transactions.begin().map_err(|err| E::from(AuthzError::Store(err)))?;
        ctx.set_depth(1);
        let outcome = handler(ctx);
        ctx.set_depth(0);

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                self.rollback(ctx, transaction, "handler error");
                return Err(err);
            }
        };
        if !response.is_success() {
            transaction.commit().map_err(|err| E::from(AuthzError::Store(err)))?;
            return Ok(response);
        }
        if let Err(violation) = Self::check(ctx) {
            self.audit.record_enforcement(&EnforcementAuditEvent::new(
                ctx.request_id().map(str::to_string),
                ctx.method().to_string(),
                violation.to_string(),
            ));
            self.rollback(ctx, transaction, &violation.to_string());
            return Err(E::from(violation));
        }
        transaction.commit().map_err(|err| E::from(AuthzError::Store(err)))?;
        Ok(response)
    }

    /// Rolls back a transaction, auditing a failed rollback.
    fn rollback<T: Transaction>(&self, ctx: &RequestContext, transaction: T, cause: &str) {
        if let Err(err) = transaction.rollback() {
            self.audit.record_enforcement(&EnforcementAuditEvent::new(
                ctx.request_id().map(str::to_string),
                ctx.method().to_string(),
                format!("rollback failed after {cause}: {err}"),
            ));
        }
    }

    /// Checks that the decision log covers the request method.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::PermissionCheckOmitted`] describing the missing
    /// decision.
    pub fn check(ctx: &RequestContext) -> Result<(), AuthzError> {
        let method = ctx.method();
        let omitted = |reason: &str| AuthzError::PermissionCheckOmitted {
            method,
            reason: reason.to_string(),
        };
        if !ctx.permission_checked() {
            return Err(omitted("no permission check was performed"));
        }
        let decisions = ctx.decisions();
        let covered = match method.implied_action() {
            Action::View => decisions.contains(Action::View),
            Action::Delete => decisions.contains(Action::Delete),
            Action::Add | Action::Change => {
                [Action::Add, Action::Change, Action::Delete]
                    .into_iter()
                    .any(|action| decisions.contains(action))
            }
        };
        if covered {
            return Ok(());
        }
        Err(omitted(match method.implied_action() {
            Action::View => "view scope was not checked",
            Action::Delete => "delete scope was not checked",
            Action::Add | Action::Change => "no add, change or delete scope was checked",
        }))
    }
}
