// crates/scope-gate-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Scope Gate Evaluator
// Description: View, add, change, and delete scope decision procedures.
// Purpose: Combine per-scope results and record decisions on the request.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The evaluator resolves the principal's grants for an action and evaluates
//! every granted scope through the registry:
//! - view: predicates are ORed, queryable subsets are UNIONed into one
//!   membership test, and the result narrows the base query.
//! - add/change/delete: true when any grant holds; composite scopes require
//!   all members to hold.
//!
//! The OR across grants never short-circuits. Every grant is evaluated in
//! lexical order and the first error in that order is returned. A decision is
//! recorded on the [`RequestContext`] only when the action was allowed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::audit::AuditSink;
use crate::audit::FallbackAuditEvent;
use crate::audit::NoopAuditSink;
use crate::audit::ScopeAuditEvent;
use crate::audit::ScopeAuditEventParams;
use crate::core::Action;
use crate::core::Filter;
use crate::core::Query;
use crate::core::Record;
use crate::core::RecordKey;
use crate::core::RequestMethod;
use crate::core::ResourceType;
use crate::core::ScopeName;
use crate::core::Subset;
use crate::core::Values;
use crate::interfaces::GrantSource;
use crate::interfaces::StoreError;
use crate::interfaces::SubsetResolver;
use crate::runtime::context::RequestContext;
use crate::runtime::error::AuthzError;
use crate::runtime::error::ScopeFnError;
use crate::runtime::registry::DeleteHandler;
use crate::runtime::registry::ScopeContext;
use crate::runtime::registry::ScopeHandlers;
use crate::runtime::registry::ScopeRegistry;
use crate::runtime::registry::ScopeRule;
use crate::runtime::registry::ViewScope;
use crate::runtime::resolver::PermissionMap;
use crate::runtime::resolver::PermissionResolver;
use crate::runtime::resolver::ScopeGrants;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum nesting of composite scopes.
pub const MAX_COMPOSITION_DEPTH: usize = 16;

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Scope decision engine.
#[derive(Clone)]
pub struct ScopeEvaluator {
    /// Scope rules by resource type.
    registry: Arc<ScopeRegistry>,
    /// Grant resolver.
    resolver: PermissionResolver,
    /// Audit sink for decisions.
    audit: Arc<dyn AuditSink>,
    /// Materializes subsets referenced by write-time filters.
    subsets: Arc<dyn SubsetResolver + Send + Sync>,
}

impl ScopeEvaluator {
    /// Creates an evaluator with a no-op audit sink.
    #[must_use]
    pub fn new(registry: Arc<ScopeRegistry>, permissions: Arc<PermissionMap>) -> Self {
        let resolver = PermissionResolver::new(permissions, Arc::clone(&registry));
        Self {
            registry,
            resolver,
            audit: Arc::new(NoopAuditSink),
            subsets: Arc::new(LocalSubsets),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the grant source used by the resolver.
    #[must_use]
    pub fn with_grant_source(mut self, grants: Arc<dyn GrantSource>) -> Self {
        self.resolver = self.resolver.with_grant_source(grants);
        self
    }

    /// Installs the resolver used for subsets inside write-time filters.
    #[must_use]
    pub fn with_subset_resolver(mut self, subsets: Arc<dyn SubsetResolver + Send + Sync>) -> Self {
        self.subsets = subsets;
        self
    }

    /// Returns the scope registry.
    #[must_use]
    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Returns the permission resolver.
    #[must_use]
    pub const fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    // ------------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------------

    /// Narrows a base query to the records the principal may view.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Scoping`] when no scope is granted, and the first
    /// resolution or evaluation error otherwise.
    pub fn scope_view(&self, ctx: &mut RequestContext, base: Query) -> Result<Query, AuthzError> {
        let resource = base.resource().clone();
        let grants = match self.resolver.resolve_grants(ctx, &resource, Action::View) {
            Ok(grants) => grants,
            Err(err) => {
                self.audit_decision(ctx, &resource, Action::View, &ScopeGrants::default(), Some(&err));
                return Err(err);
            }
        };
        let outcome = self.view_filter(ctx, &resource, &grants);
        self.audit_decision(ctx, &resource, Action::View, &grants, outcome.as_ref().err());
        let filter = outcome?;
        ctx.record_decision(Action::View);
        Ok(base.filter(filter))
    }

    /// Scopes a history lookup for one record.
    ///
    /// Returns a single-row view query; history is served only when it yields
    /// the record.
    ///
    /// # Errors
    ///
    /// Same as [`ScopeEvaluator::scope_view`].
    pub fn scope_history(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        key: RecordKey,
    ) -> Result<Query, AuthzError> {
        self.scope_view(ctx, Query::new(resource.clone()).filter(Filter::key_eq(key)))
    }

    /// Combines every granted view scope into one filter.
    fn view_filter(
        &self,
        ctx: &RequestContext,
        resource: &ResourceType,
        grants: &ScopeGrants,
    ) -> Result<Filter, AuthzError> {
        let scope_ctx = ScopeContext::new(ctx, resource, Action::View);
        if grants.is_empty() {
            return Err(denied(&scope_ctx));
        }
        let mut predicates = Vec::new();
        let mut subsets = Vec::new();
        let mut first_error = None;
        for scope in grants.iter() {
            match self.view_scope(&scope_ctx, scope) {
                Ok(ViewScope::Filter(filter)) => predicates.push(filter),
                Ok(ViewScope::Subset(subset)) => subsets.push(subset),
                Ok(ViewScope::NoMatch) => {}
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        let mut combined = Filter::or(predicates);
        if !subsets.is_empty() {
            combined = Filter::or([combined, Filter::key_in(Subset::union(subsets))]);
        }
        Ok(combined)
    }

    /// Evaluates one view scope.
    fn view_scope(
        &self,
        scope_ctx: &ScopeContext<'_>,
        scope: &ScopeName,
    ) -> Result<ViewScope, AuthzError> {
        let resource = scope_ctx.resource;
        match self.registry.resolve(resource, scope, Action::View)? {
            ScopeRule::Static(filter) => Ok(ViewScope::Filter(filter)),
            ScopeRule::Dynamic(scope_fn) => scope_fn(scope_ctx)
                .map(|filter| filter.map_or(ViewScope::NoMatch, ViewScope::Filter))
                .map_err(|err| scope_failed(scope, resource, err)),
            ScopeRule::Handlers(handlers) => {
                let Some(view) = handlers.view else {
                    return Err(unknown_scope(scope, resource, Action::View));
                };
                view(scope_ctx).map_err(|err| scope_failed(scope, resource, err))
            }
            ScopeRule::Composite(_) => Err(AuthzError::CompositionUnsupported {
                scope: scope.clone(),
                resource: resource.clone(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Decides whether the principal may create the record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Scoping`] when no granted scope holds, and the
    /// first resolution or evaluation error otherwise.
    pub fn scope_add(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        record: &Record,
        values: &Values,
    ) -> Result<(), AuthzError> {
        self.scope_write(ctx, resource, Action::Add, record, values)
    }

    /// Decides whether the principal may modify the record.
    ///
    /// # Errors
    ///
    /// Same as [`ScopeEvaluator::scope_add`].
    pub fn scope_change(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        record: &Record,
        values: &Values,
    ) -> Result<(), AuthzError> {
        self.scope_write(ctx, resource, Action::Change, record, values)
    }

    /// Decides whether the principal may delete the record.
    ///
    /// # Errors
    ///
    /// Same as [`ScopeEvaluator::scope_add`].
    pub fn scope_delete(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        record: &Record,
        values: &Values,
    ) -> Result<(), AuthzError> {
        self.scope_write(ctx, resource, Action::Delete, record, values)
    }

    /// Decides a bulk change; every record must pass.
    ///
    /// An empty list records the permission check and a change decision.
    ///
    /// # Errors
    ///
    /// Returns the first record's error.
    pub fn scope_change_list(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        records: &[Record],
        values: &Values,
    ) -> Result<(), AuthzError> {
        if records.is_empty() {
            ctx.mark_permission_checked();
            ctx.record_decision(Action::Change);
            return Ok(());
        }
        for record in records {
            self.scope_change(ctx, resource, record, values)?;
        }
        Ok(())
    }

    /// Decides a save: add for new records, change otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`ScopeEvaluator::scope_add`].
    pub fn scope_store(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        record: &Record,
        values: &Values,
        is_new: bool,
    ) -> Result<(), AuthzError> {
        if is_new {
            self.scope_add(ctx, resource, record, values)
        } else {
            self.scope_change(ctx, resource, record, values)
        }
    }

    /// Decides a write to a file sub-resource of a record.
    ///
    /// Sub-resource writes only need change scope, so POST and DELETE
    /// requests get a delete marker up front to satisfy the guard.
    ///
    /// # Errors
    ///
    /// Same as [`ScopeEvaluator::scope_change`].
    pub fn scope_file_field(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        record: &Record,
        field: &str,
    ) -> Result<(), AuthzError> {
        if matches!(ctx.method(), RequestMethod::Post | RequestMethod::Delete) {
            ctx.record_decision(Action::Delete);
        }
        let mut values = Values::new();
        values.insert(field.to_string(), Value::Null);
        self.scope_change(ctx, resource, record, &values)
    }

    /// Shared add/change/delete procedure.
    fn scope_write(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        action: Action,
        record: &Record,
        values: &Values,
    ) -> Result<(), AuthzError> {
        let grants = match self.resolver.resolve_grants(ctx, resource, action) {
            Ok(grants) => grants,
            Err(err) => {
                self.audit_decision(ctx, resource, action, &ScopeGrants::default(), Some(&err));
                return Err(err);
            }
        };
        let outcome = self.write_decision(ctx, resource, action, &grants, record, values);
        self.audit_decision(ctx, resource, action, &grants, outcome.as_ref().err());
        outcome?;
        ctx.record_decision(action);
        Ok(())
    }

    /// Evaluates every grant; allowed when any holds.
    fn write_decision(
        &self,
        ctx: &RequestContext,
        resource: &ResourceType,
        action: Action,
        grants: &ScopeGrants,
        record: &Record,
        values: &Values,
    ) -> Result<(), AuthzError> {
        let scope_ctx = ScopeContext::new(ctx, resource, action);
        let mut allowed = false;
        let mut first_error = None;
        for scope in grants.iter() {
            match self.write_scope(&scope_ctx, scope, record, values, 0) {
                Ok(holds) => allowed |= holds,
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        if allowed { Ok(()) } else { Err(denied(&scope_ctx)) }
    }

    /// Evaluates one write scope, recursing into compositions.
    fn write_scope(
        &self,
        scope_ctx: &ScopeContext<'_>,
        scope: &ScopeName,
        record: &Record,
        values: &Values,
        depth: usize,
    ) -> Result<bool, AuthzError> {
        let resource = scope_ctx.resource;
        match self.registry.resolve(resource, scope, scope_ctx.action)? {
            ScopeRule::Static(filter) => self.filter_holds(scope_ctx, &filter, record, values),
            ScopeRule::Dynamic(scope_fn) => {
                match scope_fn(scope_ctx).map_err(|err| scope_failed(scope, resource, err))? {
                    Some(filter) => self.filter_holds(scope_ctx, &filter, record, values),
                    None => Ok(false),
                }
            }
            ScopeRule::Handlers(handlers) => {
                self.run_handler(scope_ctx, scope, &handlers, record, values)
            }
            ScopeRule::Composite(members) => {
                if depth >= MAX_COMPOSITION_DEPTH {
                    return Err(AuthzError::CompositionTooDeep {
                        scope: scope.clone(),
                        resource: resource.clone(),
                    });
                }
                for member in &members {
                    if !self.write_scope(scope_ctx, member, record, values, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Evaluates a predicate against the record (with proposed values for add).
    fn filter_holds(
        &self,
        scope_ctx: &ScopeContext<'_>,
        filter: &Filter,
        record: &Record,
        values: &Values,
    ) -> Result<bool, AuthzError> {
        let resolver: &dyn SubsetResolver = self.subsets.as_ref();
        if scope_ctx.action == Action::Add {
            let candidate = candidate_record(record, values);
            return Ok(filter.matches(&candidate, resolver)?);
        }
        Ok(filter.matches(record, resolver)?)
    }

    /// Runs the per-action handler of a handler-table scope.
    fn run_handler(
        &self,
        scope_ctx: &ScopeContext<'_>,
        scope: &ScopeName,
        handlers: &ScopeHandlers,
        record: &Record,
        values: &Values,
    ) -> Result<bool, AuthzError> {
        let resource = scope_ctx.resource;
        let action = scope_ctx.action;
        let failed = |err: ScopeFnError| scope_failed(scope, resource, err);
        let missing = || unknown_scope(scope, resource, action);
        match action {
            Action::Add => {
                let handler = handlers.add.as_ref().ok_or_else(missing)?;
                handler(scope_ctx, record, values).map_err(failed)
            }
            Action::Change => {
                let handler = handlers.change.as_ref().ok_or_else(missing)?;
                handler(scope_ctx, record, values).map_err(failed)
            }
            Action::Delete => match handlers.delete.as_ref().ok_or_else(missing)? {
                DeleteHandler::Object(handler) => handler(scope_ctx, record, values).map_err(failed),
                DeleteHandler::Subset(handler) => {
                    handler(scope_ctx, &single_row(resource, &record.key), values).map_err(failed)
                }
                DeleteHandler::Either {
                    object,
                    subset,
                } => match object(scope_ctx, record, values) {
                    Ok(holds) => Ok(holds),
                    Err(object_err) => {
                        let holds = subset(scope_ctx, &single_row(resource, &record.key), values)
                            .map_err(|_| failed(object_err.clone()))?;
                        self.audit.record_fallback(&FallbackAuditEvent::new(
                            scope_ctx.request_id.map(str::to_string),
                            resource.to_string(),
                            scope.to_string(),
                            object_err.to_string(),
                        ));
                        Ok(holds)
                    }
                },
            },
            Action::View => Err(missing()),
        }
    }

    /// Emits a scope decision audit event.
    fn audit_decision(
        &self,
        ctx: &RequestContext,
        resource: &ResourceType,
        action: Action,
        grants: &ScopeGrants,
        error: Option<&AuthzError>,
    ) {
        self.audit.record_scope(&ScopeAuditEvent::new(ScopeAuditEventParams {
            request_id: ctx.request_id().map(str::to_string),
            principal_id: ctx.principal().id.to_string(),
            resource: resource.to_string(),
            action,
            allowed: error.is_none(),
            scopes: grants.labels(),
            reason: error.map(ToString::to_string),
        }));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the denial for the scope context.
fn denied(scope_ctx: &ScopeContext<'_>) -> AuthzError {
    AuthzError::Scoping {
        principal: scope_ctx.principal.id.clone(),
        resource: scope_ctx.resource.clone(),
        action: scope_ctx.action,
    }
}

/// Builds an unknown-scope error.
fn unknown_scope(scope: &ScopeName, resource: &ResourceType, action: Action) -> AuthzError {
    AuthzError::UnknownScope {
        scope: scope.clone(),
        resource: resource.clone(),
        action,
    }
}

/// Wraps a scope function error.
fn scope_failed(scope: &ScopeName, resource: &ResourceType, err: ScopeFnError) -> AuthzError {
    AuthzError::ScopeFailed {
        scope: scope.clone(),
        resource: resource.clone(),
        message: err.0,
    }
}

/// Single-row subset over a record key.
fn single_row(resource: &ResourceType, key: &RecordKey) -> Subset {
    Subset::Query(Query::new(resource.clone()).filter(Filter::key_eq(key.clone())))
}

/// Record as it would look after applying the proposed values.
fn candidate_record(record: &Record, values: &Values) -> Record {
    let mut candidate = record.clone();
    for (name, value) in values {
        candidate.fields.insert(name.clone(), value.clone());
    }
    candidate
}

/// Subset resolver that only understands explicit key sets.
struct LocalSubsets;

impl SubsetResolver for LocalSubsets {
    fn resolve_subset(&self, subset: &Subset) -> Result<BTreeSet<RecordKey>, StoreError> {
        subset.local_keys().ok_or_else(|| {
            StoreError::Invalid("query subsets require a record source".to_string())
        })
    }
}
