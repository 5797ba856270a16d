// crates/scope-gate-core/tests/resolver.rs
// ============================================================================
// Module: Permission Resolver Tests
// Description: Tests for permission-map parsing and grant resolution.
// ============================================================================
//! ## Overview
//! Validates superuser short-circuiting, the implicit `default` permission,
//! `perms_via` redirection, and fail-closed handling of missing permissions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;
use std::sync::Arc;

use scope_gate_core::Action;
use scope_gate_core::AuthzError;
use scope_gate_core::AuthzErrorKind;
use scope_gate_core::GrantSource;
use scope_gate_core::PermissionKey;
use scope_gate_core::PermissionMap;
use scope_gate_core::PermissionResolver;
use scope_gate_core::Principal;
use scope_gate_core::RequestContext;
use scope_gate_core::RequestMethod;
use scope_gate_core::ResourceScopes;
use scope_gate_core::ResourceType;
use scope_gate_core::ScopeGrants;
use scope_gate_core::ScopeName;
use scope_gate_core::ScopeRegistry;
use scope_gate_core::StoreError;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn orders() -> ResourceType {
    ResourceType::new("shop", "order")
}

fn lines() -> ResourceType {
    ResourceType::new("shop", "orderline")
}

fn registry() -> Arc<ScopeRegistry> {
    let lines = ResourceScopes::builder(lines()).perms_via(orders()).build().unwrap();
    Arc::new(ScopeRegistry::builder().register(lines).unwrap().build())
}

fn permission_map() -> PermissionMap {
    PermissionMap::new()
        .grant("default", "shop.view_order", Some("own"))
        .grant("sales", "shop.view_order", Some("open"))
        .grant("sales", "shop.change_order", Some("open"))
        .grant("sales", "shop.change_order", None)
        .grant("sales", "shop.approve_order", None)
}

fn resolver(map: PermissionMap) -> PermissionResolver {
    PermissionResolver::new(Arc::new(map), registry())
}

fn ctx(principal: Principal) -> RequestContext {
    RequestContext::for_principal(RequestMethod::Get, principal)
}

fn names(grants: &ScopeGrants) -> Vec<&str> {
    grants.iter().map(ScopeName::as_str).collect()
}

// ============================================================================
// SECTION: Grant Resolution
// ============================================================================

#[test]
fn superuser_holds_all_without_permission_lookup() {
    let resolver = resolver(PermissionMap::new());
    let mut ctx = ctx(Principal::superuser("root"));
    let grants = resolver.resolve_grants(&mut ctx, &orders(), Action::Delete).unwrap();
    assert_eq!(grants, ScopeGrants::all());
    assert!(ctx.permission_checked());
}

#[test]
fn default_permission_applies_to_every_principal() {
    let resolver = resolver(permission_map());
    let mut anonymous = RequestContext::new(RequestMethod::Get);
    let grants = resolver.resolve_grants(&mut anonymous, &orders(), Action::View).unwrap();
    assert_eq!(names(&grants), vec!["own"]);
}

#[test]
fn grants_union_across_permission_strings() {
    let resolver = resolver(permission_map());
    let mut ctx = ctx(Principal::new("alice").with_permission("sales"));
    let grants = resolver.resolve_grants(&mut ctx, &orders(), Action::View).unwrap();
    assert_eq!(names(&grants), vec!["open", "own"]);
}

#[test]
fn unscoped_grant_holds_permission_without_adding_scopes() {
    let resolver = resolver(permission_map());
    let mut ctx = ctx(Principal::new("alice").with_permission("sales"));
    let grants = resolver.resolve_grants(&mut ctx, &orders(), Action::Change).unwrap();
    assert_eq!(names(&grants), vec!["open"]);
}

#[test]
fn missing_permission_is_forbidden_not_empty() {
    let resolver = resolver(permission_map());
    let mut ctx = ctx(Principal::new("alice").with_permission("sales"));
    let err = resolver.resolve_grants(&mut ctx, &orders(), Action::Delete).unwrap_err();
    match &err {
        AuthzError::Forbidden {
            principal,
            permission,
        } => {
            assert_eq!(principal.as_str(), "alice");
            assert_eq!(permission.as_str(), "shop.delete_order");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), AuthzErrorKind::Denied);
    assert!(ctx.permission_checked());
}

#[test]
fn perms_via_uses_the_parent_permission_keys() {
    let resolver = resolver(permission_map());
    let mut ctx = ctx(Principal::new("alice").with_permission("sales"));
    let grants = resolver.resolve_grants(&mut ctx, &lines(), Action::View).unwrap();
    assert_eq!(names(&grants), vec!["open", "own"]);
}

#[test]
fn has_any_permission_checks_custom_actions() {
    let resolver = resolver(permission_map());
    let mut sales = ctx(Principal::new("alice").with_permission("sales"));
    let approve = PermissionKey::from("shop.approve_order");
    let refund = PermissionKey::from("shop.refund_order");
    assert!(resolver.has_any_permission(&mut sales, &[refund.clone(), approve.clone()]).unwrap());

    let mut anonymous = RequestContext::new(RequestMethod::Get);
    assert!(!resolver.has_any_permission(&mut anonymous, &[approve, refund]).unwrap());
}

// ============================================================================
// SECTION: Configuration Errors
// ============================================================================

#[test]
fn scoped_custom_action_is_rejected() {
    let map = PermissionMap::new().grant("ops", "shop.approve_order", Some("own"));
    let err = map.validate().unwrap_err();
    assert!(matches!(err, AuthzError::ScopedCustomAction { .. }));
    assert_eq!(err.kind(), AuthzErrorKind::Configuration);

    let resolver = resolver(map);
    let mut ctx = ctx(Principal::new("alice").with_permission("ops"));
    let err = resolver.resolve_grants(&mut ctx, &orders(), Action::View).unwrap_err();
    assert!(matches!(err, AuthzError::ScopedCustomAction { .. }));
}

#[test]
fn unscoped_custom_action_is_accepted() {
    let map = PermissionMap::new()
        .grant("ops", "shop.approve_order", None)
        .grant("ops", "shop.view_order", Some("open"));
    assert!(map.validate().is_ok());
}

// ============================================================================
// SECTION: Grant Sources
// ============================================================================

struct GroupGrants;

impl GrantSource for GroupGrants {
    fn granted_permissions(&self, principal: &Principal) -> Result<BTreeSet<String>, StoreError> {
        if principal.id.as_str() == "broken" {
            return Err(StoreError::Store("group lookup failed".to_string()));
        }
        Ok(BTreeSet::from(["sales".to_string()]))
    }
}

#[test]
fn grant_source_replaces_principal_permissions() {
    let resolver = resolver(permission_map()).with_grant_source(Arc::new(GroupGrants));
    let mut ctx = ctx(Principal::new("bob"));
    let grants = resolver.resolve_grants(&mut ctx, &orders(), Action::Change).unwrap();
    assert_eq!(names(&grants), vec!["open"]);
}

#[test]
fn grant_source_failure_is_a_defect() {
    let resolver = resolver(permission_map()).with_grant_source(Arc::new(GroupGrants));
    let mut ctx = ctx(Principal::new("broken"));
    let err = resolver.resolve_grants(&mut ctx, &orders(), Action::View).unwrap_err();
    assert!(matches!(err, AuthzError::Store(_)));
    assert_eq!(err.kind(), AuthzErrorKind::Defect);
}

#[test]
fn authenticating_drops_cached_permissions() {
    let resolver = resolver(permission_map());
    let mut ctx = RequestContext::new(RequestMethod::Get);
    assert!(resolver.resolve_grants(&mut ctx, &orders(), Action::Change).is_err());

    ctx.authenticate(Principal::new("alice").with_permission("sales"));
    let grants = resolver.resolve_grants(&mut ctx, &orders(), Action::Change).unwrap();
    assert_eq!(names(&grants), vec!["open"]);
}
