// crates/scope-gate-core/tests/scope_writes.rs
// ============================================================================
// Module: Write Scoping Tests
// Description: Tests for add, change, and delete scope decisions.
// ============================================================================
//! ## Overview
//! Validates record-level write decisions: any grant allows, composites
//! require every member, delete handlers accept either argument shape, and
//! errors are reported in grant order.

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

use std::sync::Arc;

use scope_gate_core::Action;
use scope_gate_core::AuthzError;
use scope_gate_core::AuthzErrorKind;
use scope_gate_core::DeleteHandler;
use scope_gate_core::FieldPath;
use scope_gate_core::Filter;
use scope_gate_core::InMemoryCollection;
use scope_gate_core::MemoryAuditSink;
use scope_gate_core::PermissionMap;
use scope_gate_core::Principal;
use scope_gate_core::Query;
use scope_gate_core::Record;
use scope_gate_core::RecordKey;
use scope_gate_core::RequestContext;
use scope_gate_core::RequestMethod;
use scope_gate_core::ResourceScopes;
use scope_gate_core::ResourceType;
use scope_gate_core::ScopeEvaluator;
use scope_gate_core::ScopeFnError;
use scope_gate_core::ScopeHandlers;
use scope_gate_core::ScopeRegistry;
use scope_gate_core::ScopeRule;
use scope_gate_core::Subset;
use scope_gate_core::SubsetResolver;
use scope_gate_core::Values;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn orders() -> ResourceType {
    ResourceType::new("shop", "order")
}

fn field(name: &str) -> FieldPath {
    FieldPath::field(name).expect("field path")
}

fn order(key: u64, owner: &str, status: &str) -> Record {
    Record::new(key).with_field("owner", owner).with_field("status", status)
}

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn collection() -> InMemoryCollection {
    InMemoryCollection::new(orders())
        .with_record(order(1, "alice", "open"))
        .with_record(order(2, "bob", "open"))
        .with_record(order(3, "bob", "closed"))
}

fn registry() -> Arc<ScopeRegistry> {
    let store = collection();
    let scopes = ResourceScopes::builder(orders())
        .scope(
            "own",
            ScopeRule::dynamic(|ctx| {
                Ok(Some(Filter::equals(field("owner"), ctx.principal.id.as_str())))
            }),
        )
        .scope("open", ScopeRule::Static(Filter::equals(field("status"), "open")))
        .scope("own_open", ScopeRule::composite(["own", "open"]))
        .scope("nested", ScopeRule::composite(["own_open", "all"]))
        .scope("loop", ScopeRule::composite(["loop"]))
        .scope("broken", ScopeRule::dynamic(|_| Err(ScopeFnError::new("boom"))))
        .scope("inapplicable", ScopeRule::dynamic(|_| Ok(None)))
        .scope(
            "bob_open",
            ScopeRule::Static(Filter::key_in(Subset::Query(
                Query::new(orders())
                    .filter(Filter::equals(field("owner"), "bob"))
                    .filter(Filter::equals(field("status"), "open")),
            ))),
        )
        .scope(
            "cheap",
            ScopeRule::Handlers(
                ScopeHandlers::new()
                    .add(|_, _, values| {
                        Ok(values.get("total").and_then(Value::as_i64).is_some_and(|t| t < 100))
                    })
                    .change(|_, record, _| Ok(record.field("status") == Some(&json!("open"))))
                    .delete(|_, record, _| Ok(record.key == RecordKey::from(1_u64))),
            ),
        )
        .scope(
            "row",
            ScopeRule::Handlers(ScopeHandlers::new().delete_subset(move |_, subset, _| {
                let keys = store.resolve_subset(subset)?;
                Ok(keys.len() == 1 && keys.contains(&RecordKey::from(2_u64)))
            })),
        )
        .scope(
            "migrating",
            ScopeRule::Handlers(ScopeHandlers::new().delete_handler(DeleteHandler::Either {
                object: Arc::new(|_, _, _| Err(ScopeFnError::new("object form removed"))),
                subset: Arc::new(|_, subset, _| Ok(matches!(subset, Subset::Query(_)))),
            })),
        )
        .scope(
            "retired",
            ScopeRule::Handlers(ScopeHandlers::new().delete_handler(DeleteHandler::Either {
                object: Arc::new(|_, _, _| Err(ScopeFnError::new("object failed"))),
                subset: Arc::new(|_, _, _| Err(ScopeFnError::new("subset failed"))),
            })),
        )
        .build()
        .unwrap();
    Arc::new(ScopeRegistry::builder().register(scopes).unwrap().build())
}

/// Grants each listed scope for every write action under its own name.
fn evaluator(scopes: &[&str]) -> ScopeEvaluator {
    let mut map = PermissionMap::new();
    for scope in scopes {
        for action in ["add", "change", "delete"] {
            map = map.grant(*scope, format!("shop.{action}_order"), Some(*scope));
        }
    }
    ScopeEvaluator::new(registry(), Arc::new(map)).with_subset_resolver(Arc::new(collection()))
}

fn ctx(method: RequestMethod, permissions: &[&str]) -> RequestContext {
    let principal = Principal::new("alice").with_permissions(permissions.iter().copied());
    RequestContext::for_principal(method, principal)
}

const WRITES: [(Action, &str, RequestMethod); 3] = [
    (Action::Add, "add", RequestMethod::Post),
    (Action::Change, "change", RequestMethod::Patch),
    (Action::Delete, "delete", RequestMethod::Delete),
];

fn write(
    evaluator: &ScopeEvaluator,
    ctx: &mut RequestContext,
    action: Action,
    record: &Record,
) -> Result<(), AuthzError> {
    let none = Values::new();
    match action {
        Action::Add => evaluator.scope_add(ctx, &orders(), record, &none),
        Action::Change => evaluator.scope_change(ctx, &orders(), record, &none),
        Action::Delete => evaluator.scope_delete(ctx, &orders(), record, &none),
        Action::View => panic!("not a write action"),
    }
}

// ============================================================================
// SECTION: Add
// ============================================================================

#[test]
fn add_evaluates_filters_on_the_proposed_record() {
    let evaluator = evaluator(&["open"]);
    let mut ctx = ctx(RequestMethod::Post, &["open"]);
    let draft = Record::new(10_u64);

    let open = values(json!({ "status": "open" }));
    evaluator.scope_add(&mut ctx, &orders(), &draft, &open).unwrap();
    assert!(ctx.decisions().contains(Action::Add));

    let closed = values(json!({ "status": "closed" }));
    let err = evaluator.scope_add(&mut ctx, &orders(), &draft, &closed).unwrap_err();
    assert!(matches!(err, AuthzError::Scoping { action: Action::Add, .. }));
}

#[test]
fn add_handler_sees_proposed_values() {
    let evaluator = evaluator(&["cheap"]);
    let mut ctx = ctx(RequestMethod::Post, &["cheap"]);
    let draft = Record::new(10_u64);
    assert!(evaluator.scope_add(&mut ctx, &orders(), &draft, &values(json!({ "total": 40 }))).is_ok());
    assert!(evaluator.scope_add(&mut ctx, &orders(), &draft, &values(json!({ "total": 400 }))).is_err());
}

// ============================================================================
// SECTION: Change
// ============================================================================

#[test]
fn change_evaluates_filters_on_the_current_record() {
    let evaluator = evaluator(&["open"]);
    let mut ctx = ctx(RequestMethod::Patch, &["open"]);
    let reopen = values(json!({ "status": "open" }));
    let err = evaluator.scope_change(&mut ctx, &orders(), &order(3, "bob", "closed"), &reopen);
    assert!(err.is_err());

    let close = values(json!({ "status": "closed" }));
    evaluator.scope_change(&mut ctx, &orders(), &order(2, "bob", "open"), &close).unwrap();
    assert_eq!(ctx.decisions().actions(), &[Action::Change]);
}

#[test]
fn any_granted_scope_allows_a_write() {
    let evaluator = evaluator(&["own", "open"]);
    let mut ctx = ctx(RequestMethod::Put, &["own", "open"]);
    let none = Values::new();
    evaluator.scope_change(&mut ctx, &orders(), &order(2, "bob", "open"), &none).unwrap();
    evaluator.scope_change(&mut ctx, &orders(), &order(5, "alice", "closed"), &none).unwrap();
    let err = evaluator.scope_change(&mut ctx, &orders(), &order(3, "bob", "closed"), &none);
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));
}

#[test]
fn composite_scope_requires_every_member() {
    let evaluator = evaluator(&["own_open", "nested"]);
    let mut ctx = ctx(RequestMethod::Patch, &["own_open"]);
    let none = Values::new();
    evaluator.scope_change(&mut ctx, &orders(), &order(1, "alice", "open"), &none).unwrap();
    let err = evaluator.scope_change(&mut ctx, &orders(), &order(4, "alice", "closed"), &none);
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));

    let mut nested = self::ctx(RequestMethod::Patch, &["nested"]);
    evaluator.scope_change(&mut nested, &orders(), &order(1, "alice", "open"), &none).unwrap();
}

#[test]
fn self_referencing_composite_is_too_deep() {
    let evaluator = evaluator(&["loop"]);
    let mut ctx = ctx(RequestMethod::Patch, &["loop"]);
    let err = evaluator
        .scope_change(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new())
        .unwrap_err();
    assert!(matches!(err, AuthzError::CompositionTooDeep { .. }));
    assert_eq!(err.kind(), AuthzErrorKind::Configuration);
}

#[test]
fn inapplicable_dynamic_scope_does_not_allow() {
    let evaluator = evaluator(&["inapplicable"]);
    let mut ctx = ctx(RequestMethod::Patch, &["inapplicable"]);
    let err = evaluator.scope_change(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new());
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));
}

#[test]
fn query_subset_filters_resolve_through_the_record_source() {
    let evaluator = evaluator(&["bob_open"]);
    let mut ctx = ctx(RequestMethod::Patch, &["bob_open"]);
    let none = Values::new();
    evaluator.scope_change(&mut ctx, &orders(), &order(2, "bob", "open"), &none).unwrap();
    assert!(evaluator.scope_change(&mut ctx, &orders(), &order(3, "bob", "closed"), &none).is_err());
}

#[test]
fn write_errors_are_reported_in_grant_order() {
    let evaluator = evaluator(&["absent", "broken", "open"]);
    let mut ctx = ctx(RequestMethod::Patch, &["absent", "broken", "open"]);
    let err = evaluator
        .scope_change(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new())
        .unwrap_err();
    assert!(matches!(err, AuthzError::UnknownScope { action: Action::Change, .. }));
    assert!(ctx.decisions().is_empty());

    let evaluator = self::evaluator(&["broken", "open"]);
    let mut ctx = self::ctx(RequestMethod::Patch, &["broken", "open"]);
    let err = evaluator
        .scope_change(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new())
        .unwrap_err();
    assert!(matches!(err, AuthzError::ScopeFailed { .. }));
    assert_eq!(err.kind(), AuthzErrorKind::Defect);
}

#[test]
fn change_list_requires_every_record() {
    let evaluator = evaluator(&["open"]);
    let mut ctx = ctx(RequestMethod::Patch, &["open"]);
    let none = Values::new();
    let records = [order(1, "alice", "open"), order(2, "bob", "open")];
    evaluator.scope_change_list(&mut ctx, &orders(), &records, &none).unwrap();

    let records = [order(1, "alice", "open"), order(3, "bob", "closed")];
    assert!(evaluator.scope_change_list(&mut ctx, &orders(), &records, &none).is_err());
}

#[test]
fn empty_change_list_records_a_change_decision() {
    let evaluator = evaluator(&[]);
    let mut ctx = ctx(RequestMethod::Patch, &[]);
    evaluator.scope_change_list(&mut ctx, &orders(), &[], &Values::new()).unwrap();
    assert!(ctx.permission_checked());
    assert!(ctx.decisions().contains(Action::Change));
}

#[test]
fn store_dispatches_on_newness() {
    let evaluator = evaluator(&["open"]);
    let mut ctx = ctx(RequestMethod::Post, &["open"]);
    let record = order(1, "alice", "open");
    evaluator.scope_store(&mut ctx, &orders(), &record, &Values::new(), true).unwrap();
    evaluator.scope_store(&mut ctx, &orders(), &record, &Values::new(), false).unwrap();
    assert_eq!(ctx.decisions().actions(), &[Action::Add, Action::Change]);
}

#[test]
fn file_field_records_delete_then_change() {
    let evaluator = evaluator(&["open"]);
    let mut ctx = ctx(RequestMethod::Delete, &["open"]);
    evaluator.scope_file_field(&mut ctx, &orders(), &order(1, "alice", "open"), "receipt").unwrap();
    assert_eq!(ctx.decisions().actions(), &[Action::Delete, Action::Change]);
}

#[test]
fn file_field_marks_delete_only_for_post_and_delete() {
    let evaluator = evaluator(&["open"]);
    let record = order(1, "alice", "open");

    let mut post = ctx(RequestMethod::Post, &["open"]);
    evaluator.scope_file_field(&mut post, &orders(), &record, "receipt").unwrap();
    assert_eq!(post.decisions().actions(), &[Action::Delete, Action::Change]);

    for method in [RequestMethod::Put, RequestMethod::Patch] {
        let mut ctx = ctx(method, &["open"]);
        evaluator.scope_file_field(&mut ctx, &orders(), &record, "receipt").unwrap();
        assert_eq!(ctx.decisions().actions(), &[Action::Change]);
    }
}

// ============================================================================
// SECTION: Delete
// ============================================================================

#[test]
fn object_delete_handler_receives_the_record() {
    let evaluator = evaluator(&["cheap"]);
    let mut ctx = ctx(RequestMethod::Delete, &["cheap"]);
    let none = Values::new();
    evaluator.scope_delete(&mut ctx, &orders(), &order(1, "alice", "open"), &none).unwrap();
    assert!(evaluator.scope_delete(&mut ctx, &orders(), &order(2, "bob", "open"), &none).is_err());
    assert_eq!(ctx.decisions().actions(), &[Action::Delete]);
}

#[test]
fn subset_delete_handler_receives_a_single_row() {
    let evaluator = evaluator(&["row"]);
    let mut ctx = ctx(RequestMethod::Delete, &["row"]);
    let none = Values::new();
    evaluator.scope_delete(&mut ctx, &orders(), &order(2, "bob", "open"), &none).unwrap();
    assert!(evaluator.scope_delete(&mut ctx, &orders(), &order(1, "alice", "open"), &none).is_err());
}

#[test]
fn either_delete_handler_falls_back_to_subset_and_audits() {
    let audit = Arc::new(MemoryAuditSink::new());
    let evaluator = evaluator(&["migrating"]).with_audit(audit.clone());
    let mut ctx = ctx(RequestMethod::Delete, &["migrating"]).with_request_id("req-9");
    evaluator.scope_delete(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new()).unwrap();

    let fallbacks = audit.events_named("scope_subset_fallback");
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0]["scope"], "migrating");
    assert_eq!(fallbacks[0]["request_id"], "req-9");
    assert_eq!(fallbacks[0]["message"], "object form removed");
}

#[test]
fn either_delete_handler_reports_the_object_error() {
    let evaluator = evaluator(&["retired"]);
    let mut ctx = ctx(RequestMethod::Delete, &["retired"]);
    let err = evaluator
        .scope_delete(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new())
        .unwrap_err();
    match err {
        AuthzError::ScopeFailed {
            message,
            ..
        } => assert_eq!(message, "object failed"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn failed_fallback_emits_no_deprecation_event() {
    let audit = Arc::new(MemoryAuditSink::new());
    let evaluator = evaluator(&["retired"]).with_audit(audit.clone());
    let mut ctx = ctx(RequestMethod::Delete, &["retired"]);
    let err = evaluator.scope_delete(&mut ctx, &orders(), &order(1, "alice", "open"), &Values::new());
    assert!(matches!(err, Err(AuthzError::ScopeFailed { .. })));
    assert!(audit.events_named("scope_subset_fallback").is_empty());
    assert!(ctx.decisions().is_empty());
}

#[test]
fn handler_table_without_action_handler_is_unknown() {
    let evaluator = evaluator(&["row"]);
    let mut ctx = ctx(RequestMethod::Patch, &["row"]);
    let err = evaluator
        .scope_change(&mut ctx, &orders(), &order(2, "bob", "open"), &Values::new())
        .unwrap_err();
    assert!(matches!(err, AuthzError::UnknownScope { .. }));
}

#[test]
fn superuser_passes_every_write() {
    let evaluator = evaluator(&[]);
    let mut ctx = RequestContext::for_principal(RequestMethod::Delete, Principal::superuser("root"));
    evaluator.scope_delete(&mut ctx, &orders(), &order(3, "bob", "closed"), &Values::new()).unwrap();
    assert!(ctx.decisions().contains(Action::Delete));
}

// ============================================================================
// SECTION: Permission Errors
// ============================================================================

#[test]
fn permission_without_scopes_denies_every_write() {
    let mut map = PermissionMap::new();
    for (_, name, _) in WRITES {
        map = map.grant("clerk", format!("shop.{name}_order"), None);
    }
    let evaluator = ScopeEvaluator::new(registry(), Arc::new(map));
    for (action, _, method) in WRITES {
        let mut ctx = ctx(method, &["clerk"]);
        let err = write(&evaluator, &mut ctx, action, &order(1, "alice", "open")).unwrap_err();
        match err {
            AuthzError::Scoping {
                action: denied,
                ..
            } => assert_eq!(denied, action),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.permission_checked());
        assert!(ctx.decisions().is_empty());
    }
}

#[test]
fn missing_write_permission_is_forbidden() {
    let map = PermissionMap::new().grant("viewer", "shop.view_order", Some("all"));
    let evaluator = ScopeEvaluator::new(registry(), Arc::new(map));
    for (action, name, method) in WRITES {
        let mut ctx = ctx(method, &["viewer"]);
        let err = write(&evaluator, &mut ctx, action, &order(1, "alice", "open")).unwrap_err();
        assert_eq!(err.kind(), AuthzErrorKind::Denied);
        match err {
            AuthzError::Forbidden {
                permission,
                ..
            } => assert_eq!(permission.as_str(), format!("shop.{name}_order")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ctx.decisions().is_empty());
    }
}
