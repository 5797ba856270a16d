// crates/scope-gate-core/tests/relation.rs
// ============================================================================
// Module: Relation Scope Tests
// Description: Tests for scopes derived from relationship paths.
// ============================================================================
//! ## Overview
//! Validates that a relation scope allows a record exactly when it has (view,
//! delete) or will have (add) the relationship, and that change requires both.

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

use scope_gate_core::AuthzError;
use scope_gate_core::AuthzErrorKind;
use scope_gate_core::FieldPath;
use scope_gate_core::InMemoryCollection;
use scope_gate_core::InMemoryRelatedRecords;
use scope_gate_core::PermissionMap;
use scope_gate_core::Principal;
use scope_gate_core::Query;
use scope_gate_core::Record;
use scope_gate_core::RecordSource;
use scope_gate_core::RelationScopes;
use scope_gate_core::RequestContext;
use scope_gate_core::RequestMethod;
use scope_gate_core::ResourceScopes;
use scope_gate_core::ResourceType;
use scope_gate_core::ScopeEvaluator;
use scope_gate_core::ScopeName;
use scope_gate_core::ScopeRegistry;
use scope_gate_core::Values;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn jobs() -> ResourceType {
    ResourceType::new("fleet", "job")
}

fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn relations() -> RelationScopes {
    let related = InMemoryRelatedRecords::new()
        .with_related(&jobs(), "operator", "7", Record::new(7_u64).with_field("external_company", 99))
        .with_related(&jobs(), "operator", "8", Record::new(8_u64).with_field("external_company", Value::Null));
    RelationScopes::new(Arc::new(related))
        .relation("contracted", FieldPath::parse("operator.external_company").unwrap())
        .relation("assigned", FieldPath::parse("operator").unwrap())
}

fn evaluator(scope: &str) -> ScopeEvaluator {
    let scopes = ResourceScopes::builder(jobs()).dynamic(Arc::new(relations())).build().unwrap();
    let registry = ScopeRegistry::builder().register(scopes).unwrap().build();
    let mut map = PermissionMap::new();
    for action in ["view", "add", "change", "delete"] {
        map = map.grant("dispatcher", format!("fleet.{action}_job"), Some(scope));
    }
    ScopeEvaluator::new(Arc::new(registry), Arc::new(map))
}

fn ctx(method: RequestMethod) -> RequestContext {
    RequestContext::for_principal(method, Principal::new("dana").with_permission("dispatcher"))
}

fn job(key: u64, operator: Value) -> Record {
    Record::new(key).with_field("operator", operator)
}

// ============================================================================
// SECTION: Provider
// ============================================================================

#[test]
fn provider_exposes_configured_paths() {
    let relations = relations();
    let path = relations.path(&ScopeName::from("contracted")).unwrap();
    assert_eq!(path.to_string(), "operator.external_company");
    assert!(relations.path(&ScopeName::from("unrelated")).is_none());
}

#[test]
fn unconfigured_relation_name_is_unknown() {
    let evaluator = evaluator("unrelated");
    let mut ctx = ctx(RequestMethod::Get);
    let err = evaluator.scope_view(&mut ctx, Query::new(jobs())).unwrap_err();
    assert!(matches!(err, AuthzError::UnknownScope { .. }));
}

// ============================================================================
// SECTION: View
// ============================================================================

#[test]
fn view_requires_the_relationship_endpoint() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Get);
    let query = evaluator.scope_view(&mut ctx, Query::new(jobs())).unwrap();
    let collection = InMemoryCollection::new(jobs())
        .with_record(job(1, json!({ "id": 7, "external_company": 99 })))
        .with_record(job(2, json!({ "id": 8, "external_company": null })))
        .with_record(job(3, Value::Null))
        .with_record(Record::new(4_u64));
    let keys: Vec<String> = collection
        .execute(&query)
        .unwrap()
        .into_iter()
        .map(|record| record.key.to_string())
        .collect();
    assert_eq!(keys, vec!["1".to_string()]);
}

// ============================================================================
// SECTION: Writes
// ============================================================================

#[test]
fn add_allows_records_that_will_have_the_relationship() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Post);
    let draft = Record::new(10_u64);
    evaluator.scope_add(&mut ctx, &jobs(), &draft, &values(json!({ "operator": 7 }))).unwrap();
    let err = evaluator.scope_add(&mut ctx, &jobs(), &draft, &values(json!({ "operator": 8 })));
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));
}

#[test]
fn add_defers_missing_relationships_to_validation() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Post);
    let draft = Record::new(10_u64);
    evaluator.scope_add(&mut ctx, &jobs(), &draft, &Values::new()).unwrap();
    evaluator.scope_add(&mut ctx, &jobs(), &draft, &values(json!({ "operator": 42 }))).unwrap();
}

#[test]
fn single_segment_relation_requires_the_field() {
    let evaluator = evaluator("assigned");
    let mut ctx = ctx(RequestMethod::Post);
    let draft = Record::new(10_u64);
    evaluator.scope_add(&mut ctx, &jobs(), &draft, &values(json!({ "operator": 42 }))).unwrap();
    let err = evaluator.scope_add(&mut ctx, &jobs(), &draft, &values(json!({ "operator": null })));
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));
}

#[test]
fn delete_requires_the_current_relationship() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Delete);
    let none = Values::new();
    evaluator.scope_delete(&mut ctx, &jobs(), &job(1, json!(7)), &none).unwrap();
    evaluator
        .scope_delete(&mut ctx, &jobs(), &job(2, json!({ "id": 7, "external_company": 5 })), &none)
        .unwrap();
    for record in [job(3, json!(8)), job(4, json!(42)), Record::new(5_u64)] {
        let err = evaluator.scope_delete(&mut ctx, &jobs(), &record, &none);
        assert!(matches!(err, Err(AuthzError::Scoping { .. })), "record {}", record.key);
    }
}

#[test]
fn change_requires_the_relationship_before_and_after() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Patch);
    let current = job(1, json!(7));
    evaluator.scope_change(&mut ctx, &jobs(), &current, &values(json!({ "notes": "ok" }))).unwrap();
    let err = evaluator.scope_change(&mut ctx, &jobs(), &current, &values(json!({ "operator": 8 })));
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));

    let orphan = job(2, Value::Null);
    let err = evaluator.scope_change(&mut ctx, &jobs(), &orphan, &values(json!({ "operator": 7 })));
    assert!(matches!(err, Err(AuthzError::Scoping { .. })));
}

#[test]
fn unsupported_foreign_key_values_fail_the_scope() {
    let evaluator = evaluator("contracted");
    let mut ctx = ctx(RequestMethod::Post);
    let err = evaluator
        .scope_add(&mut ctx, &jobs(), &Record::new(10_u64), &values(json!({ "operator": true })))
        .unwrap_err();
    assert!(matches!(err, AuthzError::ScopeFailed { .. }));
    assert_eq!(err.kind(), AuthzErrorKind::Defect);
}
