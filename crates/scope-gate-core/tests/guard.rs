// crates/scope-gate-core/tests/guard.rs
// ============================================================================
// Module: Enforcement Guard Tests
// Description: Tests for the per-request scope decision invariant.
// ============================================================================
//! ## Overview
//! Validates that successful requests commit only when the decision log
//! covers the request method, that failures roll back, and that nested runs
//! defer to the outermost guard.

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
use scope_gate_core::EnforcementGuard;
use scope_gate_core::InMemoryTransactions;
use scope_gate_core::MemoryAuditSink;
use scope_gate_core::PermissionMap;
use scope_gate_core::Principal;
use scope_gate_core::Query;
use scope_gate_core::Record;
use scope_gate_core::RequestContext;
use scope_gate_core::RequestMethod;
use scope_gate_core::ResourceType;
use scope_gate_core::ScopeEvaluator;
use scope_gate_core::ScopeRegistry;
use scope_gate_core::StoreError;
use scope_gate_core::Transaction;
use scope_gate_core::TransactionManager;
use scope_gate_core::Values;
use serde_json::json;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn notes() -> ResourceType {
    ResourceType::new("wiki", "note")
}

fn evaluator() -> ScopeEvaluator {
    let map = PermissionMap::new()
        .grant("editor", "wiki.view_note", Some("all"))
        .grant("editor", "wiki.add_note", Some("all"))
        .grant("editor", "wiki.change_note", Some("all"))
        .grant("editor", "wiki.delete_note", Some("all"));
    ScopeEvaluator::new(Arc::new(ScopeRegistry::default()), Arc::new(map))
}

fn editor(method: RequestMethod) -> RequestContext {
    RequestContext::for_principal(method, Principal::new("ed").with_permission("editor"))
        .with_request_id("req-1")
}

/// Transactions whose rollback always fails.
struct StuckTransactions;

/// Transaction handle for [`StuckTransactions`].
struct StuckTransaction;

impl Transaction for StuckTransaction {
    fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Err(StoreError::Store("connection lost".to_string()))
    }
}

impl TransactionManager for StuckTransactions {
    type Transaction = StuckTransaction;

    fn begin(&self) -> Result<StuckTransaction, StoreError> {
        Ok(StuckTransaction)
    }
}

fn is_omitted(err: &AuthzError) -> bool {
    matches!(err, AuthzError::PermissionCheckOmitted { .. })
}

// ============================================================================
// SECTION: Top-Level Requests
// ============================================================================

#[test]
fn scoped_read_commits() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Get);
    let status = guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_view(ctx, Query::new(notes()))?;
            transactions.write("viewed", json!(true))?;
            Ok(200)
        })
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(transactions.commit_count(), 1);
    assert_eq!(transactions.committed("viewed"), Some(json!(true)));
}

#[test]
fn unscoped_success_rolls_back_and_fails() {
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = EnforcementGuard::new(audit.clone());
    let transactions = InMemoryTransactions::new();
    let mut ctx = editor(RequestMethod::Post);
    let err = guard
        .run(&mut ctx, &transactions, |_| -> Result<u16, AuthzError> {
            transactions.write("note", json!({ "title": "draft" }))?;
            Ok(201)
        })
        .unwrap_err();
    assert!(is_omitted(&err));
    assert_eq!(transactions.rollback_count(), 1);
    assert_eq!(transactions.commit_count(), 0);
    assert_eq!(transactions.committed("note"), None);

    let violations = audit.events_named("enforcement_violation");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["method"], "POST");
    assert_eq!(violations[0]["request_id"], "req-1");
}

#[test]
fn handler_error_rolls_back_without_checking() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let mut ctx = editor(RequestMethod::Delete);
    let err = guard
        .run(&mut ctx, &transactions, |_| -> Result<u16, AuthzError> {
            transactions.write("note", json!(null))?;
            Err(AuthzError::Store(scope_gate_core::StoreError::Store("disk full".to_string())))
        })
        .unwrap_err();
    assert!(matches!(err, AuthzError::Store(_)));
    assert_eq!(transactions.rollback_count(), 1);
}

#[test]
fn non_success_response_commits_unchecked() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let mut ctx = editor(RequestMethod::Put);
    let status = guard
        .run(&mut ctx, &transactions, |_| -> Result<u16, AuthzError> { Ok(404) })
        .unwrap();
    assert_eq!(status, 404);
    assert_eq!(transactions.commit_count(), 1);
}

#[test]
fn permission_lookup_alone_does_not_satisfy_the_guard() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = RequestContext::new(RequestMethod::Get);
    let err = guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            // The handler swallows the denial and still answers 200.
            let _ = evaluator.scope_view(ctx, Query::new(notes()));
            Ok(200)
        })
        .unwrap_err();
    assert!(is_omitted(&err));
    assert!(err.to_string().contains("view scope was not checked"));
}

#[test]
fn mark_unscoped_satisfies_the_guard() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let mut ctx = editor(RequestMethod::Options);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            ctx.mark_unscoped();
            Ok(204)
        })
        .unwrap();
    assert!(ctx.decisions().contains(Action::View));
}

// ============================================================================
// SECTION: Method Coverage
// ============================================================================

#[test]
fn write_methods_accept_any_write_decision() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Post);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_delete(ctx, &notes(), &Record::new(1_u64), &Values::new())?;
            Ok(200)
        })
        .unwrap();
}

#[test]
fn delete_method_requires_a_delete_decision() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Delete);
    let err = guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_change(ctx, &notes(), &Record::new(1_u64), &Values::new())?;
            Ok(204)
        })
        .unwrap_err();
    assert!(err.to_string().contains("delete scope was not checked"));

    let mut ctx = editor(RequestMethod::Delete);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_file_field(ctx, &notes(), &Record::new(1_u64), "attachment")?;
            Ok(204)
        })
        .unwrap();
}

#[test]
fn read_methods_require_a_view_decision() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Head);
    let err = guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_change(ctx, &notes(), &Record::new(1_u64), &Values::new())?;
            Ok(200)
        })
        .unwrap_err();
    assert!(is_omitted(&err));
}

// ============================================================================
// SECTION: Nesting
// ============================================================================

#[test]
fn nested_runs_defer_to_the_outer_guard() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Get);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            // The inner run makes no decision and is not checked on its own.
            let inner = guard.run(ctx, &transactions, |_| -> Result<u16, AuthzError> { Ok(200) })?;
            assert_eq!(inner, 200);
            evaluator.scope_view(ctx, Query::new(notes()))?;
            Ok(200)
        })
        .unwrap();
    assert_eq!(transactions.commit_count(), 1);
    assert_eq!(transactions.rollback_count(), 0);
}

#[test]
fn nested_decision_satisfies_the_outer_guard() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Get);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            guard.run(ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
                evaluator.scope_view(ctx, Query::new(notes()))?;
                Ok(200)
            })
        })
        .unwrap();
}

#[test]
fn decision_log_resets_between_top_level_requests() {
    let guard = EnforcementGuard::default();
    let transactions = InMemoryTransactions::new();
    let evaluator = evaluator();
    let mut ctx = editor(RequestMethod::Get);
    guard
        .run(&mut ctx, &transactions, |ctx| -> Result<u16, AuthzError> {
            evaluator.scope_view(ctx, Query::new(notes()))?;
            Ok(200)
        })
        .unwrap();
    let err = guard
        .run(&mut ctx, &transactions, |_| -> Result<u16, AuthzError> { Ok(200) })
        .unwrap_err();
    assert!(is_omitted(&err));
    assert!(err.to_string().contains("no permission check was performed"));
}

#[test]
fn failed_rollbacks_are_audited() {
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = EnforcementGuard::new(audit.clone());
    let mut ctx = editor(RequestMethod::Post);
    let err = guard
        .run(&mut ctx, &StuckTransactions, |_| -> Result<u16, AuthzError> { Ok(201) })
        .unwrap_err();
    assert!(is_omitted(&err));

    let err = guard
        .run(&mut ctx, &StuckTransactions, |_| -> Result<u16, AuthzError> {
            Err(AuthzError::Store(StoreError::Invalid("bad write".to_string())))
        })
        .unwrap_err();
    assert!(matches!(err, AuthzError::Store(_)));

    let reasons: Vec<String> = audit
        .events_named("enforcement_violation")
        .iter()
        .map(|event| event["reason"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(reasons.len(), 3);
    assert!(reasons[1].starts_with("rollback failed after permission check omitted for POST request"));
    assert!(reasons[1].ends_with("connection lost"));
    assert_eq!(reasons[2], "rollback failed after handler error: store error: connection lost");
}
