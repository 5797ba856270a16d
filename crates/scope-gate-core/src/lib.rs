// crates/scope-gate-core/src/lib.rs
// ============================================================================
// Module: Scope Gate Core Library
// Description: Public API surface for the Scope Gate core.
// Purpose: Expose core types, collaborator interfaces, and the runtime engine.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Scope Gate is a request-time authorization layer. For every request it
//! decides which records the principal may view, add, change, or delete, and
//! it refuses to complete a request whose handler never made that decision.
//! Storage, credentials, and transactions are external collaborators reached
//! through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::Clock;
pub use interfaces::CredentialStore;
pub use interfaces::GrantSource;
pub use interfaces::PrincipalDirectory;
pub use interfaces::RecordSource;
pub use interfaces::RelatedRecords;
pub use interfaces::StoreError;
pub use interfaces::SubsetResolver;
pub use interfaces::Transaction;
pub use interfaces::TransactionManager;
pub use runtime::AuthState;
pub use runtime::AuthzError;
pub use runtime::AuthzErrorKind;
pub use runtime::DeleteHandler;
pub use runtime::DynamicScopeProvider;
pub use runtime::EnforcementGuard;
pub use runtime::FixedClock;
pub use runtime::GuardedResponse;
pub use runtime::InMemoryCollection;
pub use runtime::InMemoryCredentialStore;
pub use runtime::InMemoryPrincipalDirectory;
pub use runtime::InMemoryRelatedRecords;
pub use runtime::InMemoryTransactions;
pub use runtime::PermissionMap;
pub use runtime::PermissionResolver;
pub use runtime::RegistryError;
pub use runtime::RelationScopes;
pub use runtime::RequestContext;
pub use runtime::ResourceScopes;
pub use runtime::ScopeContext;
pub use runtime::ScopeDecisionLog;
pub use runtime::ScopeEvaluator;
pub use runtime::ScopeFnError;
pub use runtime::ScopeGrants;
pub use runtime::ScopeHandlers;
pub use runtime::ScopeRegistry;
pub use runtime::ScopeRule;
pub use runtime::SystemClock;
pub use runtime::TokenAuthError;
pub use runtime::TokenAuthSettings;
pub use runtime::TokenAuthenticator;
pub use runtime::ViewScope;
