// crates/scope-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Scope Gate Runtime
// Description: Registry, resolver, evaluator, guard, and token gate.
// Purpose: Decide and enforce per-request scope checks.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the request path: the token gate binds a
//! principal, the resolver derives grants, the evaluator decides, and the
//! guard enforces that a decision was recorded. All adapters call into the
//! same engine so behavior stays identical across transports.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod authn;
pub mod clock;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod memory;
pub mod registry;
pub mod relation;
pub mod resolver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authn::AuthState;
pub use authn::DEFAULT_MAX_HEADER_BYTES;
pub use authn::DEFAULT_TOKEN_SCHEME;
pub use authn::TokenAuthError;
pub use authn::TokenAuthSettings;
pub use authn::TokenAuthenticator;
pub use authn::format_expiry;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use context::RequestContext;
pub use context::ScopeDecisionLog;
pub use error::AuthzError;
pub use error::AuthzErrorKind;
pub use error::ScopeFnError;
pub use evaluator::MAX_COMPOSITION_DEPTH;
pub use evaluator::ScopeEvaluator;
pub use guard::EnforcementGuard;
pub use guard::GuardedResponse;
pub use memory::InMemoryCollection;
pub use memory::InMemoryCredentialStore;
pub use memory::InMemoryPrincipalDirectory;
pub use memory::InMemoryRelatedRecords;
pub use memory::InMemoryTransaction;
pub use memory::InMemoryTransactions;
pub use registry::DeleteHandler;
pub use registry::DynamicScopeFn;
pub use registry::DynamicScopeProvider;
pub use registry::RecordScopeFn;
pub use registry::RegistryError;
pub use registry::ResourceScopes;
pub use registry::ResourceScopesBuilder;
pub use registry::ScopeContext;
pub use registry::ScopeHandlers;
pub use registry::ScopeRegistry;
pub use registry::ScopeRegistryBuilder;
pub use registry::ScopeRule;
pub use registry::SubsetScopeFn;
pub use registry::ViewScope;
pub use registry::ViewScopeFn;
pub use relation::RelationScopes;
pub use resolver::DEFAULT_PERMISSION;
pub use resolver::HeldPermissions;
pub use resolver::PermissionGrant;
pub use resolver::PermissionMap;
pub use resolver::PermissionResolver;
pub use resolver::PrincipalGrants;
pub use resolver::ScopeGrants;
