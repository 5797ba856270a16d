// crates/scope-gate-core/src/core/mod.rs
// ============================================================================
// Module: Scope Gate Core Types
// Description: Identifiers, actions, principals, credentials, and filters.
// Purpose: Provide the value types shared by the registry, evaluator, and gate.
// Dependencies: serde, serde_json, smallvec, time
// ============================================================================

//! ## Overview
//! Core types are plain values with no behavior beyond parsing and evaluation
//! against in-memory records. Runtime modules build on them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod action;
pub mod credential;
pub mod filter;
pub mod identifiers;
pub mod principal;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use action::Action;
pub use action::PermissionAction;
pub use action::RequestMethod;
pub use credential::Credential;
pub use filter::CompareOp;
pub use filter::Condition;
pub use filter::FieldPath;
pub use filter::Filter;
pub use filter::Query;
pub use filter::Record;
pub use filter::Subset;
pub use filter::Values;
pub use identifiers::ALL_SCOPE;
pub use identifiers::PermissionKey;
pub use identifiers::PermissionKeyParts;
pub use identifiers::PrincipalId;
pub use identifiers::RecordKey;
pub use identifiers::ResourceType;
pub use identifiers::ScopeName;
pub use identifiers::TokenValue;
pub use principal::ANONYMOUS_PRINCIPAL;
pub use principal::Principal;
