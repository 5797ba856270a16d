// crates/scope-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Credential Store
// Description: Durable CredentialStore and PrincipalDirectory using SQLite.
// Purpose: Persist bearer tokens and principals for the token gate.
// Dependencies: scope-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`SqliteCredentialStore`] that
//! implements both the credential store and the principal directory used by
//! the token authentication gate. Stored rows are untrusted and fail closed
//! on decode errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteCredentialStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
