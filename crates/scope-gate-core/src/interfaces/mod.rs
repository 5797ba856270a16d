// crates/scope-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Scope Gate Interfaces
// Description: Backend-agnostic collaborator contracts.
// Purpose: Define the storage, credential, clock, and transaction surfaces.
// Dependencies: crate::core, thiserror, time
// ============================================================================

//! ## Overview
//! Scope Gate never owns record storage, credentials, or transactions. It talks
//! to them through the traits below. Implementations must fail closed: a
//! storage error is surfaced, never read as "no restriction".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::Credential;
use crate::core::Principal;
use crate::core::PrincipalId;
use crate::core::Query;
use crate::core::Record;
use crate::core::RecordKey;
use crate::core::ResourceType;
use crate::core::Subset;
use crate::core::TokenValue;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Collaborator storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store backend error.
    #[error("store error: {0}")]
    Store(String),
    /// Stored data failed integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Stored data version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request or stored data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Materializes queryable subsets into key sets.
pub trait SubsetResolver {
    /// Resolves a subset to the keys it contains.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the subset cannot be evaluated.
    fn resolve_subset(&self, subset: &Subset) -> Result<BTreeSet<RecordKey>, StoreError>;
}

/// Executes lazily built queries.
pub trait RecordSource: SubsetResolver {
    /// Runs a query and returns matching records in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query cannot be executed.
    fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError>;
}

/// Looks up related records by foreign-key value.
pub trait RelatedRecords: Send + Sync {
    /// Returns the record referenced by `field` on `resource`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn related(
        &self,
        resource: &ResourceType,
        field: &str,
        key: &Value,
    ) -> Result<Option<Record>, StoreError>;
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Bearer credential storage.
pub trait CredentialStore: Send + Sync {
    /// Finds a credential by token value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find(&self, token: &TokenValue) -> Result<Option<Credential>, StoreError>;

    /// Deletes a credential; returns false when it was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_if_exists(&self, token: &TokenValue) -> Result<bool, StoreError>;

    /// Records a successful use of the credential.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn touch(&self, token: &TokenValue, at: OffsetDateTime) -> Result<(), StoreError>;
}

/// Resolves principal identifiers to principals.
pub trait PrincipalDirectory: Send + Sync {
    /// Loads a principal by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError>;
}

/// Supplies the permission strings granted to a principal.
pub trait GrantSource: Send + Sync {
    /// Returns every permission string the principal holds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when grants cannot be loaded.
    fn granted_permissions(&self, principal: &Principal) -> Result<BTreeSet<String>, StoreError>;
}

/// Wall clock used for credential expiry.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> OffsetDateTime;
}

// ============================================================================
// SECTION: Transactions
// ============================================================================

/// All-or-nothing boundary wrapped around a guarded request.
pub trait Transaction {
    /// Commits all writes made inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the commit fails.
    fn commit(self) -> Result<(), StoreError>;

    /// Discards all writes made inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the rollback fails.
    fn rollback(self) -> Result<(), StoreError>;
}

/// Opens transactions for guarded requests.
pub trait TransactionManager {
    /// Transaction handle type.
    type Transaction: Transaction;

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a transaction cannot be opened.
    fn begin(&self) -> Result<Self::Transaction, StoreError>;
}
