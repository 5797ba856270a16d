// crates/scope-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: Scope Gate In-Memory Collaborators
// Description: In-memory records, credentials, principals, and transactions.
// Purpose: Provide deterministic collaborators for tests and local demos.
// Dependencies: crate::{core, interfaces}, serde_json, time
// ============================================================================

//! ## Overview
//! These implementations back the collaborator traits with mutex-guarded maps.
//! They are not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
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
use crate::interfaces::CredentialStore;
use crate::interfaces::PrincipalDirectory;
use crate::interfaces::RecordSource;
use crate::interfaces::RelatedRecords;
use crate::interfaces::StoreError;
use crate::interfaces::SubsetResolver;
use crate::interfaces::Transaction;
use crate::interfaces::TransactionManager;
use crate::runtime::relation::value_label;

// ============================================================================
// SECTION: Collections
// ============================================================================

/// In-memory collection of records of one resource type.
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    /// Resource type held by the collection.
    resource: ResourceType,
    /// Records keyed by record key.
    records: BTreeMap<RecordKey, Record>,
}

impl InMemoryCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            records: BTreeMap::new(),
        }
    }

    /// Adds a record and returns the collection.
    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.insert(record);
        self
    }

    /// Adds or replaces a record.
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.key.clone(), record);
    }

    /// Returns a record by key.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// Returns the collection's resource type.
    #[must_use]
    pub const fn resource(&self) -> &ResourceType {
        &self.resource
    }

    /// Fails when a query targets another resource type.
    fn check_resource(&self, query: &Query) -> Result<(), StoreError> {
        if query.resource() == &self.resource {
            return Ok(());
        }
        Err(StoreError::Invalid(format!(
            "query over {} sent to collection {}",
            query.resource(),
            self.resource
        )))
    }
}

impl SubsetResolver for InMemoryCollection {
    fn resolve_subset(&self, subset: &Subset) -> Result<BTreeSet<RecordKey>, StoreError> {
        match subset {
            Subset::Keys(keys) => Ok(keys.clone()),
            Subset::Query(query) => {
                Ok(self.execute(query)?.into_iter().map(|record| record.key).collect())
            }
            Subset::Union(members) => {
                let mut keys = BTreeSet::new();
                for member in members {
                    keys.extend(self.resolve_subset(member)?);
                }
                Ok(keys)
            }
        }
    }
}

impl RecordSource for InMemoryCollection {
    fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.check_resource(query)?;
        let predicate = query.predicate().materialize(self)?;
        let mut matches = Vec::new();
        for record in self.records.values() {
            if predicate.matches(record, self)? {
                matches.push(record.clone());
            }
        }
        Ok(matches)
    }
}

/// In-memory related-record lookups keyed by (resource, field, key).
#[derive(Debug, Clone, Default)]
pub struct InMemoryRelatedRecords {
    /// Related records keyed by owning resource and foreign-key field.
    relations: BTreeMap<(ResourceType, String), BTreeMap<String, Record>>,
}

impl InMemoryRelatedRecords {
    /// Creates an empty lookup table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the record a foreign-key value points at.
    #[must_use]
    pub fn with_related(
        mut self,
        resource: &ResourceType,
        field: &str,
        key: impl Into<String>,
        record: Record,
    ) -> Self {
        self.relations
            .entry((resource.clone(), field.to_string()))
            .or_default()
            .insert(key.into(), record);
        self
    }
}

impl RelatedRecords for InMemoryRelatedRecords {
    fn related(
        &self,
        resource: &ResourceType,
        field: &str,
        key: &Value,
    ) -> Result<Option<Record>, StoreError> {
        if !(key.is_string() || key.is_number()) {
            return Err(StoreError::Invalid(format!("unsupported foreign key value for {field}")));
        }
        Ok(self
            .relations
            .get(&(resource.clone(), field.to_string()))
            .and_then(|records| records.get(&value_label(key)))
            .cloned())
    }
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// In-memory credential store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentialStore {
    /// Credentials keyed by token value.
    credentials: Arc<Mutex<BTreeMap<TokenValue, Credential>>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a credential.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn insert(&self, credential: Credential) -> Result<(), StoreError> {
        self.credentials
            .lock()
            .map_err(|_| StoreError::Store("credential store mutex poisoned".to_string()))?
            .insert(credential.token.clone(), credential);
        Ok(())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn find(&self, token: &TokenValue) -> Result<Option<Credential>, StoreError> {
        let guard = self
            .credentials
            .lock()
            .map_err(|_| StoreError::Store("credential store mutex poisoned".to_string()))?;
        Ok(guard.get(token).cloned())
    }

    fn delete_if_exists(&self, token: &TokenValue) -> Result<bool, StoreError> {
        let mut guard = self
            .credentials
            .lock()
            .map_err(|_| StoreError::Store("credential store mutex poisoned".to_string()))?;
        Ok(guard.remove(token).is_some())
    }

    fn touch(&self, token: &TokenValue, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut guard = self
            .credentials
            .lock()
            .map_err(|_| StoreError::Store("credential store mutex poisoned".to_string()))?;
        if let Some(credential) = guard.get_mut(token) {
            credential.last_used_at = Some(at);
        }
        Ok(())
    }
}

/// In-memory principal directory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPrincipalDirectory {
    /// Principals keyed by identifier.
    principals: Arc<Mutex<BTreeMap<PrincipalId, Principal>>>,
}

impl InMemoryPrincipalDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a principal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory mutex is poisoned.
    pub fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        self.principals
            .lock()
            .map_err(|_| StoreError::Store("principal directory mutex poisoned".to_string()))?
            .insert(principal.id.clone(), principal);
        Ok(())
    }
}

impl PrincipalDirectory for InMemoryPrincipalDirectory {
    fn load(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        let guard = self
            .principals
            .lock()
            .map_err(|_| StoreError::Store("principal directory mutex poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }
}

// ============================================================================
// SECTION: Transactions
// ============================================================================

/// Shared state behind [`InMemoryTransactions`].
#[derive(Debug, Default)]
struct TransactionState {
    /// Committed key/value writes.
    committed: BTreeMap<String, Value>,
    /// Writes staged by the open transaction.
    pending: BTreeMap<String, Value>,
    /// Number of commits.
    commits: usize,
    /// Number of rollbacks.
    rollbacks: usize,
}

/// In-memory transaction manager staging key/value writes.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransactions {
    /// Shared transaction state.
    state: Arc<Mutex<TransactionState>>,
}

impl InMemoryTransactions {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a write in the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state mutex is poisoned.
    pub fn write(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        self.lock()?.pending.insert(key.into(), value);
        Ok(())
    }

    /// Returns a committed value.
    #[must_use]
    pub fn committed(&self, key: &str) -> Option<Value> {
        self.lock().ok().and_then(|state| state.committed.get(key).cloned())
    }

    /// Returns the number of commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.lock().map_or(0, |state| state.commits)
    }

    /// Returns the number of rollbacks so far.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.lock().map_or(0, |state| state.rollbacks)
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TransactionState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("transaction state mutex poisoned".to_string()))
    }
}

/// Handle for an open in-memory transaction.
#[derive(Debug)]
pub struct InMemoryTransaction {
    /// Shared transaction state.
    state: Arc<Mutex<TransactionState>>,
}

impl TransactionManager for InMemoryTransactions {
    type Transaction = InMemoryTransaction;

    fn begin(&self) -> Result<Self::Transaction, StoreError> {
        self.lock()?.pending.clear();
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
        })
    }
}

impl Transaction for InMemoryTransaction {
    fn commit(self) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Store("transaction state mutex poisoned".to_string()))?;
        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);
        state.commits += 1;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Store("transaction state mutex poisoned".to_string()))?;
        state.pending.clear();
        state.rollbacks += 1;
        Ok(())
    }
}
