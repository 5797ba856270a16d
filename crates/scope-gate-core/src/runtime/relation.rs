// crates/scope-gate-core/src/runtime/relation.rs
// ============================================================================
// Module: Scope Gate Relation Scopes
// Description: Dynamic scopes that test a relationship path on the record.
// Purpose: Derive view/add/change/delete rules from a configured relation path.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`RelationScopes`] maps scope names to relationship paths once, at resource
//! configuration time, and resolves them as a [`DynamicScopeProvider`]:
//! - view: the relationship endpoint is not null;
//! - add: the related record named by the proposed foreign key (or the
//!   current one) has the rest of the path set; a related record that does
//!   not exist yet is left to validation;
//! - delete: the current related record has the rest of the path set;
//! - change: delete AND add.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::core::FieldPath;
use crate::core::Filter;
use crate::core::Record;
use crate::core::RecordKey;
use crate::core::ResourceType;
use crate::core::ScopeName;
use crate::core::Values;
use crate::interfaces::RelatedRecords;
use crate::runtime::error::ScopeFnError;
use crate::runtime::registry::DynamicScopeProvider;
use crate::runtime::registry::ScopeHandlers;
use crate::runtime::registry::ScopeRule;
use crate::runtime::registry::ViewScope;

// ============================================================================
// SECTION: Relation Scopes
// ============================================================================

/// Scope provider deriving rules from relationship paths.
#[derive(Clone)]
pub struct RelationScopes {
    /// Relationship path per scope name.
    paths: BTreeMap<ScopeName, FieldPath>,
    /// Related record lookups.
    related: Arc<dyn RelatedRecords>,
}

impl RelationScopes {
    /// Creates a provider without relations.
    #[must_use]
    pub fn new(related: Arc<dyn RelatedRecords>) -> Self {
        Self {
            paths: BTreeMap::new(),
            related,
        }
    }

    /// Maps a scope name to a relationship path.
    #[must_use]
    pub fn relation(mut self, scope: impl Into<ScopeName>, path: FieldPath) -> Self {
        self.paths.insert(scope.into(), path);
        self
    }

    /// Returns the configured path for a scope.
    #[must_use]
    pub fn path(&self, scope: &ScopeName) -> Option<&FieldPath> {
        self.paths.get(scope)
    }
}

impl DynamicScopeProvider for RelationScopes {
    fn resolve(&self, resource: &ResourceType, scope: &ScopeName) -> Option<ScopeRule> {
        let path = self.paths.get(scope)?.clone();
        let relation = Arc::new(Relation {
            resource: resource.clone(),
            path,
            related: Arc::clone(&self.related),
        });
        let view = Arc::clone(&relation);
        let add = Arc::clone(&relation);
        let change = Arc::clone(&relation);
        let delete = relation;
        Some(ScopeRule::Handlers(
            ScopeHandlers::new()
                .view(move |_| Ok(ViewScope::Filter(Filter::not_null(view.path.clone()))))
                .add(move |_, record, values| add.add_allowed(record, values))
                .change(move |_, record, values| {
                    Ok(change.delete_allowed(record)? && change.add_allowed(record, values)?)
                })
                .delete(move |_, record, _| delete.delete_allowed(record)),
        ))
    }
}

// ============================================================================
// SECTION: Relation Evaluation
// ============================================================================

/// One resolved relation scope.
struct Relation {
    /// Resource type owning the foreign key.
    resource: ResourceType,
    /// Path from the record through the relation.
    path: FieldPath,
    /// Related record lookups.
    related: Arc<dyn RelatedRecords>,
}

impl Relation {
    /// Decides whether the record will have the relation after the write.
    fn add_allowed(&self, record: &Record, values: &Values) -> Result<bool, ScopeFnError> {
        let field = self.path.first();
        let key = values.get(field).or_else(|| record.field(field)).filter(|value| !value.is_null());
        let Some(rest) = self.path.rest() else {
            return Ok(key.is_some());
        };
        let Some(key) = key else {
            return Ok(true);
        };
        let Some(target) = self.fetch(field, key)? else {
            return Ok(true);
        };
        Ok(target.lookup(&rest).is_some_and(|value| !value.is_null()))
    }

    /// Decides whether the record currently has the relation.
    fn delete_allowed(&self, record: &Record) -> Result<bool, ScopeFnError> {
        let field = self.path.first();
        let key = record.field(field).filter(|value| !value.is_null());
        let Some(rest) = self.path.rest() else {
            return Ok(key.is_some());
        };
        let Some(key) = key else {
            return Ok(false);
        };
        let Some(target) = self.fetch(field, key)? else {
            return Ok(false);
        };
        Ok(target.lookup(&rest).is_some_and(|value| !value.is_null()))
    }

    /// Loads the related record; embedded objects are used as-is.
    fn fetch(&self, field: &str, key: &Value) -> Result<Option<Record>, ScopeFnError> {
        if let Value::Object(fields) = key {
            let record_key = fields.get("id").map_or_else(String::new, value_label);
            return Ok(Some(Record {
                key: RecordKey::new(record_key),
                fields: fields.clone(),
            }));
        }
        Ok(self.related.related(&self.resource, field, key)?)
    }
}

/// Renders a scalar JSON value as a key label.
pub(crate) fn value_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
