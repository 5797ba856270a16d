// crates/scope-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Scope Gate Identifiers
// Description: Canonical opaque identifiers for principals, scopes, and records.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout Scope Gate.
//! Identifiers are opaque and serialize as strings. Validation is handled at the
//! configuration boundary rather than within these wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the builtin scope that every resource type defines.
pub const ALL_SCOPE: &str = "all";

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of an authenticated (or anonymous) principal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a new principal identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PrincipalId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of a scope attached to a resource type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeName(String);

impl ScopeName {
    /// Creates a new scope name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the builtin `all` scope name.
    #[must_use]
    pub fn all() -> Self {
        Self::new(ALL_SCOPE)
    }

    /// Returns true when this is the builtin `all` scope.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.0 == ALL_SCOPE
    }

    /// Returns the scope name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScopeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque bearer credential value.
///
/// # Invariants
/// - The raw value is never written to audit logs; use a fingerprint instead.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenValue(String);

impl TokenValue {
    /// Creates a new token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenValue(<redacted>)")
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TokenValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TokenValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Key of a single record; the field used by membership tests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Creates a new record key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u64> for RecordKey {
    fn from(value: u64) -> Self {
        Self::new(value.to_string())
    }
}

// ============================================================================
// SECTION: Permission Keys
// ============================================================================

/// Action permission key of the form `app.action_model`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKey(String);

/// Parsed components of a [`PermissionKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionKeyParts<'a> {
    /// Application label.
    pub app: &'a str,
    /// Action label (`view`, `add`, `change`, `delete`, or a custom action).
    pub action: &'a str,
    /// Lower-cased model name.
    pub model: &'a str,
}

impl PermissionKey {
    /// Creates a new permission key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key into app, action, and model parts.
    ///
    /// Returns `None` when the key does not follow `app.action_model`.
    #[must_use]
    pub fn parts(&self) -> Option<PermissionKeyParts<'_>> {
        let (app, rest) = self.0.split_once('.')?;
        let (action, model) = rest.split_once('_')?;
        if app.is_empty() || action.is_empty() || model.is_empty() {
            return None;
        }
        Some(PermissionKeyParts {
            app,
            action,
            model,
        })
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PermissionKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PermissionKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Resource Types
// ============================================================================

/// Resource (model) type that scopes are attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceType {
    /// Application label.
    app: String,
    /// Lower-cased model name.
    model: String,
}

impl ResourceType {
    /// Creates a resource type; the model name is lower-cased.
    #[must_use]
    pub fn new(app: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            model: model.into().to_ascii_lowercase(),
        }
    }

    /// Parses an `app.model` label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let (app, model) = label.split_once('.')?;
        if app.is_empty() || model.is_empty() || model.contains('.') {
            return None;
        }
        Some(Self::new(app, model))
    }

    /// Returns the application label.
    #[must_use]
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Builds the permission key for an action label on this resource.
    #[must_use]
    pub fn permission_key(&self, action: &str) -> PermissionKey {
        PermissionKey::new(format!("{}.{}_{}", self.app, action, self.model))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}
