// crates/scope-gate-core/src/core/principal.rs
// ============================================================================
// Module: Scope Gate Principal
// Description: Authenticated actor with coarse-grained permission strings.
// Purpose: Carry identity and grants into scope resolution.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Principal`] is built once per request and is immutable afterwards. The
//! permission strings it holds are mapped onto scopes by the permission
//! resolver; superusers bypass that mapping entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PrincipalId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identifier used for requests without credentials.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

// ============================================================================
// SECTION: Principal
// ============================================================================

/// Actor a request is evaluated for.
///
/// # Invariants
/// - Immutable for the lifetime of a request once bound to its context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier.
    pub id: PrincipalId,
    /// Coarse-grained permission strings held by the principal.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Superuser flag; superusers hold the builtin `all` scope everywhere.
    #[serde(default)]
    pub superuser: bool,
}

impl Principal {
    /// Creates a principal without permissions.
    #[must_use]
    pub fn new(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            permissions: BTreeSet::new(),
            superuser: false,
        }
    }

    /// Creates a superuser principal.
    #[must_use]
    pub fn superuser(id: impl Into<PrincipalId>) -> Self {
        Self {
            superuser: true,
            ..Self::new(id)
        }
    }

    /// Returns the principal used for unauthenticated requests.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_PRINCIPAL)
    }

    /// Adds a permission string.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Adds several permission strings.
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Returns true when the principal holds the permission string.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
