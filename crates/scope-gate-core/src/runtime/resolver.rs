// crates/scope-gate-core/src/runtime/resolver.rs
// ============================================================================
// Module: Scope Gate Permission Resolver
// Description: Maps principal permission strings to scope grants.
// Purpose: Derive the scopes a principal holds per (resource type, action).
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! A [`PermissionMap`] maps coarse permission strings (plus the implicit
//! `default`) to action permission keys and optional scope names. The
//! resolver parses the map once per request, caches it on the
//! [`RequestContext`], and answers grant lookups from the cache.
//!
//! Security posture: a missing permission key is [`AuthzError::Forbidden`],
//! never an empty grant set, and superusers short-circuit to `{all}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::Action;
use crate::core::PermissionAction;
use crate::core::PermissionKey;
use crate::core::Principal;
use crate::core::ResourceType;
use crate::core::ScopeName;
use crate::interfaces::GrantSource;
use crate::interfaces::StoreError;
use crate::runtime::context::RequestContext;
use crate::runtime::error::AuthzError;
use crate::runtime::registry::ScopeRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Permission string every principal holds implicitly.
pub const DEFAULT_PERMISSION: &str = "default";

// ============================================================================
// SECTION: Permission Map
// ============================================================================

/// One configured grant: an action permission, optionally narrowed to a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    /// Action permission key (`app.action_model`).
    pub permission: PermissionKey,
    /// Scope granted with the permission, if any.
    pub scope: Option<ScopeName>,
}

/// Static mapping from permission strings to action grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMap {
    /// Grants keyed by permission string.
    entries: BTreeMap<String, Vec<PermissionGrant>>,
}

impl PermissionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a grant and returns the map.
    #[must_use]
    pub fn grant(
        mut self,
        permission_string: impl Into<String>,
        permission: impl Into<PermissionKey>,
        scope: Option<&str>,
    ) -> Self {
        self.insert(
            permission_string,
            PermissionGrant {
                permission: permission.into(),
                scope: scope.map(ScopeName::from),
            },
        );
        self
    }

    /// Adds a grant.
    pub fn insert(&mut self, permission_string: impl Into<String>, grant: PermissionGrant) {
        self.entries.entry(permission_string.into()).or_default().push(grant);
    }

    /// Returns the grants configured for a permission string.
    #[must_use]
    pub fn grants_for(&self, permission_string: &str) -> &[PermissionGrant] {
        self.entries.get(permission_string).map_or(&[], Vec::as_slice)
    }

    /// Iterates over all configured entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PermissionGrant])> {
        self.entries.iter().map(|(name, grants)| (name.as_str(), grants.as_slice()))
    }

    /// Rejects scopes attached to non-CRUD action permissions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::ScopedCustomAction`] for the first offending grant.
    pub fn validate(&self) -> Result<(), AuthzError> {
        for grants in self.entries.values() {
            for grant in grants {
                check_grant(grant)?;
            }
        }
        Ok(())
    }
}

/// Fails when a custom action carries a scope.
fn check_grant(grant: &PermissionGrant) -> Result<(), AuthzError> {
    if grant.scope.is_none() {
        return Ok(());
    }
    let custom = grant
        .permission
        .parts()
        .is_none_or(|parts| PermissionAction::parse(parts.action).crud().is_none());
    if custom {
        return Err(AuthzError::ScopedCustomAction {
            permission: grant.permission.clone(),
        });
    }
    Ok(())
}

/// Parsed per-principal permission map: permission key to granted scopes.
pub type HeldPermissions = BTreeMap<PermissionKey, BTreeSet<ScopeName>>;

// ============================================================================
// SECTION: Scope Grants
// ============================================================================

/// De-duplicated scope names held for one (resource type, action) pair.
///
/// # Invariants
/// - Iteration is in lexical order, which fixes evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeGrants(BTreeSet<ScopeName>);

impl ScopeGrants {
    /// Returns the grant set holding only the builtin `all` scope.
    #[must_use]
    pub fn all() -> Self {
        Self(BTreeSet::from([ScopeName::all()]))
    }

    /// Returns true when the scope is granted.
    #[must_use]
    pub fn contains(&self, scope: &ScopeName) -> bool {
        self.0.contains(scope)
    }

    /// Returns true when no scope is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of granted scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over granted scopes in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeName> {
        self.0.iter()
    }

    /// Returns scope names as strings, for audit payloads.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl FromIterator<ScopeName> for ScopeGrants {
    fn from_iter<T: IntoIterator<Item = ScopeName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// SECTION: Grant Sources
// ============================================================================

/// Grant source that reads the permission strings carried by the principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalGrants;

impl GrantSource for PrincipalGrants {
    fn granted_permissions(&self, principal: &Principal) -> Result<BTreeSet<String>, StoreError> {
        Ok(principal.permissions.clone())
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves principals to scope grants.
#[derive(Clone)]
pub struct PermissionResolver {
    /// Configured permission map.
    map: Arc<PermissionMap>,
    /// Registry consulted for `perms_via` redirection.
    registry: Arc<ScopeRegistry>,
    /// Source of principal permission strings.
    grants: Arc<dyn GrantSource>,
}

impl PermissionResolver {
    /// Creates a resolver reading grants from the principal.
    #[must_use]
    pub fn new(map: Arc<PermissionMap>, registry: Arc<ScopeRegistry>) -> Self {
        Self {
            map,
            registry,
            grants: Arc::new(PrincipalGrants),
        }
    }

    /// Replaces the grant source.
    #[must_use]
    pub fn with_grant_source(mut self, grants: Arc<dyn GrantSource>) -> Self {
        self.grants = grants;
        self
    }

    /// Returns the configured permission map.
    #[must_use]
    pub fn permission_map(&self) -> &PermissionMap {
        &self.map
    }

    /// Resolves the scopes the request principal holds for an action.
    ///
    /// Marks the context as permission-checked before any lookup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Forbidden`] when the action permission is not
    /// held, [`AuthzError::ScopedCustomAction`] on a misconfigured map, and
    /// [`AuthzError::Store`] when grants cannot be loaded.
    pub fn resolve_grants(
        &self,
        ctx: &mut RequestContext,
        resource: &ResourceType,
        action: Action,
    ) -> Result<ScopeGrants, AuthzError> {
        ctx.mark_permission_checked();
        if ctx.principal().superuser {
            return Ok(ScopeGrants::all());
        }
        let principal = ctx.principal().id.clone();
        let key = self.registry.permission_resource(resource).permission_key(action.as_str());
        let held = self.held_permissions(ctx)?;
        match held.get(&key) {
            Some(scopes) => Ok(scopes.iter().cloned().collect()),
            None => Err(AuthzError::Forbidden {
                principal,
                permission: key,
            }),
        }
    }

    /// Returns true when the principal holds any of the permission keys.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError`] when the permission map cannot be parsed.
    pub fn has_any_permission(
        &self,
        ctx: &mut RequestContext,
        keys: &[PermissionKey],
    ) -> Result<bool, AuthzError> {
        if ctx.principal().superuser {
            return Ok(true);
        }
        let held = self.held_permissions(ctx)?;
        Ok(keys.iter().any(|key| held.contains_key(key)))
    }

    /// Returns the parsed permission map, parsing it on first use.
    fn held_permissions<'a>(
        &self,
        ctx: &'a mut RequestContext,
    ) -> Result<&'a HeldPermissions, AuthzError> {
        if ctx.held_permissions().is_none() {
            let held = self.parse(ctx.principal())?;
            ctx.cache_held_permissions(held);
        }
        ctx.held_permissions().ok_or_else(|| {
            AuthzError::Store(StoreError::Invalid("permission cache unavailable".to_string()))
        })
    }

    /// Parses the permission map for a principal.
    fn parse(&self, principal: &Principal) -> Result<HeldPermissions, AuthzError> {
        let mut strings = self.grants.granted_permissions(principal)?;
        strings.insert(DEFAULT_PERMISSION.to_string());
        let mut held = HeldPermissions::new();
        for name in &strings {
            for grant in self.map.grants_for(name) {
                check_grant(grant)?;
                let scopes = held.entry(grant.permission.clone()).or_default();
                if let Some(scope) = &grant.scope {
                    scopes.insert(scope.clone());
                }
            }
        }
        Ok(held)
    }
}
