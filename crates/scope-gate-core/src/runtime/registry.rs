// crates/scope-gate-core/src/runtime/registry.rs
// ============================================================================
// Module: Scope Gate Registry
// Description: Per-resource scope rules resolved at request time.
// Purpose: Map (resource type, scope name) to a rule without name lookups.
// Dependencies: crate::core, crate::runtime::error
// ============================================================================

//! ## Overview
//! Scopes are registered per resource type at configuration time and are
//! read-only afterwards. Per-action scope handlers are stored in an explicit
//! table rather than discovered by method name.
//!
//! Resolution order for a scope name is: registered rule, then the builtin
//! `all` scope, then the resource's dynamic provider. Anything else is an
//! [`AuthzError::UnknownScope`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::Action;
use crate::core::Filter;
use crate::core::Principal;
use crate::core::Record;
use crate::core::RequestMethod;
use crate::core::ResourceType;
use crate::core::ScopeName;
use crate::core::Subset;
use crate::core::Values;
use crate::runtime::context::RequestContext;
use crate::runtime::error::AuthzError;
use crate::runtime::error::ScopeFnError;

// ============================================================================
// SECTION: Scope Context
// ============================================================================

/// Read-only request view handed to scope functions.
#[derive(Debug, Clone, Copy)]
pub struct ScopeContext<'a> {
    /// Principal the request is evaluated for.
    pub principal: &'a Principal,
    /// Resource type being scoped.
    pub resource: &'a ResourceType,
    /// Action category being decided.
    pub action: Action,
    /// Request method.
    pub method: RequestMethod,
    /// Request identifier when provided.
    pub request_id: Option<&'a str>,
}

impl<'a> ScopeContext<'a> {
    /// Builds a scope context from the request context.
    #[must_use]
    pub fn new(ctx: &'a RequestContext, resource: &'a ResourceType, action: Action) -> Self {
        Self {
            principal: ctx.principal(),
            resource,
            action,
            method: ctx.method(),
            request_id: ctx.request_id(),
        }
    }
}

/// Result of a view scope function.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewScope {
    /// Predicate pushed into the base query.
    Filter(Filter),
    /// Queryable subset unioned with the other subsets.
    Subset(Subset),
    /// The scope does not apply to this request.
    NoMatch,
}

// ============================================================================
// SECTION: Scope Functions
// ============================================================================

/// Request-parameterized predicate; `None` means the scope does not apply.
pub type DynamicScopeFn =
    Arc<dyn Fn(&ScopeContext<'_>) -> Result<Option<Filter>, ScopeFnError> + Send + Sync>;

/// View handler producing a filter or a queryable subset.
pub type ViewScopeFn =
    Arc<dyn Fn(&ScopeContext<'_>) -> Result<ViewScope, ScopeFnError> + Send + Sync>;

/// Write handler over a concrete record and the proposed values.
pub type RecordScopeFn =
    Arc<dyn Fn(&ScopeContext<'_>, &Record, &Values) -> Result<bool, ScopeFnError> + Send + Sync>;

/// Delete handler over a single-row queryable subset.
pub type SubsetScopeFn =
    Arc<dyn Fn(&ScopeContext<'_>, &Subset, &Values) -> Result<bool, ScopeFnError> + Send + Sync>;

/// Argument shape accepted by a delete handler.
#[derive(Clone)]
pub enum DeleteHandler {
    /// Accepts the concrete record.
    Object(RecordScopeFn),
    /// Accepts a single-row subset over the record's key.
    Subset(SubsetScopeFn),
    /// Migration form: the object handler runs first and the subset handler
    /// only runs when it errors.
    Either {
        /// Object-shaped handler.
        object: RecordScopeFn,
        /// Subset-shaped fallback.
        subset: SubsetScopeFn,
    },
}

impl fmt::Debug for DeleteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::Object(_) => "Object",
            Self::Subset(_) => "Subset",
            Self::Either {
                ..
            } => "Either",
        };
        f.debug_tuple("DeleteHandler").field(&shape).finish()
    }
}

/// Explicit per-action handler table for one scope.
#[derive(Clone, Default)]
pub struct ScopeHandlers {
    /// View handler.
    pub view: Option<ViewScopeFn>,
    /// Add handler.
    pub add: Option<RecordScopeFn>,
    /// Change handler.
    pub change: Option<RecordScopeFn>,
    /// Delete handler.
    pub delete: Option<DeleteHandler>,
}

impl ScopeHandlers {
    /// Creates an empty handler table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the view handler.
    #[must_use]
    pub fn view<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScopeContext<'_>) -> Result<ViewScope, ScopeFnError> + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(handler));
        self
    }

    /// Sets the add handler.
    #[must_use]
    pub fn add<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScopeContext<'_>, &Record, &Values) -> Result<bool, ScopeFnError>
            + Send
            + Sync
            + 'static,
    {
        self.add = Some(Arc::new(handler));
        self
    }

    /// Sets the change handler.
    #[must_use]
    pub fn change<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScopeContext<'_>, &Record, &Values) -> Result<bool, ScopeFnError>
            + Send
            + Sync
            + 'static,
    {
        self.change = Some(Arc::new(handler));
        self
    }

    /// Sets an object-shaped delete handler.
    #[must_use]
    pub fn delete<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScopeContext<'_>, &Record, &Values) -> Result<bool, ScopeFnError>
            + Send
            + Sync
            + 'static,
    {
        self.delete = Some(DeleteHandler::Object(Arc::new(handler)));
        self
    }

    /// Sets a subset-shaped delete handler.
    #[must_use]
    pub fn delete_subset<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ScopeContext<'_>, &Subset, &Values) -> Result<bool, ScopeFnError>
            + Send
            + Sync
            + 'static,
    {
        self.delete = Some(DeleteHandler::Subset(Arc::new(handler)));
        self
    }

    /// Sets an explicit delete handler.
    #[must_use]
    pub fn delete_handler(mut self, handler: DeleteHandler) -> Self {
        self.delete = Some(handler);
        self
    }
}

impl fmt::Debug for ScopeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandlers")
            .field("view", &self.view.is_some())
            .field("add", &self.add.is_some())
            .field("change", &self.change.is_some())
            .field("delete", &self.delete)
            .finish()
    }
}

// ============================================================================
// SECTION: Scope Rules
// ============================================================================

/// Named rule attached to a resource type.
#[derive(Clone)]
pub enum ScopeRule {
    /// Fixed predicate independent of the request.
    Static(Filter),
    /// Predicate produced from the request context.
    Dynamic(DynamicScopeFn),
    /// Explicit per-action handlers.
    Handlers(ScopeHandlers),
    /// AND of other scopes on the same resource; not defined for view.
    Composite(Vec<ScopeName>),
}

impl ScopeRule {
    /// Creates a dynamic rule from a closure.
    #[must_use]
    pub fn dynamic<F>(scope: F) -> Self
    where
        F: Fn(&ScopeContext<'_>) -> Result<Option<Filter>, ScopeFnError> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(scope))
    }

    /// Creates a composite rule from scope names.
    #[must_use]
    pub fn composite<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScopeName>,
    {
        Self::Composite(scopes.into_iter().map(Into::into).collect())
    }

    /// Returns the builtin `all` rule.
    #[must_use]
    pub const fn all() -> Self {
        Self::Static(Filter::Always)
    }
}

impl fmt::Debug for ScopeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(filter) => f.debug_tuple("Static").field(filter).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Handlers(handlers) => f.debug_tuple("Handlers").field(handlers).finish(),
            Self::Composite(scopes) => f.debug_tuple("Composite").field(scopes).finish(),
        }
    }
}

/// Fallback resolver for scope names that are not registered statically.
pub trait DynamicScopeProvider: Send + Sync {
    /// Derives a rule for the scope name, if this provider knows it.
    fn resolve(&self, resource: &ResourceType, scope: &ScopeName) -> Option<ScopeRule>;
}

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Configuration-time registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The same scope name was registered twice for a resource.
    #[error("scope {scope} registered twice on {resource}")]
    DuplicateScope {
        /// Resource type.
        resource: ResourceType,
        /// Scope name.
        scope: ScopeName,
    },
    /// The builtin `all` scope was redefined.
    #[error("scope `all` is builtin and cannot be redefined on {resource}")]
    ReservedScope {
        /// Resource type.
        resource: ResourceType,
    },
    /// A composite scope lists no members.
    #[error("composite scope {scope} on {resource} is empty")]
    EmptyComposite {
        /// Resource type.
        resource: ResourceType,
        /// Scope name.
        scope: ScopeName,
    },
    /// A scope name is empty.
    #[error("empty scope name on {resource}")]
    EmptyScopeName {
        /// Resource type.
        resource: ResourceType,
    },
    /// A resource type was registered twice.
    #[error("resource {resource} registered twice")]
    DuplicateResource {
        /// Resource type.
        resource: ResourceType,
    },
}

// ============================================================================
// SECTION: Resource Scopes
// ============================================================================

/// Scope rules for a single resource type.
#[derive(Clone)]
pub struct ResourceScopes {
    /// Resource type the rules belong to.
    resource: ResourceType,
    /// Registered rules by name.
    rules: BTreeMap<ScopeName, ScopeRule>,
    /// Resource whose permission keys gate this resource.
    perms_via: Option<ResourceType>,
    /// Fallback resolver for unregistered names.
    dynamic: Option<Arc<dyn DynamicScopeProvider>>,
}

impl ResourceScopes {
    /// Starts building scopes for a resource type.
    #[must_use]
    pub const fn builder(resource: ResourceType) -> ResourceScopesBuilder {
        ResourceScopesBuilder {
            resource,
            rules: Vec::new(),
            perms_via: None,
            dynamic: None,
        }
    }

    /// Returns the resource type.
    #[must_use]
    pub const fn resource(&self) -> &ResourceType {
        &self.resource
    }

    /// Returns the resource whose permission keys apply.
    #[must_use]
    pub fn permission_resource(&self) -> &ResourceType {
        self.perms_via.as_ref().unwrap_or(&self.resource)
    }

    /// Returns the registered scope names in lexical order.
    pub fn scope_names(&self) -> impl Iterator<Item = &ScopeName> {
        self.rules.keys()
    }
}

impl fmt::Debug for ResourceScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScopes")
            .field("resource", &self.resource)
            .field("rules", &self.rules)
            .field("perms_via", &self.perms_via)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}

/// Builder for [`ResourceScopes`].
pub struct ResourceScopesBuilder {
    /// Resource type the rules belong to.
    resource: ResourceType,
    /// Rules in registration order.
    rules: Vec<(ScopeName, ScopeRule)>,
    /// Resource whose permission keys gate this resource.
    perms_via: Option<ResourceType>,
    /// Fallback resolver for unregistered names.
    dynamic: Option<Arc<dyn DynamicScopeProvider>>,
}

impl fmt::Debug for ResourceScopesBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScopesBuilder")
            .field("resource", &self.resource)
            .field("rules", &self.rules)
            .field("perms_via", &self.perms_via)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}

impl ResourceScopesBuilder {
    /// Registers a named scope rule.
    #[must_use]
    pub fn scope(mut self, name: impl Into<ScopeName>, rule: ScopeRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    /// Gates this resource with another resource's permission keys.
    #[must_use]
    pub fn perms_via(mut self, resource: ResourceType) -> Self {
        self.perms_via = Some(resource);
        self
    }

    /// Installs a fallback resolver for unregistered scope names.
    #[must_use]
    pub fn dynamic(mut self, provider: Arc<dyn DynamicScopeProvider>) -> Self {
        self.dynamic = Some(provider);
        self
    }

    /// Validates and builds the resource scopes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on duplicate, reserved, empty, or malformed
    /// registrations.
    pub fn build(self) -> Result<ResourceScopes, RegistryError> {
        let mut rules = BTreeMap::new();
        for (name, rule) in self.rules {
            if name.as_str().is_empty() {
                return Err(RegistryError::EmptyScopeName {
                    resource: self.resource,
                });
            }
            if name.is_all() {
                return Err(RegistryError::ReservedScope {
                    resource: self.resource,
                });
            }
            if let ScopeRule::Composite(members) = &rule
                && members.is_empty()
            {
                return Err(RegistryError::EmptyComposite {
                    resource: self.resource,
                    scope: name,
                });
            }
            if rules.contains_key(&name) {
                return Err(RegistryError::DuplicateScope {
                    resource: self.resource,
                    scope: name,
                });
            }
            rules.insert(name, rule);
        }
        Ok(ResourceScopes {
            resource: self.resource,
            rules,
            perms_via: self.perms_via,
            dynamic: self.dynamic,
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable scope registry shared across requests.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    /// Scopes keyed by resource type.
    resources: BTreeMap<ResourceType, ResourceScopes>,
}

impl ScopeRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ScopeRegistryBuilder {
        ScopeRegistryBuilder {
            resources: BTreeMap::new(),
        }
    }

    /// Returns the scopes registered for a resource, if any.
    #[must_use]
    pub fn resource(&self, resource: &ResourceType) -> Option<&ResourceScopes> {
        self.resources.get(resource)
    }

    /// Returns the resource whose permission keys gate `resource`.
    #[must_use]
    pub fn permission_resource<'a>(&'a self, resource: &'a ResourceType) -> &'a ResourceType {
        self.resources.get(resource).map_or(resource, ResourceScopes::permission_resource)
    }

    /// Resolves a scope name for an action.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::UnknownScope`] when neither a registered rule, the
    /// builtin `all` scope, nor the dynamic provider supplies a rule.
    pub fn resolve(
        &self,
        resource: &ResourceType,
        scope: &ScopeName,
        action: Action,
    ) -> Result<ScopeRule, AuthzError> {
        let scopes = self.resources.get(resource);
        if let Some(rule) = scopes.and_then(|scopes| scopes.rules.get(scope)) {
            return Ok(rule.clone());
        }
        if scope.is_all() {
            return Ok(ScopeRule::all());
        }
        if let Some(rule) = scopes
            .and_then(|scopes| scopes.dynamic.as_ref())
            .and_then(|provider| provider.resolve(resource, scope))
        {
            return Ok(rule);
        }
        Err(AuthzError::UnknownScope {
            scope: scope.clone(),
            resource: resource.clone(),
            action,
        })
    }
}

/// Builder for [`ScopeRegistry`].
#[derive(Debug)]
pub struct ScopeRegistryBuilder {
    /// Scopes keyed by resource type.
    resources: BTreeMap<ResourceType, ResourceScopes>,
}

impl ScopeRegistryBuilder {
    /// Registers the scopes of one resource type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateResource`] when the resource type is
    /// already registered.
    pub fn register(mut self, scopes: ResourceScopes) -> Result<Self, RegistryError> {
        if self.resources.contains_key(&scopes.resource) {
            return Err(RegistryError::DuplicateResource {
                resource: scopes.resource,
            });
        }
        self.resources.insert(scopes.resource.clone(), scopes);
        Ok(self)
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> ScopeRegistry {
        ScopeRegistry {
            resources: self.resources,
        }
    }
}
