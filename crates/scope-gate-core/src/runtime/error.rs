// crates/scope-gate-core/src/runtime/error.rs
// ============================================================================
// Module: Scope Gate Authorization Errors
// Description: Error taxonomy shared by the resolver, evaluator, and guard.
// Purpose: Keep denials, configuration defects, and wiring defects distinct.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Callers must be able to tell a user-facing denial apart from a scope that
//! was never registered and from a handler that skipped its scope check.
//! [`AuthzError::kind`] exposes that classification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::Action;
use crate::core::PermissionKey;
use crate::core::PrincipalId;
use crate::core::RequestMethod;
use crate::core::ResourceType;
use crate::core::ScopeName;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Classification of [`AuthzError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzErrorKind {
    /// Principal was evaluated and denied; safe to surface.
    Denied,
    /// Scope configuration is wrong; a server error.
    Configuration,
    /// A handler path has no scope check or a collaborator failed.
    Defect,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authorization engine errors.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The principal does not hold the action permission at all.
    #[error("principal {principal} lacks permission {permission}")]
    Forbidden {
        /// Principal identifier.
        principal: PrincipalId,
        /// Missing permission key.
        permission: PermissionKey,
    },
    /// No granted scope allowed the action.
    #[error("principal {principal} is not allowed to {action} {resource}")]
    Scoping {
        /// Principal identifier.
        principal: PrincipalId,
        /// Resource type.
        resource: ResourceType,
        /// Action category.
        action: Action,
    },
    /// Scope name is neither registered nor dynamically resolvable.
    #[error("unknown scope {scope} on {resource} for {action}")]
    UnknownScope {
        /// Scope name.
        scope: ScopeName,
        /// Resource type.
        resource: ResourceType,
        /// Action category.
        action: Action,
    },
    /// Composite scope used where composition is not defined.
    #[error("scope composition is not implemented for view ({scope} on {resource})")]
    CompositionUnsupported {
        /// Composite scope name.
        scope: ScopeName,
        /// Resource type.
        resource: ResourceType,
    },
    /// Composite scopes nest deeper than allowed.
    #[error("scope composition too deep at {scope} on {resource}")]
    CompositionTooDeep {
        /// Scope name where the limit was hit.
        scope: ScopeName,
        /// Resource type.
        resource: ResourceType,
    },
    /// A custom (non-CRUD) action permission was configured with scopes.
    #[error("permission {permission} is not a CRUD action and may not carry scopes")]
    ScopedCustomAction {
        /// Offending permission key.
        permission: PermissionKey,
    },
    /// A scope function raised an error.
    #[error("scope {scope} on {resource} failed: {message}")]
    ScopeFailed {
        /// Scope name.
        scope: ScopeName,
        /// Resource type.
        resource: ResourceType,
        /// Error message from the scope function.
        message: String,
    },
    /// A successful request never recorded its required scope decision.
    #[error("permission check omitted for {method} request: {reason}")]
    PermissionCheckOmitted {
        /// Request method.
        method: RequestMethod,
        /// Missing decision description.
        reason: String,
    },
    /// Collaborator storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthzError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> AuthzErrorKind {
        match self {
            Self::Forbidden {
                ..
            }
            | Self::Scoping {
                ..
            } => AuthzErrorKind::Denied,
            Self::UnknownScope {
                ..
            }
            | Self::CompositionUnsupported {
                ..
            }
            | Self::CompositionTooDeep {
                ..
            }
            | Self::ScopedCustomAction {
                ..
            } => AuthzErrorKind::Configuration,
            Self::ScopeFailed {
                ..
            }
            | Self::PermissionCheckOmitted {
                ..
            }
            | Self::Store(_) => AuthzErrorKind::Defect,
        }
    }

    /// Returns a stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Forbidden {
                ..
            } => "Forbidden",
            Self::Scoping {
                ..
            } => "ScopingError",
            Self::UnknownScope {
                ..
            } => "UnknownScope",
            Self::CompositionUnsupported {
                ..
            } => "CompositionUnsupported",
            Self::CompositionTooDeep {
                ..
            } => "CompositionTooDeep",
            Self::ScopedCustomAction {
                ..
            } => "ScopedCustomAction",
            Self::ScopeFailed {
                ..
            } => "ScopeFailed",
            Self::PermissionCheckOmitted {
                ..
            } => "PermissionCheckOmitted",
            Self::Store(_) => "StoreError",
        }
    }
}

// ============================================================================
// SECTION: Scope Function Errors
// ============================================================================

/// Error raised by a user-supplied scope function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScopeFnError(pub String);

impl ScopeFnError {
    /// Creates a scope function error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<StoreError> for ScopeFnError {
    fn from(value: StoreError) -> Self {
        Self(value.to_string())
    }
}
