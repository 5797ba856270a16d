// crates/scope-gate-core/src/core/action.rs
// ============================================================================
// Module: Scope Gate Actions
// Description: Action categories, permission actions, and request methods.
// Purpose: Classify requests into the four enforceable CRUD categories.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every scope decision is made for one of four action categories. Permission
//! keys may also name custom actions; those are holdable but never scoped.
//! Request methods map onto the categories the enforcement guard requires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Action Categories
// ============================================================================

/// Enforceable action category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read records.
    View,
    /// Create records.
    Add,
    /// Modify existing records.
    Change,
    /// Remove records.
    Delete,
}

impl Action {
    /// All action categories in canonical order.
    pub const ALL: [Self; 4] = [Self::View, Self::Add, Self::Change, Self::Delete];

    /// Returns the lowercase label used in permission keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }

    /// Parses a lowercase action label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "view" => Some(Self::View),
            "add" => Some(Self::Add),
            "change" => Some(Self::Change),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns true for categories that write data.
    #[must_use]
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::View)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action component of a permission key.
///
/// # Invariants
/// - `Custom` never holds one of the four CRUD labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionAction {
    /// One of the four scoped action categories.
    Crud(Action),
    /// Custom action (for example `export` or `undelete`); never scoped.
    Custom(String),
}

impl PermissionAction {
    /// Classifies an action label.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        Action::parse(label).map_or_else(|| Self::Custom(label.to_string()), Self::Crud)
    }

    /// Returns the label used in permission keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Crud(action) => action.as_str(),
            Self::Custom(label) => label,
        }
    }

    /// Returns the CRUD category when this is not a custom action.
    #[must_use]
    pub const fn crud(&self) -> Option<Action> {
        match self {
            Self::Crud(action) => Some(*action),
            Self::Custom(_) => None,
        }
    }
}

impl From<Action> for PermissionAction {
    fn from(value: Action) -> Self {
        Self::Crud(value)
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Request Methods
// ============================================================================

/// HTTP request method as seen by the enforcement guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// GET request.
    Get,
    /// HEAD request.
    Head,
    /// OPTIONS request.
    Options,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// PATCH request.
    Patch,
    /// DELETE request.
    Delete,
}

impl RequestMethod {
    /// Parses an HTTP method name (case-insensitive).
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns the canonical uppercase method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns true for read-only methods.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    /// Returns the action category implied by this method.
    #[must_use]
    pub const fn implied_action(self) -> Action {
        match self {
            Self::Get | Self::Head | Self::Options => Action::View,
            Self::Post => Action::Add,
            Self::Put | Self::Patch => Action::Change,
            Self::Delete => Action::Delete,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
