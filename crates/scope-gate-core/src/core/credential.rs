// crates/scope-gate-core/src/core/credential.rs
// ============================================================================
// Module: Scope Gate Credentials
// Description: Bearer credential records consumed by the token gate.
// Purpose: Describe token ownership and lifetime.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Credentials are created outside this crate. The token gate only reads them,
//! bumps `last_used_at`, and deletes them once expiry is discovered at use time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TokenValue;

// ============================================================================
// SECTION: Credential
// ============================================================================

/// Stored bearer credential.
///
/// # Invariants
/// - `expires_at` is never modified by authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque token value.
    pub token: TokenValue,
    /// Owning principal.
    pub owner: PrincipalId,
    /// Issue timestamp.
    pub issued_at: OffsetDateTime,
    /// Expiry timestamp.
    pub expires_at: OffsetDateTime,
    /// Last successful use, if any.
    pub last_used_at: Option<OffsetDateTime>,
}

impl Credential {
    /// Creates a credential that has never been used.
    #[must_use]
    pub const fn new(
        token: TokenValue,
        owner: PrincipalId,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            token,
            owner,
            issued_at,
            expires_at,
            last_used_at: None,
        }
    }

    /// Returns true when `now` is at or past the expiry timestamp.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}
