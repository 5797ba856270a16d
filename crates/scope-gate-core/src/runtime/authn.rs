// crates/scope-gate-core/src/runtime/authn.rs
// ============================================================================
// Module: Scope Gate Token Authentication
// Description: Bearer token gate that binds a principal to the request.
// Purpose: Resolve `Token <value>` headers with lazy, single-use expiry.
// Dependencies: crate::{audit, core, interfaces, runtime}, serde_json, time
// ============================================================================

//! ## Overview
//! The gate runs once per request, before any scoping:
//! 1. an already authenticated request passes through;
//! 2. a missing header, or one without the expected scheme, stays anonymous;
//! 3. an unknown token is rejected as not found;
//! 4. an expired token is deleted, then rejected as expired;
//! 5. a valid token binds its owner, refreshes `last_used_at`, and exempts the
//!    request from anti-forgery checks.
//!
//! Expiry is discovered at use time. The delete in step 4 is unconditional
//! and idempotent, so a retried request sees "not found".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::audit::AuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::TokenAuditEvent;
use crate::core::PrincipalId;
use crate::core::TokenValue;
use crate::interfaces::Clock;
use crate::interfaces::CredentialStore;
use crate::interfaces::PrincipalDirectory;
use crate::interfaces::StoreError;
use crate::runtime::clock::SystemClock;
use crate::runtime::context::RequestContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default authorization scheme.
pub const DEFAULT_TOKEN_SCHEME: &str = "Token";

/// Default maximum header size accepted for token parsing.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Expiry timestamp format (`%Y-%m-%dT%H:%M:%S.%f%z`).
#[rustfmt::skip]
const EXPIRY_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory][offset_minute]");

// ============================================================================
// SECTION: State
// ============================================================================

/// Authentication state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No principal bound; the request continues anonymously.
    Unauthenticated,
    /// A token was presented and is being resolved.
    Resolving,
    /// A principal is bound to the request.
    Authenticated,
}

/// Token gate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAuthSettings {
    /// Scheme prefix expected before the token value.
    pub scheme: String,
    /// Headers longer than this are treated as carrying no token.
    pub max_header_bytes: usize,
}

impl Default for TokenAuthSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_TOKEN_SCHEME.to_string(),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token authentication failures.
#[derive(Debug, Error)]
pub enum TokenAuthError {
    /// The presented token does not exist.
    #[error("token not found")]
    NotFound {
        /// Presented token.
        token: TokenValue,
    },
    /// The token expired; it has been deleted.
    #[error("token expired")]
    Expired {
        /// Presented token.
        token: TokenValue,
        /// Original expiry timestamp.
        expired_at: OffsetDateTime,
    },
    /// The token's owner no longer exists.
    #[error("token owner {owner} not found")]
    OwnerMissing {
        /// Owning principal identifier.
        owner: PrincipalId,
    },
    /// Credential storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenAuthError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound {
                ..
            } => "TokenNotFound",
            Self::Expired {
                ..
            } => "TokenExpired",
            Self::OwnerMissing {
                ..
            }
            | Self::Store(_) => "InternalError",
        }
    }

    /// Returns the HTTP status code for the error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound {
                ..
            } => 404,
            Self::Expired {
                ..
            } => 400,
            Self::OwnerMissing {
                ..
            }
            | Self::Store(_) => 500,
        }
    }

    /// Returns the structured error body.
    ///
    /// Internal failures do not echo storage details.
    #[must_use]
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("code".to_string(), Value::from(self.code()));
        match self {
            Self::NotFound {
                token,
            } => {
                body.insert("message".to_string(), Value::from("Token not found."));
                body.insert("token".to_string(), Value::from(token.as_str()));
            }
            Self::Expired {
                token,
                expired_at,
            } => {
                body.insert("message".to_string(), Value::from("Token expired."));
                body.insert("token".to_string(), Value::from(token.as_str()));
                body.insert("expired_at".to_string(), Value::from(format_expiry(*expired_at)));
            }
            Self::OwnerMissing {
                ..
            }
            | Self::Store(_) => {
                body.insert("message".to_string(), Value::from("Authentication failed."));
            }
        }
        Value::Object(body)
    }
}

/// Formats an expiry timestamp as `%Y-%m-%dT%H:%M:%S.%f%z`.
#[must_use]
pub fn format_expiry(at: OffsetDateTime) -> String {
    at.format(EXPIRY_FORMAT).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Bearer token authentication gate.
#[derive(Clone)]
pub struct TokenAuthenticator {
    /// Credential storage.
    credentials: Arc<dyn CredentialStore>,
    /// Principal lookups for token owners.
    principals: Arc<dyn PrincipalDirectory>,
    /// Clock used for expiry and `last_used_at`.
    clock: Arc<dyn Clock>,
    /// Audit sink for outcomes.
    audit: Arc<dyn AuditSink>,
    /// Gate settings.
    settings: TokenAuthSettings,
}

impl TokenAuthenticator {
    /// Creates a gate using the system clock and no audit sink.
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        principals: Arc<dyn PrincipalDirectory>,
        settings: TokenAuthSettings,
    ) -> Self {
        Self {
            credentials,
            principals,
            clock: Arc::new(SystemClock),
            audit: Arc::new(NoopAuditSink),
            settings,
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the gate settings.
    #[must_use]
    pub const fn settings(&self) -> &TokenAuthSettings {
        &self.settings
    }

    /// Extracts the token from an authorization header value.
    ///
    /// Returns `None` when the header is oversized or uses another scheme.
    #[must_use]
    pub fn parse_header<'a>(&self, header: &'a str) -> Option<&'a str> {
        if header.len() > self.settings.max_header_bytes {
            return None;
        }
        header.strip_prefix(self.settings.scheme.as_str())?.strip_prefix(' ')
    }

    /// Runs the gate for one request.
    ///
    /// # Errors
    ///
    /// Returns [`TokenAuthError`] when the presented token is unknown,
    /// expired, orphaned, or cannot be checked.
    pub fn authenticate(
        &self,
        ctx: &mut RequestContext,
        header: Option<&str>,
    ) -> Result<AuthState, TokenAuthError> {
        if ctx.is_authenticated() {
            return Ok(AuthState::Authenticated);
        }
        let Some(raw) = header.and_then(|header| self.parse_header(header)) else {
            return Ok(AuthState::Unauthenticated);
        };
        let token = TokenValue::new(raw);
        let outcome = self.resolve(ctx, &token);
        match &outcome {
            Ok(_) => self.audit.record_token(&TokenAuditEvent::new(
                "authenticated",
                &token,
                Some(ctx.principal().id.to_string()),
                None,
            )),
            Err(err) => {
                let label = match err {
                    TokenAuthError::NotFound {
                        ..
                    } => "not_found",
                    TokenAuthError::Expired {
                        ..
                    } => "expired",
                    TokenAuthError::OwnerMissing {
                        ..
                    }
                    | TokenAuthError::Store(_) => "error",
                };
                self.audit.record_token(&TokenAuditEvent::new(
                    label,
                    &token,
                    None,
                    Some(err.code()),
                ));
            }
        }
        outcome
    }

    /// Resolves a presented token (the `Resolving` state).
    fn resolve(
        &self,
        ctx: &mut RequestContext,
        token: &TokenValue,
    ) -> Result<AuthState, TokenAuthError> {
        let Some(credential) = self.credentials.find(token)? else {
            return Err(TokenAuthError::NotFound {
                token: token.clone(),
            });
        };
        let now = self.clock.now();
        if credential.is_expired(now) {
            self.credentials.delete_if_exists(token)?;
            return Err(TokenAuthError::Expired {
                token: token.clone(),
                expired_at: credential.expires_at,
            });
        }
        let Some(principal) = self.principals.load(&credential.owner)? else {
            return Err(TokenAuthError::OwnerMissing {
                owner: credential.owner,
            });
        };
        self.credentials.touch(token, now)?;
        ctx.authenticate(principal);
        ctx.mark_csrf_exempt();
        Ok(AuthState::Authenticated)
    }
}
