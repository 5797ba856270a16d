// crates/scope-gate-core/src/audit.rs
// ============================================================================
// Module: Scope Gate Audit Logging
// Description: Structured audit events for scope decisions and token checks.
// Purpose: Emit redacted JSON-line audit logs without a global logger.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Every allow and deny made by the evaluator, every token authentication
//! outcome, and every enforcement violation is emitted as one JSON line through
//! an [`AuditSink`]. Raw token values never appear in events; a sha256
//! fingerprint is logged instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::core::Action;
use crate::core::TokenValue;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Scope decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Principal identifier.
    pub principal_id: String,
    /// Resource type label (`app.model`).
    pub resource: String,
    /// Action category.
    pub action: Action,
    /// Whether the action was allowed.
    pub allowed: bool,
    /// Scopes that were evaluated.
    pub scopes: Vec<String>,
    /// Denial or error reason when not allowed.
    pub reason: Option<String>,
}

/// Inputs required to construct a scope audit event.
pub struct ScopeAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Principal identifier.
    pub principal_id: String,
    /// Resource type label.
    pub resource: String,
    /// Action category.
    pub action: Action,
    /// Whether the action was allowed.
    pub allowed: bool,
    /// Scopes that were evaluated.
    pub scopes: Vec<String>,
    /// Denial or error reason when not allowed.
    pub reason: Option<String>,
}

/// Deprecated subset fallback audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Resource type label.
    pub resource: String,
    /// Scope whose object handler failed.
    pub scope: String,
    /// Error raised by the object handler.
    pub message: String,
}

/// Token authentication audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct TokenAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Outcome label (`authenticated`, `not_found`, `expired`, `error`).
    pub outcome: &'static str,
    /// Sha256 fingerprint of the presented token.
    pub token_fingerprint: String,
    /// Principal bound to the request on success.
    pub principal_id: Option<String>,
    /// Machine-readable error code on failure.
    pub error_code: Option<&'static str>,
}

/// Enforcement violation audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct EnforcementAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Request method.
    pub method: String,
    /// Missing decision description.
    pub reason: String,
}

impl ScopeAuditEvent {
    /// Creates a new scope audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: ScopeAuditEventParams) -> Self {
        Self {
            event: "scope_decision",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            principal_id: params.principal_id,
            resource: params.resource,
            action: params.action,
            allowed: params.allowed,
            scopes: params.scopes,
            reason: params.reason,
        }
    }
}

impl FallbackAuditEvent {
    /// Creates a new fallback audit event.
    #[must_use]
    pub fn new(
        request_id: Option<String>,
        resource: String,
        scope: String,
        message: String,
    ) -> Self {
        Self {
            event: "scope_subset_fallback",
            timestamp_ms: now_ms(),
            request_id,
            resource,
            scope,
            message,
        }
    }
}

impl TokenAuditEvent {
    /// Creates a new token audit event; the token is fingerprinted.
    #[must_use]
    pub fn new(
        outcome: &'static str,
        token: &TokenValue,
        principal_id: Option<String>,
        error_code: Option<&'static str>,
    ) -> Self {
        Self {
            event: "token_auth",
            timestamp_ms: now_ms(),
            outcome,
            token_fingerprint: token_fingerprint(token),
            principal_id,
            error_code,
        }
    }
}

impl EnforcementAuditEvent {
    /// Creates a new enforcement audit event.
    #[must_use]
    pub fn new(request_id: Option<String>, method: String, reason: String) -> Self {
        Self {
            event: "enforcement_violation",
            timestamp_ms: now_ms(),
            request_id,
            method,
            reason,
        }
    }
}

/// Returns milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns the lowercase hex sha256 digest of a token value.
#[must_use]
pub fn token_fingerprint(token: &TokenValue) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(token.as_str().as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for scope and authentication events.
pub trait AuditSink: Send + Sync {
    /// Record a scope decision.
    fn record_scope(&self, event: &ScopeAuditEvent);

    /// Record a deprecated subset fallback.
    fn record_fallback(&self, _event: &FallbackAuditEvent) {}

    /// Record a token authentication outcome.
    fn record_token(&self, event: &TokenAuditEvent);

    /// Record an enforcement violation.
    fn record_enforcement(&self, event: &EnforcementAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event as a JSON line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_scope(&self, event: &ScopeAuditEvent) {
        Self::emit(event);
    }

    fn record_fallback(&self, event: &FallbackAuditEvent) {
        Self::emit(event);
    }

    fn record_token(&self, event: &TokenAuditEvent) {
        Self::emit(event);
    }

    fn record_enforcement(&self, event: &EnforcementAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event as a JSON line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_scope(&self, event: &ScopeAuditEvent) {
        self.emit(event);
    }

    fn record_fallback(&self, event: &FallbackAuditEvent) {
        self.emit(event);
    }

    fn record_token(&self, event: &TokenAuditEvent) {
        self.emit(event);
    }

    fn record_enforcement(&self, event: &EnforcementAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_scope(&self, _event: &ScopeAuditEvent) {}

    fn record_token(&self, _event: &TokenAuditEvent) {}

    fn record_enforcement(&self, _event: &EnforcementAuditEvent) {}
}

/// Audit sink that keeps events in memory for tests and local tooling.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured events as JSON values.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns captured events with the given `event` label.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Captures one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_scope(&self, event: &ScopeAuditEvent) {
        self.push(event);
    }

    fn record_fallback(&self, event: &FallbackAuditEvent) {
        self.push(event);
    }

    fn record_token(&self, event: &TokenAuditEvent) {
        self.push(event);
    }

    fn record_enforcement(&self, event: &EnforcementAuditEvent) {
        self.push(event);
    }
}
