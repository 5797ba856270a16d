// crates/scope-gate-config/src/config.rs
// ============================================================================
// Module: Scope Gate Configuration
// Description: Configuration loading and validation for Scope Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: scope-gate-core, scope-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. A validated config converts
//! into the core [`PermissionMap`] and [`TokenAuthSettings`], and builds the
//! configured audit sink, credential backend, and relation scopes.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use scope_gate_core::AuditSink;
use scope_gate_core::CredentialStore;
use scope_gate_core::FieldPath;
use scope_gate_core::FileAuditSink;
use scope_gate_core::InMemoryCredentialStore;
use scope_gate_core::InMemoryPrincipalDirectory;
use scope_gate_core::NoopAuditSink;
use scope_gate_core::PermissionAction;
use scope_gate_core::PermissionKey;
use scope_gate_core::PermissionMap;
use scope_gate_core::PrincipalDirectory;
use scope_gate_core::RelatedRecords;
use scope_gate_core::RelationScopes;
use scope_gate_core::ResourceType;
use scope_gate_core::ScopeName;
use scope_gate_core::StderrAuditSink;
use scope_gate_core::TokenAuthSettings;
use scope_gate_core::TokenAuthenticator;
use scope_gate_core::runtime::DEFAULT_MAX_HEADER_BYTES;
use scope_gate_core::runtime::DEFAULT_TOKEN_SCHEME;
use scope_gate_core::runtime::PermissionGrant;
use scope_gate_store_sqlite::SqliteCredentialStore;
use scope_gate_store_sqlite::SqliteStoreConfig;
use scope_gate_store_sqlite::SqliteStoreMode;
use scope_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "scope-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "SCOPE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured permission strings.
pub(crate) const MAX_PERMISSION_STRINGS: usize = 1024;
/// Maximum number of grants under one permission string.
pub(crate) const MAX_GRANTS_PER_PERMISSION: usize = 256;
/// Maximum length of a permission string or permission key.
pub(crate) const MAX_PERMISSION_LENGTH: usize = 256;
/// Maximum length of a scope name.
pub(crate) const MAX_SCOPE_NAME_LENGTH: usize = 128;
/// Maximum length of the token scheme.
pub(crate) const MAX_SCHEME_LENGTH: usize = 64;
/// Maximum length of the authorization header name.
pub(crate) const MAX_HEADER_NAME_LENGTH: usize = 128;
/// Largest accepted `token_auth.max_header_bytes`.
pub(crate) const MAX_HEADER_BYTES_LIMIT: usize = 64 * 1024;
/// Default authorization header name.
pub(crate) const DEFAULT_AUTH_HEADER: &str = "Authorization";
/// Maximum number of relation scope entries.
pub(crate) const MAX_RELATIONS: usize = 256;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Minimum `SQLite` busy timeout in milliseconds.
pub(crate) const MIN_STORE_BUSY_TIMEOUT_MS: u64 = 10;
/// Maximum `SQLite` busy timeout in milliseconds.
pub(crate) const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Scope Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeGateConfig {
    /// Permission strings mapped to action grants.
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<PermissionGrantConfig>>,
    /// Token authentication gate settings.
    #[serde(default)]
    pub token_auth: TokenAuthConfig,
    /// Credential store backend.
    #[serde(default)]
    pub credential_store: CredentialStoreConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Relation scopes keyed by resource type.
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

impl ScopeGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_permissions(&self.permissions)?;
        self.token_auth.validate()?;
        self.credential_store.validate()?;
        self.audit.validate()?;
        validate_relations(&self.relations)?;
        Ok(())
    }

    /// Builds the permission map.
    #[must_use]
    pub fn permission_map(&self) -> PermissionMap {
        let mut map = PermissionMap::new();
        for (name, grants) in &self.permissions {
            for grant in grants {
                map.insert(
                    name.clone(),
                    PermissionGrant {
                        permission: PermissionKey::new(grant.permission.trim()),
                        scope: grant.scope.as_deref().map(|scope| ScopeName::new(scope.trim())),
                    },
                );
            }
        }
        map
    }

    /// Builds a token gate over an opened credential backend and the
    /// configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit sink cannot be opened.
    pub fn token_authenticator(
        &self,
        backend: &CredentialBackend,
    ) -> Result<TokenAuthenticator, ConfigError> {
        let audit = self.audit.build_sink()?;
        Ok(TokenAuthenticator::new(
            backend.credential_store(),
            backend.principal_directory(),
            self.token_auth.settings(),
        )
        .with_audit(audit))
    }

    /// Builds the relation scopes configured for `resource`.
    ///
    /// Returns `None` when no relation is configured for the resource type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a configured relation is malformed.
    pub fn relation_scopes(
        &self,
        resource: &ResourceType,
        related: Arc<dyn RelatedRecords>,
    ) -> Result<Option<RelationScopes>, ConfigError> {
        let mut scopes: Option<RelationScopes> = None;
        for relation in &self.relations {
            let parsed = relation.parse()?;
            if &parsed.resource != resource {
                continue;
            }
            let current = scopes.take().unwrap_or_else(|| RelationScopes::new(related.clone()));
            scopes = Some(current.relation(parsed.scope, parsed.path));
        }
        Ok(scopes)
    }
}

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// One grant under a permission string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionGrantConfig {
    /// Action permission key (`app.action_model`).
    pub permission: String,
    /// Optional scope narrowing the grant.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Validates the permission table.
fn validate_permissions(
    permissions: &BTreeMap<String, Vec<PermissionGrantConfig>>,
) -> Result<(), ConfigError> {
    if permissions.len() > MAX_PERMISSION_STRINGS {
        return Err(ConfigError::Invalid(format!(
            "permissions exceeds max entries ({MAX_PERMISSION_STRINGS})"
        )));
    }
    for (name, grants) in permissions {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed != name {
            return Err(ConfigError::Invalid(
                "permission strings must be non-empty without surrounding whitespace".to_string(),
            ));
        }
        if name.len() > MAX_PERMISSION_LENGTH {
            return Err(ConfigError::Invalid(format!("permission string {name} too long")));
        }
        if grants.len() > MAX_GRANTS_PER_PERMISSION {
            return Err(ConfigError::Invalid(format!(
                "permissions.{name} exceeds max grants ({MAX_GRANTS_PER_PERMISSION})"
            )));
        }
        for grant in grants {
            validate_grant(name, grant)?;
        }
    }
    Ok(())
}

/// Validates a single grant: key shape, scope name, and CRUD-only scopes.
fn validate_grant(name: &str, grant: &PermissionGrantConfig) -> Result<(), ConfigError> {
    let key = PermissionKey::new(grant.permission.trim());
    if key.as_str().len() > MAX_PERMISSION_LENGTH {
        return Err(ConfigError::Invalid(format!("permissions.{name}: permission key too long")));
    }
    let Some(parts) = key.parts() else {
        return Err(ConfigError::Invalid(format!(
            "permissions.{name}: invalid permission key `{key}`, expected app.action_model"
        )));
    };
    let Some(scope) = &grant.scope else {
        return Ok(());
    };
    validate_scope_name(&format!("permissions.{name}.scope"), scope)?;
    if PermissionAction::parse(parts.action).crud().is_none() {
        return Err(ConfigError::Invalid(format!(
            "permissions.{name}: custom action `{key}` cannot carry a scope"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Token Auth
// ============================================================================

/// Token authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenAuthConfig {
    /// Scheme prefix expected before the token value.
    #[serde(default = "default_token_scheme")]
    pub scheme: String,
    /// Header carrying the token.
    #[serde(default = "default_auth_header")]
    pub header: String,
    /// Headers longer than this carry no token.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            scheme: default_token_scheme(),
            header: default_auth_header(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}

impl TokenAuthConfig {
    /// Validates token auth settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheme.is_empty() || self.scheme.len() > MAX_SCHEME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "token_auth.scheme must be 1 to {MAX_SCHEME_LENGTH} characters"
            )));
        }
        if !self.scheme.bytes().all(is_header_token_byte) {
            return Err(ConfigError::Invalid(
                "token_auth.scheme must be a single token without whitespace".to_string(),
            ));
        }
        if self.header.is_empty() || self.header.len() > MAX_HEADER_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "token_auth.header must be 1 to {MAX_HEADER_NAME_LENGTH} characters"
            )));
        }
        if !self.header.bytes().all(is_header_token_byte) {
            return Err(ConfigError::Invalid(
                "token_auth.header must be a valid header name".to_string(),
            ));
        }
        if self.max_header_bytes <= self.scheme.len() + 1
            || self.max_header_bytes > MAX_HEADER_BYTES_LIMIT
        {
            return Err(ConfigError::Invalid(format!(
                "token_auth.max_header_bytes must exceed the scheme length and be at most \
                 {MAX_HEADER_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Converts to core gate settings.
    #[must_use]
    pub fn settings(&self) -> TokenAuthSettings {
        TokenAuthSettings {
            scheme: self.scheme.clone(),
            max_header_bytes: self.max_header_bytes,
        }
    }
}

/// Returns the default token scheme.
fn default_token_scheme() -> String {
    DEFAULT_TOKEN_SCHEME.to_string()
}

/// Returns the default authorization header name.
fn default_auth_header() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

/// Returns the default header size limit.
const fn default_max_header_bytes() -> usize {
    DEFAULT_MAX_HEADER_BYTES
}

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Credential store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: CredentialStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for CredentialStoreConfig {
    fn default() -> Self {
        Self {
            store_type: CredentialStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl CredentialStoreConfig {
    /// Validates credential store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            CredentialStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory credential_store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            CredentialStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite credential_store requires path".to_string())
                })?;
                validate_store_path(path)?;
                validate_timeout_range(
                    "credential_store.busy_timeout_ms",
                    self.busy_timeout_ms,
                    MIN_STORE_BUSY_TIMEOUT_MS,
                    MAX_STORE_BUSY_TIMEOUT_MS,
                )
            }
        }
    }

    /// Opens the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the sqlite store cannot be opened.
    pub fn build(&self) -> Result<CredentialBackend, ConfigError> {
        match self.store_type {
            CredentialStoreType::Memory => Ok(CredentialBackend::Memory {
                credentials: InMemoryCredentialStore::new(),
                principals: InMemoryPrincipalDirectory::new(),
            }),
            CredentialStoreType::Sqlite => {
                let path = self.path.clone().ok_or_else(|| {
                    ConfigError::Invalid("sqlite credential_store requires path".to_string())
                })?;
                let config = SqliteStoreConfig {
                    path,
                    busy_timeout_ms: self.busy_timeout_ms,
                    journal_mode: self.journal_mode,
                    sync_mode: self.sync_mode,
                };
                let store = SqliteCredentialStore::new(&config)
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(CredentialBackend::Sqlite(store))
            }
        }
    }
}

/// Returns the default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Opened credential backend.
#[derive(Clone)]
pub enum CredentialBackend {
    /// In-memory credentials and principals.
    Memory {
        /// Credential store.
        credentials: InMemoryCredentialStore,
        /// Principal directory.
        principals: InMemoryPrincipalDirectory,
    },
    /// `SQLite` store serving both roles.
    Sqlite(SqliteCredentialStore),
}

impl CredentialBackend {
    /// Returns the credential store handle.
    #[must_use]
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match self {
            Self::Memory {
                credentials,
                ..
            } => Arc::new(credentials.clone()),
            Self::Sqlite(store) => Arc::new(store.clone()),
        }
    }

    /// Returns the principal directory handle.
    #[must_use]
    pub fn principal_directory(&self) -> Arc<dyn PrincipalDirectory> {
        match self {
            Self::Memory {
                principals,
                ..
            } => Arc::new(principals.clone()),
            Self::Sqlite(store) => Arc::new(store.clone()),
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkType::Stderr | AuditSinkType::None, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid for the file sink".to_string(),
            )),
            (AuditSinkType::Stderr | AuditSinkType::None, None) => Ok(()),
        }
    }

    /// Builds the configured sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match self.sink {
            AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkType::File => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires path".to_string())
                })?;
                let sink =
                    FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }
}

// ============================================================================
// SECTION: Relations
// ============================================================================

/// Relation scope entry: a scope name bound to a relationship path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationConfig {
    /// Resource type label (`app.model`).
    pub resource: String,
    /// Scope name.
    pub scope: String,
    /// Relationship path (`.` or `__` separated).
    pub path: String,
}

/// Parsed relation entry.
struct ParsedRelation {
    /// Resource type.
    resource: ResourceType,
    /// Scope name.
    scope: ScopeName,
    /// Relationship path.
    path: FieldPath,
}

impl RelationConfig {
    /// Parses the entry into core types.
    fn parse(&self) -> Result<ParsedRelation, ConfigError> {
        let resource = ResourceType::parse(self.resource.trim()).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "relations: invalid resource `{}`, expected app.model",
                self.resource
            ))
        })?;
        validate_scope_name("relations.scope", &self.scope)?;
        let scope = ScopeName::new(self.scope.trim());
        if scope.is_all() {
            return Err(ConfigError::Invalid(format!(
                "relations: scope `all` is builtin and cannot be bound on {resource}"
            )));
        }
        let path = FieldPath::parse(self.path.trim()).ok_or_else(|| {
            ConfigError::Invalid(format!("relations: invalid path `{}`", self.path))
        })?;
        Ok(ParsedRelation {
            resource,
            scope,
            path,
        })
    }
}

/// Validates relation entries and rejects duplicate bindings.
fn validate_relations(relations: &[RelationConfig]) -> Result<(), ConfigError> {
    if relations.len() > MAX_RELATIONS {
        return Err(ConfigError::Invalid(format!(
            "relations exceeds max entries ({MAX_RELATIONS})"
        )));
    }
    let mut seen = BTreeSet::new();
    for relation in relations {
        let parsed = relation.parse()?;
        if !seen.insert((parsed.resource.to_string(), parsed.scope.to_string())) {
            return Err(ConfigError::Invalid(format!(
                "relations: duplicate scope {} on {}",
                parsed.scope, parsed.resource
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a backend.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates credential store paths against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("credential_store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("credential_store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(
                "credential_store path component too long".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates that a timeout lies within an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Validates a scope name: ASCII letters, digits, and underscores.
fn validate_scope_name(field: &str, name: &str) -> Result<(), ConfigError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_SCOPE_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} exceeds {MAX_SCOPE_NAME_LENGTH} characters"
        )));
    }
    if !trimmed.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
        return Err(ConfigError::Invalid(format!(
            "{field} `{trimmed}` must contain only letters, digits, and underscores"
        )));
    }
    Ok(())
}

/// Returns true for RFC 9110 `tchar` bytes.
const fn is_header_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
