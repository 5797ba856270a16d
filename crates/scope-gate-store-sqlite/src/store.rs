// crates/scope-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Credential Store
// Description: Durable CredentialStore and PrincipalDirectory backed by SQLite.
// Purpose: Persist tokens and principals with versioned schema checks.
// Dependencies: scope-gate-core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! This module implements [`CredentialStore`] and [`PrincipalDirectory`] on a
//! single `SQLite` connection. Timestamps are stored as unix nanoseconds in
//! UTC. Expired tokens are never swept here; the token gate deletes them
//! lazily on presentation through [`CredentialStore::delete_if_exists`].
//! Security posture: database contents are untrusted and decode failures
//! surface as [`StoreError::Corrupt`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use scope_gate_core::Credential;
use scope_gate_core::CredentialStore;
use scope_gate_core::Principal;
use scope_gate_core::PrincipalDirectory;
use scope_gate_core::PrincipalId;
use scope_gate_core::StoreError;
use scope_gate_core::TokenValue;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` credential store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error into [`SqliteStoreError::Db`].
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed credential store and principal directory.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Opens an `SQLite`-backed credential store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or carries an unsupported schema version.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Inserts or replaces a principal.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn insert_principal(&self, principal: &Principal) -> Result<(), SqliteStoreError> {
        let permissions = serde_json::to_string(&principal.permissions)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO principals (principal_id, superuser, permissions_json) VALUES (?1, \
                 ?2, ?3) ON CONFLICT(principal_id) DO UPDATE SET superuser = excluded.superuser, \
                 permissions_json = excluded.permissions_json",
                params![principal.id.as_str(), principal.superuser, permissions],
            )
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Inserts or replaces a credential.
    ///
    /// The owner is not checked; a token may outlive its principal.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a timestamp is out of range or the
    /// write fails.
    pub fn insert_credential(&self, credential: &Credential) -> Result<(), SqliteStoreError> {
        let issued_at = to_unix_nanos(credential.issued_at)?;
        let expires_at = to_unix_nanos(credential.expires_at)?;
        let last_used_at = credential.last_used_at.map(to_unix_nanos).transpose()?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO tokens (token, principal_id, issued_at, expires_at, last_used_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(token) DO UPDATE SET principal_id = \
                 excluded.principal_id, issued_at = excluded.issued_at, expires_at = \
                 excluded.expires_at, last_used_at = excluded.last_used_at",
                params![
                    credential.token.as_str(),
                    credential.owner.as_str(),
                    issued_at,
                    expires_at,
                    last_used_at
                ],
            )
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Loads a credential row.
    fn find_credential(&self, token: &TokenValue) -> Result<Option<Credential>, SqliteStoreError> {
        let row = {
            let guard = self.lock()?;
            guard
                .query_row(
                    "SELECT principal_id, issued_at, expires_at, last_used_at FROM tokens WHERE \
                     token = ?1",
                    params![token.as_str()],
                    |row| {
                        let owner: String = row.get(0)?;
                        let issued_at: i64 = row.get(1)?;
                        let expires_at: i64 = row.get(2)?;
                        let last_used_at: Option<i64> = row.get(3)?;
                        Ok((owner, issued_at, expires_at, last_used_at))
                    },
                )
                .optional()
                .map_err(|err| db_error(&err))?
        };
        let Some((owner, issued_at, expires_at, last_used_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Credential {
            token: token.clone(),
            owner: PrincipalId::new(owner),
            issued_at: from_unix_nanos(issued_at)?,
            expires_at: from_unix_nanos(expires_at)?,
            last_used_at: last_used_at.map(from_unix_nanos).transpose()?,
        }))
    }

    /// Deletes a credential row.
    fn delete_credential(&self, token: &TokenValue) -> Result<bool, SqliteStoreError> {
        let guard = self.lock()?;
        let deleted = guard
            .execute("DELETE FROM tokens WHERE token = ?1", params![token.as_str()])
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(deleted > 0)
    }

    /// Updates only the `last_used_at` column.
    fn touch_credential(
        &self,
        token: &TokenValue,
        at: OffsetDateTime,
    ) -> Result<(), SqliteStoreError> {
        let at = to_unix_nanos(at)?;
        let guard = self.lock()?;
        guard
            .execute(
                "UPDATE tokens SET last_used_at = ?2 WHERE token = ?1",
                params![token.as_str(), at],
            )
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Loads a principal row.
    fn load_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, SqliteStoreError> {
        let row = {
            let guard = self.lock()?;
            guard
                .query_row(
                    "SELECT superuser, permissions_json FROM principals WHERE principal_id = ?1",
                    params![id.as_str()],
                    |row| {
                        let superuser: bool = row.get(0)?;
                        let permissions: String = row.get(1)?;
                        Ok((superuser, permissions))
                    },
                )
                .optional()
                .map_err(|err| db_error(&err))?
        };
        let Some((superuser, permissions)) = row else {
            return Ok(None);
        };
        let permissions: BTreeSet<String> = serde_json::from_str(&permissions).map_err(|err| {
            SqliteStoreError::Corrupt(format!("permissions for principal {id}: {err}"))
        })?;
        Ok(Some(Principal {
            id: id.clone(),
            permissions,
            superuser,
        }))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn find(&self, token: &TokenValue) -> Result<Option<Credential>, StoreError> {
        self.find_credential(token).map_err(StoreError::from)
    }

    fn delete_if_exists(&self, token: &TokenValue) -> Result<bool, StoreError> {
        self.delete_credential(token).map_err(StoreError::from)
    }

    fn touch(&self, token: &TokenValue, at: OffsetDateTime) -> Result<(), StoreError> {
        self.touch_credential(token, at).map_err(StoreError::from)
    }
}

impl PrincipalDirectory for SqliteCredentialStore {
    fn load(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        self.load_principal(id).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS principals (
                    principal_id TEXT PRIMARY KEY,
                    superuser INTEGER NOT NULL,
                    permissions_json TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS tokens (
                    token TEXT PRIMARY KEY,
                    principal_id TEXT NOT NULL,
                    issued_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL,
                    last_used_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_tokens_principal_id
                    ON tokens (principal_id);",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}

/// Converts a timestamp to unix nanoseconds.
fn to_unix_nanos(at: OffsetDateTime) -> Result<i64, SqliteStoreError> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| SqliteStoreError::Invalid("timestamp out of range".to_string()))
}

/// Converts unix nanoseconds to a UTC timestamp.
fn from_unix_nanos(nanos: i64) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid timestamp {nanos}: {err}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use time::macros::datetime;

    use super::*;

    #[test]
    fn unix_nanos_preserve_the_instant() {
        let at = datetime!(2026-03-01 12:00:00.123456789 +02:00);
        let nanos = to_unix_nanos(at).unwrap();
        let restored = from_unix_nanos(nanos).unwrap();
        assert_eq!(restored, at);
        assert_eq!(restored.offset(), time::UtcOffset::UTC);
    }

    #[test]
    fn store_errors_map_to_collaborator_errors() {
        let err = StoreError::from(SqliteStoreError::Db("locked".to_string()));
        assert_eq!(err, StoreError::Store("locked".to_string()));
        let err = StoreError::from(SqliteStoreError::VersionMismatch("v9".to_string()));
        assert_eq!(err, StoreError::VersionMismatch("v9".to_string()));
    }
}
