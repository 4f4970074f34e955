//! Local SQLite storage for saved connection profiles.
//!
//! Passwords are never written here; a profile loaded from storage carries
//! `password: None` until the front end supplies one for the current process.
//!
//! # Data Directory Locations
//!
//! - `BURROW_DATA_DIR` when set
//! - **Debug builds**: `./burrow_data` in the current directory
//! - otherwise the platform data directory joined with `burrow`
//!   (`~/.local/share/burrow`, `~/Library/Application Support/burrow`, `%APPDATA%\burrow`)

use crate::error::BurrowError;
use crate::models::{ConnectionOptions, ConnectionProfile, SslMode};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "BURROW_DATA_DIR";

/// Get the default data directory for the application.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    #[cfg(debug_assertions)]
    {
        PathBuf::from("./burrow_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir().map(|d| d.join("burrow")).unwrap_or_else(|| PathBuf::from("./burrow_data"))
    }
}

/// Create the data directory if needed.
pub fn init_data_dir(path: &Path) -> Result<(), BurrowError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(BurrowError::storage(
                format!("Data path exists but is not a directory: {}", path.display()),
                Some("Set BURROW_DATA_DIR to a different location or remove the existing file"),
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        BurrowError::storage(
            format!("Failed to create data directory '{}': {}", path.display(), e),
            Some("Check permissions or set BURROW_DATA_DIR"),
        )
    })?;

    tracing::info!(path = %path.display(), "Created data directory");
    Ok(())
}

/// SQLite-backed profile store.
///
/// Thread-safe via an internal mutex; WAL mode.
pub struct LocalStorage {
    connection: Mutex<Connection>,
    data_dir: PathBuf,
}

impl LocalStorage {
    /// Open or create `burrow.db` in the given data directory.
    pub fn open(data_dir: PathBuf) -> Result<Self, BurrowError> {
        init_data_dir(&data_dir)?;
        let db_path = data_dir.join("burrow.db");
        Self::open_with_path(db_path, data_dir)
    }

    /// Open storage with a specific database path.
    pub fn open_with_path(db_path: PathBuf, data_dir: PathBuf) -> Result<Self, BurrowError> {
        let connection = Connection::open(&db_path).map_err(|e| {
            BurrowError::storage(
                format!("Failed to open database '{}': {}", db_path.display(), e),
                Some("The database file may be corrupted. Try deleting it to start fresh."),
            )
        })?;

        Self::configure_connection(&connection)?;

        let storage = Self { connection: Mutex::new(connection), data_dir };
        storage.run_migrations()?;

        tracing::info!(path = %db_path.display(), "Local storage opened");
        Ok(storage)
    }

    fn configure_connection(conn: &Connection) -> Result<(), BurrowError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            ",
        )
        .map_err(|e| BurrowError::storage(format!("Failed to configure database: {e}"), None))
    }

    fn run_migrations(&self) -> Result<(), BurrowError> {
        const DOMAIN: &str = "profiles";

        let conn = self.connection.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                domain TEXT NOT NULL,
                step INTEGER NOT NULL,
                migration TEXT NOT NULL,
                PRIMARY KEY(domain, step)
            ) STRICT",
            [],
        )
        .map_err(|e| BurrowError::storage(format!("Failed to create migrations table: {e}"), None))?;

        let current_step: i64 = conn.query_row(
            "SELECT COALESCE(MAX(step), 0) FROM migrations WHERE domain = ?",
            [DOMAIN],
            |row| row.get(0),
        )?;

        if current_step < 1 {
            conn.execute_batch(
                "
                CREATE TABLE profiles (
                    profile_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL DEFAULT 26257,
                    database_name TEXT NOT NULL DEFAULT 'defaultdb',
                    username TEXT NOT NULL DEFAULT 'root',
                    ssl_mode TEXT NOT NULL DEFAULT 'disable',
                    connect_timeout_secs INTEGER NOT NULL DEFAULT 10,
                    statement_timeout_secs INTEGER,
                    application_name TEXT NOT NULL DEFAULT 'burrow',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    last_used_at TEXT
                ) STRICT;

                CREATE INDEX idx_profiles_last_used ON profiles(last_used_at DESC);
                ",
            )
            .map_err(|e| BurrowError::storage(format!("Migration 1 failed: {e}"), None))?;

            conn.execute(
                "INSERT INTO migrations (domain, step, migration) VALUES (?, 1, 'profiles')",
                [DOMAIN],
            )?;
            tracing::info!("Applied migration 1: profiles");
        }

        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ========== Profile Operations ==========

    /// Insert or update a profile. The password is not stored.
    pub fn save_profile(&self, profile: &ConnectionProfile) -> Result<(), BurrowError> {
        profile.validate().map_err(BurrowError::invalid_input)?;

        let conn = self.connection.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO profiles (
                profile_id, name, host, port, database_name, username, ssl_mode,
                connect_timeout_secs, statement_timeout_secs, application_name,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            ON CONFLICT(profile_id) DO UPDATE SET
                name = excluded.name,
                host = excluded.host,
                port = excluded.port,
                database_name = excluded.database_name,
                username = excluded.username,
                ssl_mode = excluded.ssl_mode,
                connect_timeout_secs = excluded.connect_timeout_secs,
                statement_timeout_secs = excluded.statement_timeout_secs,
                application_name = excluded.application_name,
                updated_at = excluded.updated_at",
            params![
                profile.id.to_string(),
                profile.name,
                profile.host,
                profile.port,
                profile.database,
                profile.user,
                profile.ssl_mode.as_str(),
                profile.options.connect_timeout_secs,
                profile.options.statement_timeout_secs,
                profile.options.application_name,
                now,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                BurrowError::storage(
                    format!("A profile named '{}' already exists", profile.name),
                    Some("Choose a different name or delete the existing profile"),
                )
            }
            other => BurrowError::storage(format!("Failed to save profile: {other}"), None),
        })?;

        tracing::debug!(profile_id = %profile.id, name = %profile.name, "Profile saved");
        Ok(())
    }

    /// Load a profile by ID.
    pub fn load_profile(&self, id: Uuid) -> Result<Option<ConnectionProfile>, BurrowError> {
        self.load_one(&format!("{PROFILE_COLUMNS} WHERE profile_id = ?"), &id.to_string())
    }

    /// Load a profile by its display name.
    pub fn load_profile_by_name(&self, name: &str) -> Result<Option<ConnectionProfile>, BurrowError> {
        self.load_one(&format!("{PROFILE_COLUMNS} WHERE name = ?"), name)
    }

    fn load_one(&self, sql: &str, key: &str) -> Result<Option<ConnectionProfile>, BurrowError> {
        let conn = self.connection.lock();
        let row = conn
            .query_row(sql, [key], ProfileRow::from_row)
            .optional()
            .map_err(|e| BurrowError::storage(format!("Failed to load profile: {e}"), None))?;
        row.map(ProfileRow::into_profile).transpose()
    }

    /// All profiles, most recently used first, then by name.
    pub fn load_all_profiles(&self) -> Result<Vec<ConnectionProfile>, BurrowError> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(&format!(
            "{PROFILE_COLUMNS} ORDER BY last_used_at DESC NULLS LAST, name"
        ))?;

        let rows = stmt
            .query_map([], ProfileRow::from_row)
            .map_err(|e| BurrowError::storage(format!("Failed to query profiles: {e}"), None))?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?.into_profile()?);
        }
        Ok(profiles)
    }

    /// Delete a profile. Returns whether it existed.
    pub fn delete_profile(&self, id: Uuid) -> Result<bool, BurrowError> {
        let conn = self.connection.lock();
        let deleted = conn
            .execute("DELETE FROM profiles WHERE profile_id = ?", [id.to_string()])
            .map_err(|e| BurrowError::storage(format!("Failed to delete profile: {e}"), None))?;

        tracing::debug!(profile_id = %id, deleted, "Profile deleted");
        Ok(deleted > 0)
    }

    /// Record that a profile was just used.
    pub fn touch_profile(&self, id: Uuid) -> Result<(), BurrowError> {
        let conn = self.connection.lock();
        conn.execute(
            "UPDATE profiles SET last_used_at = ? WHERE profile_id = ?",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| BurrowError::storage(format!("Failed to update last used time: {e}"), None))?;
        Ok(())
    }
}

const PROFILE_COLUMNS: &str = "SELECT profile_id, name, host, port, database_name, username, ssl_mode,
        connect_timeout_secs, statement_timeout_secs, application_name
 FROM profiles";

/// Raw profile row before UUID parsing.
struct ProfileRow {
    id: String,
    name: String,
    host: String,
    port: u16,
    database: String,
    user: String,
    ssl_mode: String,
    connect_timeout_secs: u32,
    statement_timeout_secs: Option<u32>,
    application_name: String,
}

impl ProfileRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            host: row.get(2)?,
            port: row.get(3)?,
            database: row.get(4)?,
            user: row.get(5)?,
            ssl_mode: row.get(6)?,
            connect_timeout_secs: row.get(7)?,
            statement_timeout_secs: row.get(8)?,
            application_name: row.get(9)?,
        })
    }

    fn into_profile(self) -> Result<ConnectionProfile, BurrowError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| BurrowError::storage(format!("Invalid profile ID: {e}"), None))?;

        Ok(ConnectionProfile {
            id,
            name: self.name,
            host: self.host,
            port: self.port,
            database: self.database,
            user: self.user,
            password: None,
            ssl_mode: SslMode::parse(&self.ssl_mode),
            options: ConnectionOptions {
                connect_timeout_secs: self.connect_timeout_secs,
                statement_timeout_secs: self.statement_timeout_secs,
                application_name: self.application_name,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_save_and_load_without_password() {
        let (_dir, storage) = open_temp();
        let profile = ConnectionProfile::builder()
            .name("staging")
            .host("crdb.staging")
            .database("shop")
            .password("hunter2")
            .statement_timeout_secs(30)
            .build()
            .unwrap();

        storage.save_profile(&profile).unwrap();
        let loaded = storage.load_profile(profile.id).unwrap().unwrap();
        assert_eq!(loaded.name, "staging");
        assert_eq!(loaded.database, "shop");
        assert_eq!(loaded.port, 26257);
        assert_eq!(loaded.options.statement_timeout_secs, Some(30));
        assert_eq!(loaded.password, None);
    }

    #[test]
    fn test_save_is_upsert() {
        let (_dir, storage) = open_temp();
        let mut profile = ConnectionProfile::new("local", "localhost");
        storage.save_profile(&profile).unwrap();

        profile.port = 26258;
        storage.save_profile(&profile).unwrap();

        let all = storage.load_all_profiles().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].port, 26258);
        assert!(storage.load_profile_by_name("local").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (_dir, storage) = open_temp();
        storage.save_profile(&ConnectionProfile::new("dup", "a")).unwrap();
        let err = storage.save_profile(&ConnectionProfile::new("dup", "b")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_recently_used_profiles_come_first() {
        let (_dir, storage) = open_temp();
        let alpha = ConnectionProfile::new("alpha", "a");
        let beta = ConnectionProfile::new("beta", "b");
        storage.save_profile(&alpha).unwrap();
        storage.save_profile(&beta).unwrap();

        let names: Vec<_> =
            storage.load_all_profiles().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        storage.touch_profile(beta.id).unwrap();
        let names: Vec<_> =
            storage.load_all_profiles().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }

    #[test]
    fn test_delete_profile() {
        let (_dir, storage) = open_temp();
        let profile = ConnectionProfile::new("gone", "h");
        storage.save_profile(&profile).unwrap();
        assert!(storage.delete_profile(profile.id).unwrap());
        assert!(!storage.delete_profile(profile.id).unwrap());
        assert!(storage.load_profile(profile.id).unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_profiles() {
        let dir = TempDir::new().unwrap();
        let profile = ConnectionProfile::new("persisted", "h");
        {
            let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
            storage.save_profile(&profile).unwrap();
        }
        let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
        assert!(storage.load_profile(profile.id).unwrap().is_some());
    }
}
