// src/persistence.rs
use crate::model::{AppSnapshot, BackupDocument, ProfileMap, WeekData};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PROFILES_KEY: &str = "profiles";
pub const CURRENT_PROFILE_KEY: &str = "currentProfileId";
pub const WEEK_DATA_KEY: &str = "weekData";

const DB_FILE_NAME: &str = "powertrack.sqlite";
const APP_DATA_DIR: &str = "powertrack";
const BACKUP_FILE_PREFIX: &str = "backup-treinos-";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database write failed: {0}")]
    WriteFailed(rusqlite::Error),
    #[error("Stored value for '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize '{key}': {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Backup file is not a valid backup document: {0}")]
    MalformedBackup(#[source] serde_json::Error),
}

/// A durable string key-value store.
pub trait KeyValueStore {
    /// # Errors
    /// Backend-specific read failures.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    /// # Errors
    /// Backend-specific write failures.
    fn set(&mut self, key: &str, value: &str) -> Result<(), Error>;
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, Error> {
    let data_dir = dirs::data_dir().ok_or(Error::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        fs::create_dir_all(&app_dir).map_err(|source| Error::Io {
            path: app_dir.clone(),
            source,
        })?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Key-value pairs in a single SQLite table.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(Error::Connection)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(Error::Connection)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::Connection)?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Error::QueryFailed)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(Error::WriteFailed)?;
        Ok(())
    }
}

/// In-memory store. Clones share their entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, for inspection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.raw(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned + Default>(
    kv: &dyn KeyValueStore,
    key: &'static str,
) -> Result<T, Error> {
    match kv.get(key)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|source| Error::Corrupt { key, source }),
        None => Ok(T::default()),
    }
}

/// Reads the three persisted values. Missing keys fall back to empty state,
/// and a stored selection that names no profile is dropped.
/// # Errors
/// - Backend read errors.
/// - `Error::Corrupt` if a stored JSON value cannot be parsed.
pub fn load(kv: &dyn KeyValueStore) -> Result<AppSnapshot, Error> {
    let profiles: ProfileMap = read_json(kv, PROFILES_KEY)?;
    let week_data: WeekData = read_json(kv, WEEK_DATA_KEY)?;
    let stored_id = kv.get(CURRENT_PROFILE_KEY)?.filter(|id| !id.is_empty());
    let current_profile_id = match stored_id {
        Some(id) if !profiles.contains_key(&id) => {
            warn!(current = %id, "stored selection names no profile; clearing");
            None
        }
        other => other,
    };

    debug!(
        profiles = profiles.len(),
        days = week_data.len(),
        current = ?current_profile_id,
        "loaded snapshot"
    );
    Ok(AppSnapshot {
        profiles,
        current_profile_id,
        week_data,
    })
}

/// Writes the snapshot. An empty profile collection is not written, so it
/// can never overwrite previously saved profiles.
/// # Errors
/// Serialization or backend write errors.
pub fn save(kv: &mut dyn KeyValueStore, snapshot: &AppSnapshot) -> Result<(), Error> {
    if !snapshot.profiles.is_empty() {
        let profiles = serde_json::to_string(&snapshot.profiles).map_err(|source| {
            Error::Serialize {
                key: PROFILES_KEY,
                source,
            }
        })?;
        kv.set(PROFILES_KEY, &profiles)?;
    }
    kv.set(
        CURRENT_PROFILE_KEY,
        snapshot.current_profile_id.as_deref().unwrap_or(""),
    )?;
    let week_data = serde_json::to_string(&snapshot.week_data).map_err(|source| {
        Error::Serialize {
            key: WEEK_DATA_KEY,
            source,
        }
    })?;
    kv.set(WEEK_DATA_KEY, &week_data)?;
    Ok(())
}

/// `backup-treinos-<YYYY-MM-DD>.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("{BACKUP_FILE_PREFIX}{}.json", date.format("%Y-%m-%d"))
}

/// Serializes the snapshot as a pretty-printed backup document.
/// # Errors
/// Returns `Error::Serialize` if serialization fails.
pub fn export_backup(snapshot: &AppSnapshot) -> Result<String, Error> {
    serde_json::to_string_pretty(snapshot).map_err(|source| Error::Serialize {
        key: "backup",
        source,
    })
}

/// Parses a backup document. Keys may be missing.
/// # Errors
/// Returns `Error::MalformedBackup` for anything that is not a backup-shaped
/// JSON object.
pub fn parse_backup(text: &str) -> Result<BackupDocument, Error> {
    serde_json::from_str(text).map_err(Error::MalformedBackup)
}

/// Writes a backup of `snapshot` into `dir`, named after `date`.
/// # Errors
/// Serialization or file system errors.
pub fn write_backup(dir: &Path, snapshot: &AppSnapshot, date: NaiveDate) -> Result<PathBuf, Error> {
    let json = export_backup(snapshot)?;
    fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(backup_file_name(date));
    fs::write(&path, json).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "backup written");
    Ok(path)
}

/// Reads a backup file from disk.
/// # Errors
/// `Error::Io` if the file cannot be read, `Error::MalformedBackup` if it does
/// not parse.
pub fn read_backup(path: &Path) -> Result<BackupDocument, Error> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_backup(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_default_snapshot() {
        let kv = MemoryStore::new();
        assert_eq!(load(&kv).unwrap(), AppSnapshot::default());
    }

    #[test]
    fn empty_profiles_are_not_written() {
        let mut kv = MemoryStore::new();
        kv.set(PROFILES_KEY, r#"{"profile_1":"kept"}"#).unwrap();

        save(&mut kv, &AppSnapshot::default()).unwrap();

        assert_eq!(kv.raw(PROFILES_KEY).as_deref(), Some(r#"{"profile_1":"kept"}"#));
        assert_eq!(kv.raw(CURRENT_PROFILE_KEY).as_deref(), Some(""));
        assert_eq!(kv.raw(WEEK_DATA_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn dangling_selection_is_cleared_on_load() {
        let mut kv = MemoryStore::new();
        kv.set(PROFILES_KEY, "{}").unwrap();
        kv.set(CURRENT_PROFILE_KEY, "profile_gone").unwrap();
        assert_eq!(load(&kv).unwrap().current_profile_id, None);
    }

    #[test]
    fn corrupt_value_is_reported() {
        let mut kv = MemoryStore::new();
        kv.set(WEEK_DATA_KEY, "{oops").unwrap();
        assert!(matches!(
            load(&kv),
            Err(Error::Corrupt {
                key: WEEK_DATA_KEY,
                ..
            })
        ));
    }

    #[test]
    fn sqlite_store_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        {
            let mut kv = SqliteStore::open(&path).unwrap();
            kv.set(CURRENT_PROFILE_KEY, "profile_1").unwrap();
            kv.set(CURRENT_PROFILE_KEY, "profile_2").unwrap();
        }
        let kv = SqliteStore::open(&path).unwrap();
        assert_eq!(kv.get(CURRENT_PROFILE_KEY).unwrap().as_deref(), Some("profile_2"));
        assert_eq!(kv.get(WEEK_DATA_KEY).unwrap(), None);
    }

    #[test]
    fn snapshot_survives_save_and_load() {
        let mut kv = SqliteStore::open_in_memory().unwrap();
        let document = r#"{
            "profiles": {},
            "currentProfileId": "",
            "weekData": { "2025-06-06": { "profile_1": { "trained": true, "exercises": {} } } }
        }"#;
        let week_data = parse_backup(document).unwrap().week_data.unwrap();
        let snapshot = AppSnapshot {
            week_data,
            ..Default::default()
        };

        save(&mut kv, &snapshot).unwrap();
        assert_eq!(kv.get(PROFILES_KEY).unwrap(), None);
        assert_eq!(load(&kv).unwrap(), snapshot);
    }

    #[test]
    fn backup_name_uses_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 6).unwrap();
        assert_eq!(backup_file_name(date), "backup-treinos-2025-06-06.json");
    }

    #[test]
    fn partial_backup_parses() {
        let document = parse_backup(r#"{"currentProfileId": ""}"#).unwrap();
        assert_eq!(document.profiles, None);
        assert_eq!(document.current_profile_id, Some(None));
        assert_eq!(document.week_data, None);

        assert!(matches!(parse_backup("{not json"), Err(Error::MalformedBackup(_))));
        assert!(matches!(parse_backup("[1, 2]"), Err(Error::MalformedBackup(_))));
    }
}
