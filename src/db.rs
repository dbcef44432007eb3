// src/db.rs
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::APP_DIR;

const DB_FILE_NAME: &str = "ssculpt.sqlite";
const ASSET_CACHE_FILE_NAME: &str = "asset-cache.sqlite";

// Custom Error type for DB operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
}

/// A stored response body plus the bits of metadata needed to replay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

fn app_data_dir() -> Result<PathBuf, Error> {
    let data_dir = dirs::data_dir().ok_or(Error::DataDir)?;
    let app_dir = data_dir.join(APP_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir)
}

/// Gets the path to the state database, creating the data directory if needed.
pub fn get_db_path() -> Result<PathBuf, Error> {
    Ok(app_data_dir()?.join(DB_FILE_NAME))
}

/// Gets the path to the asset cache database. Kept apart from the state database.
pub fn get_asset_cache_path() -> Result<PathBuf, Error> {
    Ok(app_data_dir()?.join(ASSET_CACHE_FILE_NAME))
}

pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    Connection::open(path).map_err(Error::Connection)
}

// --- Durable key-value entries ---

pub fn init_kv(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL -- RFC3339
        )",
        [],
    )
    .map_err(Error::Connection)?;
    Ok(())
}

pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>, Error> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::QueryFailed)
}

/// Writes `value` under `key`, replacing any previous value in a single statement.
pub fn set_item(conn: &Connection, key: &str, value: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now()],
    )
    .map_err(Error::InsertFailed)?;
    Ok(())
}

// --- Named cache buckets ---

pub fn init_cache(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cache_buckets (
            name TEXT PRIMARY KEY NOT NULL,
            activated INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )
    .map_err(Error::Connection)?;
    add_activated_column(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            bucket TEXT NOT NULL,
            request_key TEXT NOT NULL, -- absolute request URL
            status INTEGER NOT NULL,
            content_type TEXT,
            body BLOB NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (bucket, request_key)
        )",
        [],
    )
    .map_err(Error::Connection)?;

    Ok(())
}

// Files written before buckets tracked activation lack the column
fn add_activated_column(conn: &Connection) -> Result<(), Error> {
    let present: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('cache_buckets') WHERE name = 'activated'",
            [],
            |row| row.get(0),
        )
        .map_err(Error::QueryFailed)?;
    if present == 0 {
        conn.execute(
            "ALTER TABLE cache_buckets ADD COLUMN activated INTEGER NOT NULL DEFAULT 0",
            [],
        )
        .map_err(Error::Connection)?;
    }
    Ok(())
}

pub fn open_bucket(conn: &Connection, bucket: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?1)",
        params![bucket],
    )
    .map_err(Error::InsertFailed)?;
    Ok(())
}

pub fn bucket_names(conn: &Connection) -> Result<Vec<String>, Error> {
    let mut stmt = conn
        .prepare("SELECT name FROM cache_buckets ORDER BY name")
        .map_err(Error::QueryFailed)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(Error::QueryFailed)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(Error::QueryFailed)?;
    Ok(names)
}

pub fn count_entries(conn: &Connection, bucket: &str) -> Result<usize, Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE bucket = ?1",
        params![bucket],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| usize::try_from(n).unwrap_or(0))
    .map_err(Error::QueryFailed)
}

/// Whether `bucket` finished activation; `None` if there is no such bucket.
pub fn bucket_activated(conn: &Connection, bucket: &str) -> Result<Option<bool>, Error> {
    conn.query_row(
        "SELECT activated FROM cache_buckets WHERE name = ?1",
        params![bucket],
        |row| row.get::<_, bool>(0),
    )
    .optional()
    .map_err(Error::QueryFailed)
}

/// Deletes the `stale` buckets with their entries and marks `current` as
/// activated, all in one transaction. Returns the number of buckets deleted.
pub fn activate_bucket(
    conn: &mut Connection,
    current: &str,
    stale: &[String],
) -> Result<usize, Error> {
    let tx = conn.transaction().map_err(Error::Connection)?;
    let mut deleted = 0;
    for bucket in stale {
        tx.execute(
            "DELETE FROM cache_entries WHERE bucket = ?1",
            params![bucket],
        )
        .map_err(Error::DeleteFailed)?;
        deleted += tx
            .execute("DELETE FROM cache_buckets WHERE name = ?1", params![bucket])
            .map_err(Error::DeleteFailed)?;
    }
    tx.execute(
        "UPDATE cache_buckets SET activated = 1 WHERE name = ?1",
        params![current],
    )
    .map_err(Error::InsertFailed)?;
    tx.commit().map_err(Error::Connection)?;
    Ok(deleted)
}

pub fn match_entry(
    conn: &Connection,
    bucket: &str,
    request_key: &str,
) -> Result<Option<StoredResponse>, Error> {
    conn.query_row(
        "SELECT status, content_type, body FROM cache_entries
         WHERE bucket = ?1 AND request_key = ?2",
        params![bucket, request_key],
        |row| {
            Ok(StoredResponse {
                status: row.get(0)?,
                content_type: row.get(1)?,
                body: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Error::QueryFailed)
}

fn upsert_entry(
    conn: &Connection,
    bucket: &str,
    request_key: &str,
    response: &StoredResponse,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_entries (bucket, request_key, status, content_type, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(bucket, request_key) DO UPDATE SET
            status = excluded.status,
            content_type = excluded.content_type,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            bucket,
            request_key,
            response.status,
            response.content_type,
            response.body,
            Utc::now()
        ],
    )
    .map_err(Error::InsertFailed)?;
    Ok(())
}

/// Stores a single entry, overwriting an existing one for the same request.
pub fn put_entry(
    conn: &Connection,
    bucket: &str,
    request_key: &str,
    response: &StoredResponse,
) -> Result<(), Error> {
    open_bucket(conn, bucket)?;
    upsert_entry(conn, bucket, request_key, response)
}

/// Stores every entry or none of them.
pub fn put_all(
    conn: &mut Connection,
    bucket: &str,
    entries: &[(String, StoredResponse)],
) -> Result<(), Error> {
    let tx = conn.transaction().map_err(Error::Connection)?;
    open_bucket(&tx, bucket)?;
    // A fresh install has to be activated again before it serves
    tx.execute(
        "UPDATE cache_buckets SET activated = 0 WHERE name = ?1",
        params![bucket],
    )
    .map_err(Error::InsertFailed)?;
    for (request_key, response) in entries {
        upsert_entry(&tx, bucket, request_key, response)?;
    }
    tx.commit().map_err(Error::Connection)?;
    Ok(())
}
