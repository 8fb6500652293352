//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::CachedResponse;
use crate::fetch::{RequestKey, Response, ResponseType};

/// Trait for cache storage backends.
///
/// A backend holds any number of named stores, each mapping a request key to
/// a response. Every method is atomic on its own; `put_all` either stores the
/// whole batch or nothing.
pub trait CacheStorage: Send + Sync {
  /// Open a store, creating it if absent.
  fn open(&self, name: &str) -> Result<()>;

  /// Names of all stores in creation order.
  fn names(&self) -> Result<Vec<String>>;

  /// Delete a store and all its entries. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Look up a single entry in one store.
  fn get(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Insert or replace an entry, creating the store if needed.
  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Insert a batch of entries in one step.
  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// Keys held by a store, oldest first. Empty if the store does not exist.
  fn keys(&self, name: &str) -> Result<Vec<RequestKey>>;

  /// Look up an entry across every store, in creation order.
  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    for name in self.names()? {
      if let Some(hit) = self.get(&name, key)? {
        return Ok(Some(hit));
      }
    }
    Ok(None)
  }
}

/// Storage kept entirely in memory.
#[derive(Default)]
pub struct MemoryStorage {
  stores: Mutex<MemoryStores>,
}

type MemoryStores = Vec<(String, Vec<(RequestKey, CachedResponse)>)>;

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryStores>> {
    self.stores.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn store_mut<'a>(
    stores: &'a mut MemoryStores,
    name: &str,
  ) -> &'a mut Vec<(RequestKey, CachedResponse)> {
    let idx = match stores.iter().position(|(n, _)| n == name) {
      Some(idx) => idx,
      None => {
        stores.push((name.to_string(), Vec::new()));
        stores.len() - 1
      }
    };
    &mut stores[idx].1
  }

  fn insert(entries: &mut Vec<(RequestKey, CachedResponse)>, key: &RequestKey, response: &Response) {
    entries.retain(|(k, _)| k != key);
    entries.push((
      key.clone(),
      CachedResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    ));
  }
}

impl CacheStorage for MemoryStorage {
  fn open(&self, name: &str) -> Result<()> {
    let mut stores = self.lock()?;
    Self::store_mut(&mut stores, name);
    Ok(())
  }

  fn names(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.iter().map(|(n, _)| n.clone()).collect())
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut stores = self.lock()?;
    let before = stores.len();
    stores.retain(|(n, _)| n != name);
    Ok(stores.len() != before)
  }

  fn get(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let stores = self.lock()?;
    Ok(
      stores
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, entries)| entries.iter().find(|(k, _)| k == key))
        .map(|(_, cached)| cached.clone()),
    )
  }

  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut stores = self.lock()?;
    Self::insert(Self::store_mut(&mut stores, name), key, response);
    Ok(())
  }

  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut stores = self.lock()?;
    let store = Self::store_mut(&mut stores, name);
    for (key, response) in entries {
      Self::insert(store, key, response);
    }
    Ok(())
  }

  fn keys(&self, name: &str) -> Result<Vec<RequestKey>> {
    let stores = self.lock()?;
    Ok(
      stores
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, entries)| entries.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default(),
    )
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the storage at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Storage backed by a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("assetcache").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn ensure_store(conn: &Connection, name: &str) -> Result<()> {
    conn
      .execute(
        "INSERT OR IGNORE INTO cache_store (name, created_at) VALUES (?, datetime('now'))",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache '{}': {}", name, e))?;
    Ok(())
  }

  fn insert_entry(conn: &Connection, name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entry
           (cache_name, request_hash, method, url, status, status_text, headers, body, response_type, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          name,
          request_hash(key),
          key.method,
          key.url,
          response.status,
          response.status_text,
          headers,
          response.body,
          response.response_type.as_str(),
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named stores, rowid preserves creation order
CREATE TABLE IF NOT EXISTS cache_store (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by sha256(method + url)
CREATE TABLE IF NOT EXISTS cache_entry (
    cache_name TEXT NOT NULL,
    request_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    response_type TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, request_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entry_name ON cache_entry(cache_name);
"#;

impl CacheStorage for SqliteStorage {
  fn open(&self, name: &str) -> Result<()> {
    let conn = self.lock()?;
    Self::ensure_store(&conn, name)
  }

  fn names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_store ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM cache_entry WHERE cache_name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of cache '{}': {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM cache_store WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache '{}': {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn get(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT status, status_text, headers, body, response_type, cached_at FROM cache_entry
         WHERE cache_name = ? AND request_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, String, Vec<u8>, String, String)> = stmt
      .query_row(params![name, request_hash(key)], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      })
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key, e))?;

    let Some((status, status_text, headers, body, response_type, cached_at)) = row else {
      return Ok(None);
    };

    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Failed to deserialize headers for {}: {}", key, e))?;

    Ok(Some(CachedResponse {
      response: Response {
        status,
        status_text,
        headers,
        body,
        response_type: ResponseType::parse(&response_type)?,
      },
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    Self::ensure_store(&tx, name)?;
    Self::insert_entry(&tx, name, key, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))
  }

  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let conn = self.lock()?;
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    Self::ensure_store(&tx, name)?;
    for (key, response) in entries {
      Self::insert_entry(&tx, name, key, response)?;
    }

    // Dropping the transaction on an early return rolls the batch back
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))
  }

  fn keys(&self, name: &str) -> Result<Vec<RequestKey>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT method, url FROM cache_entry WHERE cache_name = ? ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map(params![name], |row| {
        Ok(RequestKey {
          method: row.get(0)?,
          url: row.get(1)?,
        })
      })
      .map_err(|e| eyre!("Failed to list keys of cache '{}': {}", name, e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read cache key: {}", e))?;

    Ok(keys)
  }
}

/// SHA256 of method and URL, for stable fixed-length keys.
fn request_hash(key: &RequestKey) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.method.as_bytes());
  hasher.update(b" ");
  hasher.update(key.url.as_bytes());
  hex::encode(hasher.finalize())
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
