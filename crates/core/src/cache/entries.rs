//! Cached response entries.
//!
//! Entries are keyed by request (method + URL) within a store and hold an
//! immutable captured response. Single-entry writes are upserts, so a late
//! duplicate write simply overwrites the same key with equivalent content.

use super::connection::CacheDb;
use super::hash::{cache_url, compute_cache_key};
use super::stores::ensure_store;
use crate::http::{Response, ResponseType};
use crate::Error;
use tokio_rusqlite::{params, rusqlite};
use url::Url;

/// A request/response pair to be written into a store.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub method: String,
    pub url: Url,
    pub response: Response,
}

impl CacheEntry {
    pub fn new(method: &str, url: Url, response: Response) -> Self {
        Self { method: method.to_ascii_uppercase(), url, response }
    }
}

/// Column-level form of an entry, movable into the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: i64,
    status_text: String,
    response_type: String,
    final_url: String,
    redirected: bool,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn from_entry(entry: &CacheEntry) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&entry.response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;

        Ok(Self {
            key_hash: compute_cache_key(&entry.method, &entry.url),
            method: entry.method.clone(),
            url: cache_url(&entry.url),
            status: i64::from(entry.response.status),
            status_text: entry.response.status_text.clone(),
            response_type: entry.response.response_type.as_str().to_string(),
            final_url: entry.response.url.to_string(),
            redirected: entry.response.redirected,
            headers_json,
            body: entry.response.body.to_vec(),
        })
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            key_hash: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            status: row.get(3)?,
            status_text: row.get(4)?,
            response_type: row.get(5)?,
            final_url: row.get(6)?,
            redirected: row.get::<_, i64>(7)? == 1,
            headers_json: row.get(8)?,
            body: row.get(9)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptEntry(format!("status {} out of range for {}", self.status, self.url)))?;
        let response_type: ResponseType = self.response_type.parse()?;
        let url = Url::parse(&self.final_url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", self.final_url)))?;
        let headers = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("headers for {}: {e}", self.url)))?;

        Ok(Response {
            status,
            status_text: self.status_text,
            response_type,
            url,
            redirected: self.redirected,
            headers,
            body: self.body.into(),
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT key_hash, method, url, status, status_text, response_type,
        final_url, redirected, headers_json, body
    FROM cache_entries";

fn upsert_row(conn: &rusqlite::Connection, store: &str, row: &EntryRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO cache_entries (
            store_name, key_hash, method, url, status, status_text, response_type,
            final_url, redirected, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(store_name, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            response_type = excluded.response_type,
            final_url = excluded.final_url,
            redirected = excluded.redirected,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            store,
            &row.key_hash,
            &row.method,
            &row.url,
            row.status,
            &row.status_text,
            &row.response_type,
            &row.final_url,
            row.redirected as i32,
            &row.headers_json,
            &row.body,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Look up a request in a store.
    ///
    /// Returns None if the store or the entry does not exist.
    pub async fn match_request(&self, store: &str, method: &str, url: &Url) -> Result<Option<Response>, Error> {
        let key_hash = compute_cache_key(method, url);
        let store = store.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_COLUMNS} WHERE store_name = ?1 AND key_hash = ?2");
                let mut stmt = conn.prepare(&sql)?;

                match stmt.query_row(params![store, key_hash], EntryRow::from_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Store a single entry in an existing store.
    ///
    /// Returns false without writing when the store does not exist, so a
    /// late write can never bring back a deleted store.
    pub async fn put_if_store_exists(&self, store: &str, entry: &CacheEntry) -> Result<bool, Error> {
        let row = EntryRow::from_entry(entry)?;
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![store],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Ok(false);
                }
                upsert_row(&tx, &store, &row)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Create a store and write every entry in one transaction.
    ///
    /// Either the store and all entries are committed, or nothing is.
    /// Returns the number of entries written.
    pub async fn put_all(&self, store: &str, entries: &[CacheEntry]) -> Result<usize, Error> {
        let rows = entries.iter().map(EntryRow::from_entry).collect::<Result<Vec<_>, _>>()?;
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                for row in &rows {
                    upsert_row(&tx, &store, row)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a store.
    pub async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![store],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Cached URLs of a store, sorted.
    pub async fn entry_urls(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store_name = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
