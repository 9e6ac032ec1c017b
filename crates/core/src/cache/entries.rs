//! Named store and entry operations.
//!
//! Stores are created implicitly on first open or write and deleted
//! wholesale; deleting a store cascades to its entries.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::http::{AgentRequest, AgentResponse, ResponseSource};
use crate::Error;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response stored under a request identity in a named store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub cache_name: String,
    pub key: String,
    pub method: String,
    /// Request URL the entry is keyed on.
    pub url: String,
    /// Final URL of the response; differs from `url` after a redirect.
    pub response_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredEntry {
    /// Turn the entry back into a response for the host.
    pub fn into_response(self) -> AgentResponse {
        AgentResponse {
            url: self.response_url,
            status: self.status,
            headers: self.headers,
            body: Bytes::from(self.body),
            source: ResponseSource::Cache,
        }
    }
}

/// A store name with its entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub entries: u64,
}

impl CacheDb {
    /// Open (and create if missing) a named store.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a named store exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List store names in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// List every store with its entry count.
    pub async fn cache_summaries(&self) -> Result<Vec<CacheSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, COUNT(e.key) FROM caches c
                     LEFT JOIN entries e ON e.cache_name = c.name
                     GROUP BY c.name ORDER BY c.created_at ASC, c.name ASC",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(CacheSummary { name: row.get(0)?, entries: row.get::<_, i64>(1)? as u64 })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a named store and all of its entries.
    ///
    /// Returns false if the store did not exist.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under the request's identity, replacing any previous entry.
    ///
    /// The store is created if needed; the write is a single transaction.
    pub async fn put_entry(&self, cache_name: &str, request: &AgentRequest, response: &AgentResponse) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let url = request.cache_url();
        let key = compute_request_key(&request.method, &url);
        let method = request.method.clone();
        let response_url = response.url.clone();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![&cache_name, &now],
                )?;
                tx.execute(
                    "INSERT INTO entries (cache_name, key, method, url, response_url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(cache_name, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        response_url = excluded.response_url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![&cache_name, &key, &method, &url, &response_url, status as i64, &headers_json, &body, &now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry stored for a request in a named store.
    ///
    /// Returns None if either the store or the entry doesn't exist.
    pub async fn match_entry(&self, cache_name: &str, request: &AgentRequest) -> Result<Option<StoredEntry>, Error> {
        let cache_name = cache_name.to_string();
        let key = compute_request_key(&request.method, &request.cache_url());
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let result = conn.query_row(
                    "SELECT cache_name, key, method, url, COALESCE(response_url, url), status, headers_json, body, stored_at
                     FROM entries WHERE cache_name = ?1 AND key = ?2",
                    params![cache_name, key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, Vec<u8>>(7)?,
                            row.get::<_, String>(8)?,
                        ))
                    },
                );

                match result {
                    Ok((cache_name, key, method, url, response_url, status, headers_json, body, stored_at)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredEntry {
                            cache_name,
                            key,
                            method,
                            url,
                            response_url,
                            status: status as u16,
                            headers,
                            body,
                            stored_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a single entry. Returns false if nothing was stored.
    pub async fn delete_entry(&self, cache_name: &str, request: &AgentRequest) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let key = compute_request_key(&request.method, &request.cache_url());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key = ?2",
                    params![cache_name, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a named store, oldest first.
    pub async fn entry_urls(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY stored_at ASC, url ASC")?;
                let urls = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
