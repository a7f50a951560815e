//! Shared HTTP-level response cache.
//!
//! Exact-request lookups only: a hit replays the stored status, headers and
//! body verbatim. Entries are written by the transport once a body has been
//! read to completion.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A complete response stored in the shared cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Request key from [`compute_request_key`](super::hash::compute_request_key).
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read/write access to the shared response cache.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Find the stored response for an exact request key.
    async fn lookup(&self, key: &str) -> Result<Option<StoredResponse>, Error>;

    /// Insert or replace a stored response.
    async fn store(&self, response: &StoredResponse) -> Result<(), Error>;
}

#[async_trait]
impl ResponseStore for CacheDb {
    async fn lookup(&self, key: &str) -> Result<Option<StoredResponse>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, headers_json, body, stored_at
                     FROM responses WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                match result {
                    Ok((key, method, url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredResponse { key, method, url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn store(&self, response: &StoredResponse) -> Result<(), Error> {
        let response = response.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO responses (key, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &response.key,
                        &response.method,
                        &response.url,
                        response.status,
                        headers_json,
                        &response.body,
                        &response.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Delete every stored response for `url`, whatever the method or
    /// `Accept` header. Returns the number of rows removed.
    pub async fn purge_responses_for_url(&self, url: &str) -> Result<u64, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM responses WHERE url = ?1", params![url])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_request_key;

    fn make_response(url: &str, body: &[u8]) -> StoredResponse {
        StoredResponse {
            key: compute_request_key("GET", url, ""),
            method: "GET".into(),
            url: url.into(),
            status: 200,
            headers: vec![("Content-Type".into(), "image/png".into())],
            body: body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = make_response("https://upload.example.org/a.png", b"\x89PNG");

        db.store(&response).await.unwrap();

        let found = db.lookup(&response.key).await.unwrap().unwrap();
        assert_eq!(found, response);
        assert_eq!(found.header("content-type"), Some("image/png"));
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.lookup("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://upload.example.org/a.png";
        db.store(&make_response(url, b"old")).await.unwrap();
        db.store(&make_response(url, b"new")).await.unwrap();

        let found = db.lookup(&compute_request_key("GET", url, "")).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
    }

    #[tokio::test]
    async fn test_purge_for_url() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.store(&make_response("https://a.example.org/1", b"1")).await.unwrap();
        db.store(&make_response("https://b.example.org/2", b"2")).await.unwrap();

        let deleted = db.purge_responses_for_url("https://a.example.org/1").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(
            db.lookup(&compute_request_key("GET", "https://b.example.org/2", ""))
                .await
                .unwrap()
                .is_some()
        );
    }
}
