//! Persisted-object store.
//!
//! Callers treat this store as best-effort: a failed save or load is logged
//! and otherwise ignored.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Keyed blob storage addressed by namespace + name.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn load(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, Error>;

    async fn save(&self, namespace: &str, name: &str, value: &[u8]) -> Result<(), Error>;
}

#[async_trait]
impl ObjectStore for CacheDb {
    async fn load(&self, namespace: &str, name: &str) -> Result<Option<Vec<u8>>, Error> {
        let (namespace, name) = (namespace.to_string(), name.to_string());
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM objects WHERE namespace = ?1 AND name = ?2",
                    params![namespace, name],
                    |row| row.get(0),
                );

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn save(&self, namespace: &str, name: &str, value: &[u8]) -> Result<(), Error> {
        let (namespace, name, value) = (namespace.to_string(), name.to_string(), value.to_vec());
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO objects (namespace, name, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(namespace, name) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![namespace, name, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.save("articles", "Rust", b"{}").await.unwrap();

        assert_eq!(db.load("articles", "Rust").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.save("articles", "Rust", b"a").await.unwrap();

        assert!(db.load("settings", "Rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.save("articles", "Rust", b"v1").await.unwrap();
        db.save("articles", "Rust", b"v2").await.unwrap();

        assert_eq!(db.load("articles", "Rust").await.unwrap(), Some(b"v2".to_vec()));
    }
}
