//! `SQLite` implementation of [`RecordStore`].

use std::future::Future;

use chrono::Utc;
use sqlx::SqlitePool;

use sprinkler_app::ports::RecordStore;
use sprinkler_domain::error::SprinklerError;

use crate::error::StorageError;

const UPSERT: &str = "INSERT INTO records (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const SELECT_BY_KEY: &str = "SELECT value FROM records WHERE key = ?";
const SELECT_KEYS: &str = "SELECT key FROM records ORDER BY key";
const DELETE_BY_KEY: &str = "DELETE FROM records WHERE key = ?";

/// `SQLite`-backed record store. Each call is a single statement, so it is
/// atomic for its key.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every stored key, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Storage`] if the query fails.
    pub async fn keys(&self) -> Result<Vec<String>, SprinklerError> {
        let rows: Vec<(String,)> = sqlx::query_as(SELECT_KEYS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}

impl RecordStore for SqliteRecordStore {
    fn write(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<(), SprinklerError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        async move {
            sqlx::query(UPSERT)
                .bind(&key)
                .bind(value)
                .bind(Utc::now().to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            tracing::trace!(key = %key, "record written");
            Ok(())
        }
    }

    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, SprinklerError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        async move {
            let row: Option<(Vec<u8>,)> = sqlx::query_as(SELECT_BY_KEY)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|(value,)| value))
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), SprinklerError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        async move {
            sqlx::query(DELETE_BY_KEY)
                .bind(&key)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
