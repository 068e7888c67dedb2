use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::ShareRecord;

use super::{ShareStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS shares (
    token TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    file_reference TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_size_bytes BIGINT NOT NULL,
    description TEXT,
    password_hash TEXT,
    max_downloads INT,
    current_downloads INT NOT NULL DEFAULT 0,
    upload_time TIMESTAMPTZ NOT NULL,
    expiry_time TIMESTAMPTZ,
    revoked BOOLEAN NOT NULL DEFAULT FALSE,
    reaped BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

/// Postgres-backed share store. The quota transition is a single
/// conditional `UPDATE .. RETURNING`, so the database serializes racing
/// downloads on the same token.
pub struct PgShareStore {
    pool: PgPool,
}

impl PgShareStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> sqlx::Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.into())
}

#[async_trait]
impl ShareStore for PgShareStore {
    async fn create(&self, record: ShareRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shares
                (token, owner, file_reference, file_name, file_size_bytes, description,
                 password_hash, max_downloads, current_downloads, upload_time, expiry_time,
                 revoked, reaped)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(&record.token)
        .bind(&record.owner)
        .bind(&record.file_reference)
        .bind(&record.file_name)
        .bind(record.file_size_bytes)
        .bind(&record.description)
        .bind(&record.password_hash)
        .bind(record.max_downloads)
        .bind(record.current_downloads)
        .bind(record.upload_time)
        .bind(record.expiry_time)
        .bind(record.revoked)
        .bind(record.reaped)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateToken);
        }
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<ShareRecord, StoreError> {
        sqlx::query_as::<_, ShareRecord>("SELECT * FROM shares WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ShareRecord>, StoreError> {
        sqlx::query_as::<_, ShareRecord>(
            "SELECT * FROM shares WHERE owner = $1 AND reaped = FALSE ORDER BY upload_time DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn increment_download(&self, token: &str) -> Result<i32, StoreError> {
        let new_count: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE shares
            SET current_downloads = current_downloads + 1
            WHERE token = $1
              AND (max_downloads IS NULL OR max_downloads = 0
                   OR current_downloads < max_downloads)
            RETURNING current_downloads
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match new_count {
            Some((count,)) => Ok(count),
            // The guard rejected the update; distinguish a missing record
            // from a consumed quota.
            None => match self.get(token).await {
                Ok(_) => Err(StoreError::LimitExceeded),
                Err(err) => Err(err),
            },
        }
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE shares SET revoked = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_reaped(&self, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE shares SET reaped = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ShareRecord>, StoreError> {
        sqlx::query_as::<_, ShareRecord>(
            r#"
            SELECT * FROM shares
            WHERE reaped = FALSE
              AND (revoked = TRUE
                   OR (expiry_time IS NOT NULL AND expiry_time <= $1)
                   OR (max_downloads IS NOT NULL AND max_downloads > 0
                       AND current_downloads >= max_downloads))
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }
}
