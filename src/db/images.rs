//! Database queries for image metadata

use async_trait::async_trait;
use tracing::info;

use super::models::{ImageRecord, NewImage};
use super::pool::{DbPool, DbError};

/// Metadata repository operations the asset coordinator depends on
///
/// `PgImageRepository` is the production implementation; tests substitute
/// an in-memory repository.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a new record and return it with its assigned id
    async fn insert(&self, image: NewImage) -> Result<ImageRecord, DbError>;

    /// Fetch one page of records, newest first
    async fn find_page(&self, offset: i64, limit: i64) -> Result<Vec<ImageRecord>, DbError>;

    /// Total number of records
    async fn count(&self) -> Result<i64, DbError>;

    /// Delete the record with the given storage key
    async fn delete_by_key(&self, key: &str) -> Result<(), DbError>;
}

/// Repository for image metadata backed by PostgreSQL
pub struct PgImageRepository {
    pool: DbPool,
}

impl PgImageRepository {
    /// Create a new image repository
    pub fn new(pool: DbPool) -> Self {
        PgImageRepository { pool }
    }
}

fn record_from_row(row: &tokio_postgres::Row) -> ImageRecord {
    ImageRecord {
        id: row.get("id"),
        key: row.get("key"),
        url: row.get("url"),
        filename: row.get("filename"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn insert(&self, image: NewImage) -> Result<ImageRecord, DbError> {
        let client = self.pool.get().await?;

        let row = client.query_one(
            r#"
            INSERT INTO images (key, url, filename, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, key, url, filename, description, created_at
            "#,
            &[&image.key, &image.url, &image.filename, &image.description]
        ).await?;

        let record = record_from_row(&row);
        info!(key = %record.key, id = record.id, "Inserted image record");
        Ok(record)
    }

    async fn find_page(&self, offset: i64, limit: i64) -> Result<Vec<ImageRecord>, DbError> {
        let client = self.pool.get().await?;

        let rows = client.query(
            r#"
            SELECT id, key, url, filename, description, created_at
            FROM images
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
            &[&offset, &limit]
        ).await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn count(&self) -> Result<i64, DbError> {
        let client = self.pool.get().await?;

        let row = client.query_one("SELECT COUNT(*) AS count FROM images", &[]).await?;
        Ok(row.get::<_, i64>("count"))
    }

    async fn delete_by_key(&self, key: &str) -> Result<(), DbError> {
        let client = self.pool.get().await?;

        let deleted = client.execute(
            r#"DELETE FROM images WHERE key = $1"#,
            &[&key]
        ).await?;

        info!(key = %key, rows = deleted, "Deleted image record");
        Ok(())
    }
}
