//! Metadata store: file records and bandwidth counters in SQLite.
//!
//! The gateway reads file records created by the upload bot and writes the
//! download/bandwidth counters after serving bytes. Counter updates are
//! plain `x = x + ?` increments so concurrent streams never lose writes.

use crate::models::{
    bandwidth::{BandwidthStats, GatewayStats},
    file_record::FileRecord,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<SqlitePool>,
}

impl MetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Look up a file record by its public hash.
    pub async fn get_file_by_hash(&self, file_hash: &str) -> Result<Option<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, file_hash, message_id, file_name, file_size, mime_type,
                    media_kind, downloads, bandwidth_used, created_at
             FROM files WHERE file_hash = ?",
        )
        .bind(file_hash)
        .fetch_optional(&*self.db)
        .await
    }

    /// Cumulative bytes served, total and for the current UTC day.
    pub async fn get_bandwidth_stats(&self) -> Result<BandwidthStats, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(total_bytes), 0) FROM bandwidth")
            .fetch_one(&*self.db)
            .await?;
        let today: Option<i64> = sqlx::query_scalar("SELECT total_bytes FROM bandwidth WHERE date = ?")
            .bind(today_key())
            .fetch_optional(&*self.db)
            .await?;
        Ok(BandwidthStats {
            total,
            today: today.unwrap_or(0),
        })
    }

    /// Record `bytes` delivered for the file stored at `message_id`.
    ///
    /// Increments the per-file counters and upserts the per-day row, all as
    /// atomic additions. `bytes` is what was actually written to the client,
    /// not the nominal requested length.
    pub async fn track_bandwidth(&self, message_id: i64, bytes: u64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE files
             SET bandwidth_used = bandwidth_used + ?, downloads = downloads + 1
             WHERE message_id = ?",
        )
        .bind(bytes as i64)
        .bind(message_id)
        .execute(&*self.db)
        .await?;

        sqlx::query(
            "INSERT INTO bandwidth (date, total_bytes, last_updated)
             VALUES (?, ?, ?)
             ON CONFLICT(date) DO UPDATE SET
                 total_bytes = total_bytes + excluded.total_bytes,
                 last_updated = excluded.last_updated",
        )
        .bind(today_key())
        .bind(bytes as i64)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    /// Aggregate statistics for the stats endpoint.
    pub async fn get_stats(&self) -> Result<GatewayStats, sqlx::Error> {
        let (total_files, total_downloads): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(downloads), 0) FROM files",
        )
        .fetch_one(&*self.db)
        .await?;
        let bandwidth = self.get_bandwidth_stats().await?;
        Ok(GatewayStats {
            total_files,
            total_downloads,
            total_bandwidth: bandwidth.total,
            today_bandwidth: bandwidth.today,
        })
    }
}

/// ISO date key for the current UTC day.
fn today_key() -> String {
    Utc::now().date_naive().to_string()
}
