//! Shared fixtures for the in-crate test modules.

use crate::models::file_record::FileRecord;
use crate::services::metadata_service::MetadataStore;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Fresh in-memory SQLite store with the gateway schema applied.
pub async fn memory_store() -> MetadataStore {
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("apply schema statement");
    }
    MetadataStore::new(Arc::new(pool))
}

/// Insert a minimal file record the gateway can serve.
pub async fn insert_file(meta: &MetadataStore, file_hash: &str, message_id: i64, size: i64) {
    sqlx::query(
        "INSERT INTO files (id, file_hash, message_id, file_name, file_size,
                            mime_type, media_kind, downloads, bandwidth_used, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 'document', 0, 0, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(file_hash)
    .bind(message_id)
    .bind(format!("{file_hash}.bin"))
    .bind(size)
    .bind(Option::<String>::None)
    .bind(Utc::now())
    .execute(meta.pool())
    .await
    .expect("insert file record");
}

/// Seed the bandwidth table with `total` bytes for today.
pub async fn seed_bandwidth(meta: &MetadataStore, total: i64) {
    sqlx::query(
        "INSERT INTO bandwidth (date, total_bytes, last_updated) VALUES (?, ?, ?)",
    )
    .bind(Utc::now().date_naive().to_string())
    .bind(total)
    .bind(Utc::now())
    .execute(meta.pool())
    .await
    .expect("seed bandwidth");
}

/// Wait for the fire-and-forget bandwidth write to land, then return the
/// updated record.
pub async fn wait_for_tracked(meta: &MetadataStore, file_hash: &str) -> FileRecord {
    for _ in 0..100 {
        if let Some(record) = meta
            .get_file_by_hash(file_hash)
            .await
            .expect("query file record")
        {
            if record.bandwidth_used > 0 {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("bandwidth for {file_hash} was never recorded");
}
