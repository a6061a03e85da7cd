//! Represents a file relayed to the storage channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Coarse media classification of a stored file.
///
/// Used to pick a fallback MIME type when the platform did not report one.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Document,
}

impl MediaKind {
    /// MIME type served when the stored record carries none.
    pub fn fallback_mime(self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Image => "image/jpeg",
            MediaKind::Document => "application/octet-stream",
        }
    }
}

/// Metadata record of a single file held in the storage channel.
///
/// The record is created by the upload bot and read-only to the gateway,
/// except for the `downloads` and `bandwidth_used` counters which the
/// gateway increments after serving bytes. `file_size` is the authoritative
/// total length used for all range arithmetic and never changes.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Stable public identifier used in stream/download links.
    pub file_hash: String,

    /// Message id locating the stored media in the storage channel.
    pub message_id: i64,

    /// Display name offered in `Content-Disposition`.
    pub file_name: String,

    /// Total size in bytes.
    pub file_size: i64,

    /// Content type reported by the platform, if any.
    pub mime_type: Option<String>,

    /// Coarse media classification.
    pub media_kind: MediaKind,

    /// Number of completed or partial streams served for this file.
    pub downloads: i64,

    /// Bytes actually delivered to clients for this file.
    pub bandwidth_used: i64,

    /// Timestamp when the record was created.
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Content type to serve, falling back by media kind.
    pub fn content_type(&self) -> String {
        self.mime_type
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.media_kind.fallback_mime().to_string())
    }
}
