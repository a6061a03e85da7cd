//! Chat-platform client: the remote API that actually holds file bytes.
//!
//! The gateway only ever talks to the platform through the [`ChatClient`]
//! trait, so the streaming pipeline can be exercised against an in-memory
//! fake. The production implementation in [`http`] speaks the platform's
//! shard-addressed storage API over HTTPS.

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod http;

#[cfg(test)]
pub mod fake;

/// Errors surfaced by platform calls.
///
/// `FloodWait` and `Timeout` are transient and retried by the chunk fetch
/// loop; the remaining variants abort the operation that hit them.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rate limited, retry after {0:?}")]
    FloodWait(Duration),
    #[error("authorization bytes rejected by shard {0}")]
    AuthBytesInvalid(i32),
    #[error("redirected to CDN host `{0}`; CDN fetches are not supported")]
    CdnRedirect(String),
    #[error("platform request timed out")]
    Timeout,
    #[error("message {0} not found in storage channel")]
    MessageNotFound(i64),
    #[error("malformed file reference: {0}")]
    BadFileReference(String),
    #[error(transparent)]
    Transport(reqwest::Error),
    #[error("unexpected platform response: {0}")]
    Unexpected(String),
}

/// Decoded, structured locator for a piece of stored media.
///
/// Derived from the opaque `file_ref` string attached to a message; carries
/// everything a shard fetch call needs. `file_reference` can expire
/// server-side, which is why decoded locators are cached with periodic bulk
/// invalidation rather than forever.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct FileLocation {
    /// Shard (data-center) holding the media.
    pub shard_id: i32,

    /// Media object id within the shard.
    pub media_id: i64,

    /// Access credential paired with `media_id`.
    pub access_hash: i64,

    /// Short-lived server-issued reference blob.
    pub file_reference: Vec<u8>,

    /// Thumbnail selector; empty for full-size media.
    #[serde(default)]
    pub thumbnail_size: String,
}

impl FileLocation {
    /// Decode an opaque file reference (URL-safe base64 over JSON) into a
    /// structured locator.
    pub fn decode(opaque: &str) -> Result<Self, ClientError> {
        let raw = general_purpose::URL_SAFE_NO_PAD
            .decode(opaque)
            .map_err(|err| ClientError::BadFileReference(err.to_string()))?;
        serde_json::from_slice(&raw).map_err(|err| ClientError::BadFileReference(err.to_string()))
    }

    /// Encode back into the opaque wire form.
    pub fn encode(&self) -> String {
        let raw = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::URL_SAFE_NO_PAD.encode(raw)
    }
}

/// A media attachment on a stored message.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MediaAttachment {
    /// Opaque file reference, decodable via [`FileLocation::decode`].
    pub file_ref: String,

    /// Original file name, if the platform kept one.
    #[serde(default)]
    pub file_name: Option<String>,

    /// MIME type reported by the platform.
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A message fetched from the storage channel.
///
/// At most one of the media fields is populated for files relayed by the
/// bot, but the platform allows several; the first populated field wins.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChatMessage {
    pub id: i64,
    #[serde(default)]
    pub document: Option<MediaAttachment>,
    #[serde(default)]
    pub video: Option<MediaAttachment>,
    #[serde(default)]
    pub audio: Option<MediaAttachment>,
    #[serde(default)]
    pub photo: Option<MediaAttachment>,
    #[serde(default)]
    pub voice: Option<MediaAttachment>,
    #[serde(default)]
    pub animation: Option<MediaAttachment>,
}

impl ChatMessage {
    /// First populated media field, if any.
    pub fn media(&self) -> Option<&MediaAttachment> {
        self.document
            .as_ref()
            .or(self.video.as_ref())
            .or(self.audio.as_ref())
            .or(self.photo.as_ref())
            .or(self.voice.as_ref())
            .or(self.animation.as_ref())
    }
}

/// Authenticated connection context for one shard.
///
/// Created lazily by the session pool on first use of a shard and reused
/// for the life of the process.
#[derive(Clone, Debug)]
pub struct ShardSession {
    pub shard_id: i32,
    pub session_key: String,
}

/// Authorization blob exported from the home shard for import elsewhere.
#[derive(Clone, Debug)]
pub struct ExportedAuthorization {
    pub id: i64,
    pub bytes: Vec<u8>,
}

/// Remote platform operations the gateway depends on.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// Shard the bot account is natively authorized against.
    fn home_shard(&self) -> i32;

    /// Fetch a message from a channel.
    async fn get_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<ChatMessage, ClientError>;

    /// Open a media session against a shard.
    async fn create_session(&self, shard_id: i32) -> Result<ShardSession, ClientError>;

    /// Export an authorization for a foreign shard from the home shard.
    async fn export_authorization(
        &self,
        shard_id: i32,
    ) -> Result<ExportedAuthorization, ClientError>;

    /// Import a previously exported authorization into a foreign-shard
    /// session.
    async fn import_authorization(
        &self,
        session: &ShardSession,
        auth: &ExportedAuthorization,
    ) -> Result<(), ClientError>;

    /// Fetch one chunk of media bytes. `offset` must be a multiple of the
    /// requested `limit`; the platform rejects unaligned offsets.
    async fn fetch_chunk(
        &self,
        session: &ShardSession,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<Bytes, ClientError>;
}
