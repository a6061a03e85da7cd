//! Location resolution: message id in the storage channel → decoded locator.
//!
//! Decoded locators are cached so repeat streams of the same file skip the
//! message lookup. The platform's file references expire server-side, so
//! the whole cache is dropped on a fixed interval rather than per entry;
//! the burst of cold misses after a sweep is accepted for simplicity.

use super::{StreamError, StreamResult};
use crate::client::{ChatClient, ClientError, FileLocation};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Resolves and caches decoded file locators.
pub struct LocationResolver {
    client: Arc<dyn ChatClient>,
    channel_id: i64,
    cache: DashMap<i64, FileLocation>,
}

impl LocationResolver {
    pub fn new(client: Arc<dyn ChatClient>, channel_id: i64) -> Self {
        Self {
            client,
            channel_id,
            cache: DashMap::new(),
        }
    }

    /// Decode the locator for `message_id`, fetching the message on a cache
    /// miss.
    ///
    /// Concurrent misses for the same id may both fetch; the decode is a
    /// pure function of the stored message, so last write wins harmlessly.
    pub async fn resolve(&self, message_id: i64) -> StreamResult<FileLocation> {
        if let Some(location) = self.cache.get(&message_id) {
            return Ok(location.clone());
        }
        debug!(message_id, "locator cache miss, fetching message");

        let message = self
            .client
            .get_message(self.channel_id, message_id)
            .await
            .map_err(|err| match err {
                ClientError::MessageNotFound(_) => StreamError::NotFound(message_id.to_string()),
                other => StreamError::Upstream(other),
            })?;
        let media = message
            .media()
            .ok_or_else(|| StreamError::NotFound(message_id.to_string()))?;
        let location = FileLocation::decode(&media.file_ref)?;

        self.cache.insert(message_id, location.clone());
        Ok(location)
    }

    /// Drop every cached locator.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Spawn the periodic bulk-invalidation sweep.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                resolver.invalidate_all();
                debug!("cleared decoded locator cache");
            }
        })
    }
}
