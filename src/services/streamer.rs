//! Chunked byte streaming out of the chat platform.
//!
//! `ByteStreamer` drives the per-chunk fetch loop across a [`RangePlan`]:
//! every chunk is requested at the fixed chunk size from the correct shard
//! session, retried through rate limits and transient failures, trimmed at
//! the range edges, and yielded as a lazy `Stream` item. The stream is
//! finite and non-restartable; a failure after the first byte can only end
//! it early.

use super::StreamError;
use super::metadata_service::MetadataStore;
use super::planner::{CHUNK_SIZE, RangePlan};
use super::resolver::LocationResolver;
use super::session::SessionPool;
use crate::client::{ChatClient, ClientError, FileLocation, ShardSession};
use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Fixed backoff before retrying a timed-out chunk fetch.
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(1);

/// Low-level media streamer over a [`ChatClient`].
///
/// Owns the decoded-locator cache and the per-shard session pool; one
/// instance is shared by every concurrent stream for the life of the
/// process.
pub struct ByteStreamer {
    client: Arc<dyn ChatClient>,
    sessions: SessionPool,
    resolver: Arc<LocationResolver>,
    chunk_size: u64,
    retry_limit: u32,
}

impl ByteStreamer {
    pub fn new(client: Arc<dyn ChatClient>, channel_id: i64, retry_limit: u32) -> Self {
        Self {
            sessions: SessionPool::new(Arc::clone(&client)),
            resolver: Arc::new(LocationResolver::new(Arc::clone(&client), channel_id)),
            client,
            chunk_size: CHUNK_SIZE,
            retry_limit,
        }
    }

    #[cfg(test)]
    pub fn with_chunk_size(
        client: Arc<dyn ChatClient>,
        channel_id: i64,
        retry_limit: u32,
        chunk_size: u64,
    ) -> Self {
        let mut streamer = Self::new(client, channel_id, retry_limit);
        streamer.chunk_size = chunk_size;
        streamer
    }

    /// Unit of all offset arithmetic for this streamer.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Resolve the decoded locator for a stored message, via the cache.
    pub async fn resolve(&self, message_id: i64) -> Result<FileLocation, StreamError> {
        self.resolver.resolve(message_id).await
    }

    /// Start the periodic locator-cache sweep.
    pub fn spawn_cache_sweeper(&self, every: Duration) -> JoinHandle<()> {
        self.resolver.spawn_sweeper(every)
    }

    /// Stream the planned byte range of `location` as trimmed chunks.
    ///
    /// Bytes are yielded strictly in ascending offset order. An empty chunk
    /// from the platform ends the stream without error; a fetch failure
    /// surfaces as one `Err` item and ends it.
    pub fn stream(
        self: &Arc<Self>,
        location: FileLocation,
        plan: RangePlan,
    ) -> impl Stream<Item = Result<Bytes, StreamError>> + Send + 'static {
        let streamer = Arc::clone(self);
        try_stream! {
            let session = streamer.sessions.acquire(location.shard_id).await?;
            let mut offset = plan.aligned_offset;
            for part in 1..=plan.chunk_count {
                let chunk = streamer.fetch_with_retry(&session, &location, offset).await?;
                if chunk.is_empty() {
                    debug!(offset, part, "platform returned empty chunk, ending stream");
                    break;
                }
                yield trim_chunk(&chunk, &plan, part);
                offset += streamer.chunk_size;
            }
        }
    }

    /// Fetch one chunk, sleeping through rate limits and transient errors
    /// up to the retry cap. Anything else aborts immediately.
    async fn fetch_with_retry(
        &self,
        session: &ShardSession,
        location: &FileLocation,
        offset: u64,
    ) -> Result<Bytes, StreamError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .client
                .fetch_chunk(session, location, offset, self.chunk_size as u32)
                .await
            {
                Ok(chunk) => return Ok(chunk),
                Err(ClientError::FloodWait(wait)) if attempt < self.retry_limit => {
                    warn!(
                        offset,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limited while fetching chunk, sleeping"
                    );
                    sleep(wait + Duration::from_secs(1)).await;
                }
                Err(ClientError::Timeout) if attempt < self.retry_limit => {
                    debug!(offset, attempt, "transient fetch failure, backing off");
                    sleep(TRANSIENT_BACKOFF).await;
                }
                Err(err) => {
                    error!(offset, attempt, %err, "chunk fetch failed, aborting stream");
                    return Err(StreamError::Upstream(err));
                }
            }
        }
    }
}

/// Apply the plan's edge trims to a fetched chunk.
///
/// The first chunk loses `leading_trim` bytes from the front, the last
/// keeps only `trailing_trim` bytes, and a single-chunk plan applies both
/// cuts to the same chunk. Slices are clamped to the bytes the platform
/// actually returned.
fn trim_chunk(chunk: &Bytes, plan: &RangePlan, part: u64) -> Bytes {
    if plan.chunk_count == 1 {
        let end = plan.trailing_trim.min(chunk.len());
        let start = plan.leading_trim.min(end);
        chunk.slice(start..end)
    } else if part == 1 {
        let start = plan.leading_trim.min(chunk.len());
        chunk.slice(start..)
    } else if part == plan.chunk_count {
        let end = plan.trailing_trim.min(chunk.len());
        chunk.slice(..end)
    } else {
        chunk.clone()
    }
}

/// Response-body wrapper that counts delivered bytes and flushes them to
/// the bandwidth counters when the stream is dropped.
///
/// Dropping is the one event shared by every way a stream can end: range
/// fully served, upstream abort, or the client hanging up mid-transfer. The
/// counter write is fire-and-forget so the response task never waits on the
/// database.
pub struct TrackedStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>,
    meta: MetadataStore,
    message_id: i64,
    delivered: u64,
}

impl TrackedStream {
    pub fn new(
        inner: impl Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
        meta: MetadataStore,
        message_id: i64,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            meta,
            message_id,
            delivered: 0,
        }
    }
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.as_mut().get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.delivered += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if self.delivered == 0 {
            return;
        }
        let meta = self.meta.clone();
        let message_id = self.message_id;
        let delivered = self.delivered;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = meta.track_bandwidth(message_id, delivered).await {
                    error!(message_id, %err, "failed to record delivered bytes");
                }
            });
        }
    }
}
