//! Scripted in-memory [`ChatClient`] used by the streaming tests.
//!
//! Serves chunks out of a single backing blob and lets tests inject faults
//! at specific fetch call numbers, fail authorization imports N times, and
//! count remote calls.

use super::{
    ChatClient, ChatMessage, ClientError, ExportedAuthorization, FileLocation, MediaAttachment,
    ShardSession,
};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct FakeChatClient {
    home: i32,
    blob: Bytes,
    messages: DashMap<i64, ChatMessage>,
    fetch_faults: Mutex<HashMap<usize, ClientError>>,
    auth_failures: AtomicUsize,
    session_delay: Option<Duration>,
    pub get_message_calls: AtomicUsize,
    pub create_session_calls: AtomicUsize,
    pub export_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeChatClient {
    pub fn new(home: i32, blob: impl Into<Bytes>) -> Self {
        Self {
            home,
            blob: blob.into(),
            messages: DashMap::new(),
            fetch_faults: Mutex::new(HashMap::new()),
            auth_failures: AtomicUsize::new(0),
            session_delay: None,
            get_message_calls: AtomicUsize::new(0),
            create_session_calls: AtomicUsize::new(0),
            export_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Register a message carrying a document that points at `location`.
    pub fn add_document_message(&self, message_id: i64, location: &FileLocation) {
        self.messages.insert(
            message_id,
            ChatMessage {
                id: message_id,
                document: Some(MediaAttachment {
                    file_ref: location.encode(),
                    file_name: Some("fake.bin".into()),
                    mime_type: Some("application/octet-stream".into()),
                    size: self.blob.len() as u64,
                }),
                ..ChatMessage::default()
            },
        );
    }

    /// Register a message with no media attached.
    pub fn add_empty_message(&self, message_id: i64) {
        self.messages.insert(
            message_id,
            ChatMessage {
                id: message_id,
                ..ChatMessage::default()
            },
        );
    }

    /// Make the Nth `fetch_chunk` call (1-based) fail with `err`.
    pub fn fail_fetch(&self, call: usize, err: ClientError) {
        self.fetch_faults
            .lock()
            .expect("fetch_faults poisoned")
            .insert(call, err);
    }

    /// Reject the next `n` authorization imports with `AuthBytesInvalid`.
    pub fn fail_auth_imports(&self, n: usize) {
        self.auth_failures.store(n, Ordering::SeqCst);
    }

    /// Delay session creation, to widen races in pool tests.
    pub fn slow_sessions(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl ChatClient for FakeChatClient {
    fn home_shard(&self) -> i32 {
        self.home
    }

    async fn get_message(
        &self,
        _channel_id: i64,
        message_id: i64,
    ) -> Result<ChatMessage, ClientError> {
        self.get_message_calls.fetch_add(1, Ordering::SeqCst);
        self.messages
            .get(&message_id)
            .map(|entry| entry.value().clone())
            .ok_or(ClientError::MessageNotFound(message_id))
    }

    async fn create_session(&self, shard_id: i32) -> Result<ShardSession, ClientError> {
        self.create_session_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.session_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ShardSession {
            shard_id,
            session_key: format!("fake-session-{shard_id}"),
        })
    }

    async fn export_authorization(
        &self,
        _shard_id: i32,
    ) -> Result<ExportedAuthorization, ClientError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExportedAuthorization {
            id: 1,
            bytes: vec![0xAB; 8],
        })
    }

    async fn import_authorization(
        &self,
        session: &ShardSession,
        _auth: &ExportedAuthorization,
    ) -> Result<(), ClientError> {
        let remaining = self.auth_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.auth_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::AuthBytesInvalid(session.shard_id));
        }
        Ok(())
    }

    async fn fetch_chunk(
        &self,
        _session: &ShardSession,
        _location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<Bytes, ClientError> {
        assert_eq!(offset % limit as u64, 0, "unaligned fetch offset");
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self
            .fetch_faults
            .lock()
            .expect("fetch_faults poisoned")
            .remove(&call)
        {
            return Err(err);
        }
        let len = self.blob.len() as u64;
        if offset >= len {
            return Ok(Bytes::new());
        }
        let end = (offset + limit as u64).min(len);
        Ok(self.blob.slice(offset as usize..end as usize))
    }
}

/// A locator on the given shard, paired with nothing in particular.
pub fn fake_location(shard_id: i32) -> FileLocation {
    FileLocation {
        shard_id,
        media_id: 42,
        access_hash: 0x5EED,
        file_reference: vec![1, 2, 3, 4],
        thumbnail_size: String::new(),
    }
}
