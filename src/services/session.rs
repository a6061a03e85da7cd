//! Per-shard media session registry.
//!
//! Sessions are created lazily on first use of a shard and live for the
//! rest of the process. A foreign shard (anything other than the client's
//! home shard) needs an authorization exported from the home shard and
//! imported into the new session before it can serve bytes.

use crate::client::{ChatClient, ClientError, ShardSession};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Bound on export/import rounds when a shard keeps rejecting the
/// authorization bytes.
const AUTH_IMPORT_ATTEMPTS: usize = 6;

/// Process-wide cache of one authenticated session per shard.
///
/// Concurrent first requests for the same shard serialize on a per-shard
/// init lock, so the auth handshake runs at most once; later requests hit
/// the map without locking.
pub struct SessionPool {
    client: Arc<dyn ChatClient>,
    sessions: DashMap<i32, Arc<ShardSession>>,
    init_locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl SessionPool {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            sessions: DashMap::new(),
            init_locks: DashMap::new(),
        }
    }

    /// Return the cached session for `shard_id`, creating it on first use.
    pub async fn acquire(&self, shard_id: i32) -> Result<Arc<ShardSession>, ClientError> {
        if let Some(session) = self.sessions.get(&shard_id) {
            return Ok(Arc::clone(&session));
        }

        let lock = self
            .init_locks
            .entry(shard_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have finished the handshake while we waited.
        if let Some(session) = self.sessions.get(&shard_id) {
            return Ok(Arc::clone(&session));
        }

        let session = self.client.create_session(shard_id).await?;
        if shard_id != self.client.home_shard() {
            self.import_foreign_authorization(&session).await?;
        }
        debug!(shard_id, "created media session");

        let session = Arc::new(session);
        self.sessions.insert(shard_id, Arc::clone(&session));
        Ok(session)
    }

    /// Export an authorization from the home shard and import it into the
    /// foreign-shard session, retrying a bounded number of times when the
    /// shard rejects the bytes.
    async fn import_foreign_authorization(
        &self,
        session: &ShardSession,
    ) -> Result<(), ClientError> {
        for attempt in 1..=AUTH_IMPORT_ATTEMPTS {
            let auth = self.client.export_authorization(session.shard_id).await?;
            match self.client.import_authorization(session, &auth).await {
                Ok(()) => return Ok(()),
                Err(ClientError::AuthBytesInvalid(shard)) => {
                    debug!(shard, attempt, "authorization bytes rejected, re-exporting");
                }
                Err(other) => return Err(other),
            }
        }
        Err(ClientError::AuthBytesInvalid(session.shard_id))
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeChatClient;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn home_shard_needs_no_auth_handshake() {
        let client = Arc::new(FakeChatClient::new(2, Vec::new()));
        let pool = SessionPool::new(client.clone());

        let session = pool.acquire(2).await.unwrap();
        assert_eq!(session.shard_id, 2);
        assert_eq!(client.create_session_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.export_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn foreign_shard_runs_export_import() {
        let client = Arc::new(FakeChatClient::new(2, Vec::new()));
        let pool = SessionPool::new(client.clone());

        pool.acquire(4).await.unwrap();
        assert_eq!(client.export_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_rejections_are_retried_then_succeed() {
        let client = Arc::new(FakeChatClient::new(2, Vec::new()));
        client.fail_auth_imports(3);
        let pool = SessionPool::new(client.clone());

        pool.acquire(5).await.unwrap();
        assert_eq!(client.export_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn persistent_auth_rejection_fails_hard() {
        let client = Arc::new(FakeChatClient::new(2, Vec::new()));
        client.fail_auth_imports(AUTH_IMPORT_ATTEMPTS + 1);
        let pool = SessionPool::new(client.clone());

        let err = pool.acquire(5).await.unwrap_err();
        assert!(matches!(err, ClientError::AuthBytesInvalid(5)));
        assert_eq!(pool.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_create_one_session() {
        let client = Arc::new(
            FakeChatClient::new(1, Vec::new()).slow_sessions(Duration::from_millis(50)),
        );
        let pool = Arc::new(SessionPool::new(client.clone()));

        let (a, b) = tokio::join!(pool.acquire(1), pool.acquire(1));
        a.unwrap();
        b.unwrap();
        assert_eq!(client.create_session_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.session_count(), 1);
    }

    #[tokio::test]
    async fn sessions_are_reused_across_acquires() {
        let client = Arc::new(FakeChatClient::new(1, Vec::new()));
        let pool = SessionPool::new(client.clone());

        pool.acquire(1).await.unwrap();
        pool.acquire(1).await.unwrap();
        pool.acquire(1).await.unwrap();
        assert_eq!(client.create_session_calls.load(Ordering::SeqCst), 1);
    }
}
