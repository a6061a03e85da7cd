//! HTTPS implementation of [`ChatClient`] against the platform's storage API.
//!
//! Shard routing is path-based: every shard exposes its session, auth and
//! file endpoints under `{base}/shards/{shard_id}/`. Message lookups go to
//! the home shard. Redirects are never followed so CDN hand-offs surface as
//! [`ClientError::CdnRedirect`] instead of silently switching hosts.

use super::{
    ChatClient, ChatMessage, ClientError, ExportedAuthorization, FileLocation, ShardSession,
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FLOOD_WAIT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct SessionResponse {
    session_key: String,
}

#[derive(Deserialize)]
struct ExportResponse {
    id: i64,
    bytes: String,
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    id: i64,
    bytes: &'a str,
}

/// Production chat-platform client.
#[derive(Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    home_shard: i32,
}

impl HttpChatClient {
    pub fn new(base_url: &str, bot_token: &str, home_shard: i32) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            home_shard,
        })
    }

    fn shard_url(&self, shard_id: i32, path: &str) -> String {
        format!("{}/shards/{}/{}", self.base_url, shard_id, path)
    }
}

fn map_transport(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(err)
    }
}

/// Read the server-specified wait from a 429 response.
fn flood_wait(response: &reqwest::Response) -> ClientError {
    let wait = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_FLOOD_WAIT);
    ClientError::FloodWait(wait)
}

#[async_trait::async_trait]
impl ChatClient for HttpChatClient {
    fn home_shard(&self) -> i32 {
        self.home_shard
    }

    async fn get_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<ChatMessage, ClientError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.base_url, channel_id, message_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(map_transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::MessageNotFound(message_id)),
            StatusCode::TOO_MANY_REQUESTS => Err(flood_wait(&response)),
            status if status.is_success() => response.json().await.map_err(map_transport),
            status => Err(ClientError::Unexpected(format!(
                "get_message returned {status}"
            ))),
        }
    }

    async fn create_session(&self, shard_id: i32) -> Result<ShardSession, ClientError> {
        let response = self
            .http
            .post(self.shard_url(shard_id, "sessions"))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(map_transport)?;
        if !response.status().is_success() {
            return Err(ClientError::Unexpected(format!(
                "create_session on shard {shard_id} returned {}",
                response.status()
            )));
        }
        let body: SessionResponse = response.json().await.map_err(map_transport)?;
        debug!(shard_id, "opened media session");
        Ok(ShardSession {
            shard_id,
            session_key: body.session_key,
        })
    }

    async fn export_authorization(
        &self,
        shard_id: i32,
    ) -> Result<ExportedAuthorization, ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/export", self.base_url))
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({ "shard_id": shard_id }))
            .send()
            .await
            .map_err(map_transport)?;
        if !response.status().is_success() {
            return Err(ClientError::Unexpected(format!(
                "export_authorization for shard {shard_id} returned {}",
                response.status()
            )));
        }
        let body: ExportResponse = response.json().await.map_err(map_transport)?;
        let bytes = general_purpose::STANDARD
            .decode(&body.bytes)
            .map_err(|err| ClientError::Unexpected(format!("bad auth blob: {err}")))?;
        Ok(ExportedAuthorization { id: body.id, bytes })
    }

    async fn import_authorization(
        &self,
        session: &ShardSession,
        auth: &ExportedAuthorization,
    ) -> Result<(), ClientError> {
        let encoded = general_purpose::STANDARD.encode(&auth.bytes);
        let response = self
            .http
            .post(self.shard_url(session.shard_id, "auth/import"))
            .bearer_auth(&session.session_key)
            .json(&ImportRequest {
                id: auth.id,
                bytes: &encoded,
            })
            .send()
            .await
            .map_err(map_transport)?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClientError::AuthBytesInvalid(session.shard_id))
            }
            status => Err(ClientError::Unexpected(format!(
                "import_authorization on shard {} returned {status}",
                session.shard_id
            ))),
        }
    }

    async fn fetch_chunk(
        &self,
        session: &ShardSession,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<Bytes, ClientError> {
        let mut request = self
            .http
            .get(self.shard_url(session.shard_id, &format!("files/{}", location.media_id)))
            .bearer_auth(&session.session_key)
            .query(&[("offset", offset.to_string()), ("limit", limit.to_string())])
            .header("x-access-hash", location.access_hash.to_string())
            .header(
                "x-file-reference",
                general_purpose::STANDARD.encode(&location.file_reference),
            );
        if !location.thumbnail_size.is_empty() {
            request = request.header("x-thumb-size", &location.thumbnail_size);
        }
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_redirection() {
            let host = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<unknown>")
                .to_string();
            return Err(ClientError::CdnRedirect(host));
        }
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(flood_wait(&response)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClientError::AuthBytesInvalid(session.shard_id))
            }
            s if s.is_success() => response.bytes().await.map_err(map_transport),
            s => Err(ClientError::Unexpected(format!(
                "fetch_chunk at offset {offset} returned {s}"
            ))),
        }
    }
}
