//! Gateway services: range planning, chunked byte streaming, locator and
//! session caching, bandwidth accounting.
//!
//! Everything here is independent of axum; the handlers wire these pieces
//! to the HTTP surface.

use crate::client::ClientError;
use thiserror::Error;

pub mod bandwidth;
pub mod metadata_service;
pub mod planner;
pub mod resolver;
pub mod session;
pub mod streamer;

/// Failure taxonomy of the streaming pipeline.
///
/// `NotFound`, `RangeNotSatisfiable` and `QuotaExceeded` map to dedicated
/// HTTP statuses; `Upstream` covers platform failures that exhausted their
/// retries or are not retryable at all.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error("range {from}-{until} not satisfiable for size {size}")]
    RangeNotSatisfiable { from: u64, until: u64, size: u64 },
    #[error("bandwidth quota exhausted")]
    QuotaExceeded,
    #[error("upstream platform error: {0}")]
    Upstream(#[from] ClientError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
