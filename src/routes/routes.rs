//! Defines routes for the streaming gateway.
//!
//! ## Structure
//! - **Streaming endpoints**
//!   - `GET /stream/{file_hash}` — stream media (inline disposition)
//!   - `GET /dl/{file_hash}`     — download media (attachment disposition)
//!
//! - **Statistics endpoints**
//!   - `GET /stats`     — file/download/bandwidth totals
//!   - `GET /bandwidth` — quota usage detail
//!
//! Both streaming routes honor single-range `Range` headers and stream the
//! body chunk-by-chunk from the chat platform.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        stream_handlers::{bandwidth, download_file, stats, stream_file},
    },
    state::AppState,
};
use axum::{Router, routing::get};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // streaming routes
        .route("/stream/{file_hash}", get(stream_file))
        .route("/dl/{file_hash}", get(download_file))
        // statistics routes
        .route("/stats", get(stats))
        .route("/bandwidth", get(bandwidth))
}
