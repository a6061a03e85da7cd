//! Shared application state handed to every handler.

use crate::services::{
    bandwidth::BandwidthGuard, metadata_service::MetadataStore, streamer::ByteStreamer,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// File records and bandwidth counters.
    pub meta: MetadataStore,

    /// Shared media streamer (locator cache + shard sessions).
    pub streamer: Arc<ByteStreamer>,

    /// Global quota check.
    pub guard: BandwidthGuard,
}
