//! Aggregated bandwidth accounting read back from the metadata store.

use serde::{Deserialize, Serialize};

/// Cumulative bytes served, total and for the current UTC day.
///
/// Values are eventually consistent: concurrent streams report their
/// delivered bytes as fire-and-forget increments after completion, so a
/// reader may briefly observe slightly stale totals.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct BandwidthStats {
    /// All bytes ever delivered to clients.
    pub total: i64,

    /// Bytes delivered since UTC midnight.
    pub today: i64,
}

/// Top-level gateway statistics exposed by the stats endpoint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct GatewayStats {
    /// Number of file records known to the metadata store.
    pub total_files: i64,

    /// Sum of per-file download counters.
    pub total_downloads: i64,

    /// All bytes ever delivered to clients.
    pub total_bandwidth: i64,

    /// Bytes delivered since UTC midnight.
    pub today_bandwidth: i64,
}
