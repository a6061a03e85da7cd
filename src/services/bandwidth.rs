//! Global bandwidth quota enforcement.
//!
//! Consulted once per stream request, before any remote fetch. The read is
//! eventually consistent with in-flight streams; a slightly stale check is
//! acceptable.

use super::{StreamError, StreamResult};
use super::metadata_service::MetadataStore;
use crate::models::bandwidth::BandwidthStats;

/// Checks cumulative served bytes against the configured quota.
#[derive(Clone)]
pub struct BandwidthGuard {
    meta: MetadataStore,
    quota_bytes: u64,
    enforced: bool,
}

impl BandwidthGuard {
    pub fn new(meta: MetadataStore, quota_bytes: u64, enforced: bool) -> Self {
        Self {
            meta,
            quota_bytes,
            enforced,
        }
    }

    /// Ceiling on cumulative bytes served.
    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Read current usage and fail with `QuotaExceeded` when enforcement is
    /// on and the total has reached the quota. Pure read, no side effects.
    pub async fn check(&self) -> StreamResult<BandwidthStats> {
        let stats = self.meta.get_bandwidth_stats().await?;
        if self.enforced && stats.total as u64 >= self.quota_bytes {
            return Err(StreamError::QuotaExceeded);
        }
        Ok(stats)
    }
}
