//! Point-in-time statistics of a queue group

use super::worker::PoolShared;
use crate::group::{IndexQueueGroupManager, KeyQueueGroupManager, QueueGroupManager};
use crate::queue::BackpressureStatsSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of pool, lane and backpressure counters.
///
/// Serializes to JSON for logs and monitoring endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueGroupStats {
    /// Thread name prefix of the group
    pub name: String,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Worker threads alive
    pub live_workers: usize,
    /// Workers waiting on the boss queue
    pub idle_workers: usize,
    /// Ready signals not yet taken by a worker
    pub pending_signals: usize,
    /// Index lanes created so far
    pub index_lanes: usize,
    /// Key lanes created so far
    pub key_lanes: usize,
    /// Tasks finished across both managers
    pub completed_tasks: u64,
    /// Tasks that failed or panicked
    pub failed_tasks: u64,
    /// Tasks that panicked
    pub panicked_tasks: u64,
    /// Lanes claimed and drained by workers
    pub drain_passes: u64,
    /// Signals discarded because their lane was already claimed
    pub signals_dropped: u64,
    /// Boss queue publish outcomes
    pub backpressure: BackpressureStatsSnapshot,
}

impl QueueGroupStats {
    pub(crate) fn collect(
        shared: &PoolShared,
        index: &IndexQueueGroupManager,
        keys: &KeyQueueGroupManager,
        backpressure: BackpressureStatsSnapshot,
    ) -> Self {
        let index_lanes = index.executors();
        let key_lanes = keys.executors();
        let (index_count, key_count) = (index_lanes.len(), key_lanes.len());
        let lanes: Vec<_> = index_lanes.into_iter().chain(key_lanes).collect();
        let workers = shared.aggregate_stats();

        Self {
            name: shared.name().to_string(),
            timestamp: Utc::now(),
            live_workers: shared.live_workers(),
            idle_workers: shared.idle_workers(),
            pending_signals: shared.boss.len(),
            index_lanes: index_count,
            key_lanes: key_count,
            completed_tasks: lanes.iter().map(|l| l.completed_task_count()).sum(),
            failed_tasks: lanes.iter().map(|l| l.failed_task_count()).sum(),
            panicked_tasks: lanes.iter().map(|l| l.panicked_task_count()).sum(),
            drain_passes: workers.get_drain_passes(),
            signals_dropped: workers.get_signals_dropped(),
            backpressure,
        }
    }

    /// Renders the snapshot as one line of JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
