use std::time::Instant;

use pscatter_proto::WireStats;

/// Mirrors spec.md §3's worker-state `status` values exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Starting,
    Running,
    Idle,
    Stopped,
}

/// Coordinator-side bookkeeping for one connected worker (spec.md §3
/// "worker-state record"). `want_data`/`sent_data` are `Option<Instant>`
/// standing in for the original's "timestamp, or 0" convention — `None`
/// is the zero value, truthiness is all either field's callers need.
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub status: WorkerStatus,
    pub dir_count: u64,
    pub want_data: Option<Instant>,
    pub sent_data: Option<Instant>,
    pub stats: WireStats,
    pub stats_time: Option<Instant>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self {
            status: WorkerStatus::Starting,
            dir_count: 0,
            want_data: None,
            sent_data: None,
            stats: WireStats::default(),
            stats_time: None,
        }
    }

    /// spec.md §3: "`status in {idle, stopped}` is the only condition
    /// under which the coordinator may send `quit`" — also doubles as the
    /// per-worker contribution to the termination check's `idle_workers` set.
    pub fn counts_as_idle(&self) -> bool {
        matches!(self.status, WorkerStatus::Idle | WorkerStatus::Stopped)
    }

    /// spec.md §4.5 step 3: `workers_with_dirs`.
    pub fn has_spare_dirs(&self) -> bool {
        self.dir_count > 1
    }

    /// spec.md §4.5 step 3: `workers_wanting_work`.
    pub fn wants_work(&self) -> bool {
        self.want_data.is_some()
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}
