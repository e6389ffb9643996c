use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Per-field custom counters, summed across scanner threads. Mirrors the
/// original's handler-specific timing/counter fields exactly, so a handler
/// ported from that contract can populate them without renaming anything.
pub const CUSTOM_STATS_FIELDS: &[&str] = &[
    "es_queue_time",
    "es_queue_wait_count",
    "file_not_found",
    "get_access_time_time",
    "get_acl_time",
    "get_custom_tagging_time",
    "get_dinode_time",
    "get_extra_attr_time",
    "get_user_attr_time",
    "lstat_required",
    "lstat_time",
];

/// Per-thread counters. Each scanner thread owns one; no locking on the hot
/// path, aggregation happens in [`ThreadStats::snapshot`].
#[derive(Default)]
pub struct ThreadStats {
    pub dirs_processed: AtomicU64,
    pub dirs_queued: AtomicU64,
    pub dirs_skipped: AtomicU64,
    pub files_processed: AtomicU64,
    pub files_queued: AtomicU64,
    pub files_skipped: AtomicU64,
    pub file_size_total: AtomicU64,
    pub file_size_physical_total: AtomicU64,
    pub dir_handler_time_nanos: AtomicU64,
    pub file_handler_time_nanos: AtomicU64,
    pub dir_scan_time_nanos: AtomicU64,
    pub q_wait_time_nanos: AtomicU64,
    custom: Mutex<HashMap<String, i64>>,
}

impl ThreadStats {
    pub fn add_custom(&self, field: &str, delta: i64) {
        if !CUSTOM_STATS_FIELDS.contains(&field) {
            return;
        }
        let mut custom = self.custom.lock().unwrap();
        *custom.entry(field.to_string()).or_insert(0) += delta;
    }

    fn custom_snapshot(&self) -> HashMap<String, i64> {
        self.custom.lock().unwrap().clone()
    }
}

/// Aggregated statistics across every scanner thread, produced by
/// [`crate::ScanEngine::get_stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub dirs_processed: u64,
    pub dirs_queued: u64,
    pub dirs_skipped: u64,
    pub files_processed: u64,
    pub files_queued: u64,
    pub files_skipped: u64,
    pub file_size_total: u64,
    pub file_size_physical_total: u64,
    pub dir_handler_time: f64,
    pub file_handler_time: f64,
    pub dir_scan_time: f64,
    pub q_wait_time: f64,
    pub custom: HashMap<String, i64>,
}

pub(crate) fn aggregate(threads: &[std::sync::Arc<ThreadStats>]) -> StatsSnapshot {
    let mut snap = StatsSnapshot::default();
    let mut custom_per_thread = Vec::with_capacity(threads.len());

    for t in threads {
        snap.dirs_processed += t.dirs_processed.load(Ordering::Relaxed);
        snap.dirs_queued += t.dirs_queued.load(Ordering::Relaxed);
        snap.dirs_skipped += t.dirs_skipped.load(Ordering::Relaxed);
        snap.files_processed += t.files_processed.load(Ordering::Relaxed);
        snap.files_queued += t.files_queued.load(Ordering::Relaxed);
        snap.files_skipped += t.files_skipped.load(Ordering::Relaxed);
        snap.file_size_total += t.file_size_total.load(Ordering::Relaxed);
        snap.file_size_physical_total += t.file_size_physical_total.load(Ordering::Relaxed);
        snap.dir_handler_time += t.dir_handler_time_nanos.load(Ordering::Relaxed) as f64 / 1e9;
        snap.file_handler_time += t.file_handler_time_nanos.load(Ordering::Relaxed) as f64 / 1e9;
        snap.dir_scan_time += t.dir_scan_time_nanos.load(Ordering::Relaxed) as f64 / 1e9;
        snap.q_wait_time += t.q_wait_time_nanos.load(Ordering::Relaxed) as f64 / 1e9;
        custom_per_thread.push(t.custom_snapshot());
    }

    for field in CUSTOM_STATS_FIELDS {
        let sum: i64 = custom_per_thread
            .iter()
            .filter_map(|c| c.get(*field))
            .sum();
        if sum != 0 {
            snap.custom.insert(field.to_string(), sum);
        }
    }

    snap
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn aggregate_sums_across_threads() {
        let a = Arc::new(ThreadStats::default());
        let b = Arc::new(ThreadStats::default());
        a.dirs_processed.store(3, Ordering::Relaxed);
        b.dirs_processed.store(5, Ordering::Relaxed);
        a.add_custom("lstat_required", 2);
        b.add_custom("lstat_required", 4);
        b.add_custom("not_a_real_field", 100);

        let snap = aggregate(&[a, b]);
        assert_eq!(snap.dirs_processed, 8);
        assert_eq!(snap.custom.get("lstat_required"), Some(&6));
        assert!(!snap.custom.contains_key("not_a_real_field"));
    }
}
