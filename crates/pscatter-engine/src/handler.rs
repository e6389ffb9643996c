use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::stats::ThreadStats;

/// Result of processing one file batch.
#[derive(Debug, Default)]
pub struct HandlerOutcome {
    pub processed: u64,
    pub skipped: u64,
    /// Total (logical) bytes across processed files.
    pub size_total: u64,
    /// Additional directories the handler wants enqueued — e.g. a
    /// snapshot-fan-out path discovered while stat-ing an entry.
    pub q_dirs: Vec<String>,
}

/// The pluggable per-file metadata extraction step. The engine calls this
/// once per file batch; everything it does (opening inodes, reading
/// extended attributes, translating identity, talking to a sink) is this
/// system's external collaborator, not the engine's concern.
pub trait FileHandler: Send + Sync {
    type ThreadState: Send;

    /// Called once per scanner thread at startup; the returned value is
    /// threaded through every subsequent `process_batch` call on that
    /// thread (a per-thread scratch area, e.g. an identity-cache handle or
    /// sink queue sender).
    fn init_thread(&self) -> Self::ThreadState;

    fn process_batch(
        &self,
        root: &str,
        names: &[String],
        now: SystemTime,
        thread_state: &mut Self::ThreadState,
        stats: &ThreadStats,
    ) -> HandlerOutcome;
}

/// Discards everything; used where only the engine's own queue/statistics
/// behavior is under test.
pub struct NullFileHandler;

impl FileHandler for NullFileHandler {
    type ThreadState = ();

    fn init_thread(&self) {}

    fn process_batch(
        &self,
        _root: &str,
        names: &[String],
        _now: SystemTime,
        _thread_state: &mut (),
        _stats: &ThreadStats,
    ) -> HandlerOutcome {
        HandlerOutcome {
            processed: names.len() as u64,
            skipped: 0,
            size_total: 0,
            q_dirs: Vec::new(),
        }
    }
}

/// Reimplements the original's `file_handler_basic`: a plain `stat` per
/// entry, recording size only. No ACL/extended-attribute/storage-pool
/// extraction — that work belongs to a handler variant this system does
/// not implement.
pub struct BasicFileHandler;

impl FileHandler for BasicFileHandler {
    type ThreadState = ();

    fn init_thread(&self) {}

    fn process_batch(
        &self,
        root: &str,
        names: &[String],
        _now: SystemTime,
        _thread_state: &mut (),
        stats: &ThreadStats,
    ) -> HandlerOutcome {
        let mut processed = 0u64;
        let mut skipped = 0u64;
        let mut size_total = 0u64;

        for name in names {
            let full_path = std::path::Path::new(root).join(name);
            match std::fs::symlink_metadata(&full_path) {
                Ok(meta) => {
                    processed += 1;
                    size_total += meta.len();
                }
                Err(_) => {
                    skipped += 1;
                    stats.add_custom("file_not_found", 1);
                }
            }
        }

        HandlerOutcome {
            processed,
            skipped,
            size_total,
            q_dirs: Vec::new(),
        }
    }
}

/// Test double counting calls, for exercising the engine's threading model
/// without touching the filesystem through a real handler.
#[derive(Default)]
pub struct CountingFileHandler {
    pub batches_seen: AtomicU64,
}

impl FileHandler for CountingFileHandler {
    type ThreadState = ();

    fn init_thread(&self) {}

    fn process_batch(
        &self,
        _root: &str,
        names: &[String],
        _now: SystemTime,
        _thread_state: &mut (),
        _stats: &ThreadStats,
    ) -> HandlerOutcome {
        self.batches_seen.fetch_add(1, Ordering::Relaxed);
        HandlerOutcome {
            processed: names.len() as u64,
            skipped: 0,
            size_total: 0,
            q_dirs: Vec::new(),
        }
    }
}
