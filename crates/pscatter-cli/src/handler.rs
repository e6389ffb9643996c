use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use pscatter_engine::{FileHandler, HandlerOutcome, ThreadStats};
use pscatter_sink::{FileRecord, Sink, SinkForwarderPool};
use serde_json::json;
use tokio::runtime::Handle;

/// Default `--handler basic` implementation: a plain `stat` per entry
/// (size, type, mtime), forwarded to the worker's sink pool. No
/// ACL/extended-attribute/storage-pool extraction — that belongs to a
/// handler variant this system does not implement (spec.md §1).
///
/// `process_batch` runs on a scanner thread (a plain `std::thread`, not a
/// tokio task), so handing a batch to the forwarder pool's async queue
/// goes through the enclosing runtime's `Handle::block_on` rather than
/// `.await` — the same sync-into-async bridge `vrift-cli::main` uses at
/// its own entry point, just applied per-call instead of once at startup.
pub struct SinkFileHandler<S: Sink + 'static> {
    sink_pool: Arc<SinkForwarderPool<S>>,
    runtime: Handle,
}

impl<S: Sink + 'static> SinkFileHandler<S> {
    pub fn new(sink_pool: Arc<SinkForwarderPool<S>>, runtime: Handle) -> Self {
        Self { sink_pool, runtime }
    }
}

impl<S: Sink + 'static> FileHandler for SinkFileHandler<S> {
    type ThreadState = ();

    fn init_thread(&self) {}

    fn process_batch(
        &self,
        root: &str,
        names: &[String],
        now: SystemTime,
        _thread_state: &mut (),
        stats: &ThreadStats,
    ) -> HandlerOutcome {
        let mut processed = 0u64;
        let mut skipped = 0u64;
        let mut size_total = 0u64;
        let mut records = Vec::with_capacity(names.len());
        let observed_at = now
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        for name in names {
            let full_path = Path::new(root).join(name);
            match std::fs::symlink_metadata(&full_path) {
                Ok(meta) => {
                    processed += 1;
                    size_total += meta.len();
                    records.push(FileRecord::new(json!({
                        "path": full_path.to_string_lossy(),
                        "size": meta.len(),
                        "is_dir": meta.is_dir(),
                        "is_symlink": meta.file_type().is_symlink(),
                        "observed_at": observed_at,
                    })));
                }
                Err(_) => skipped += 1,
            }
        }

        if !records.is_empty() {
            let started = Instant::now();
            let sink_pool = Arc::clone(&self.sink_pool);
            self.runtime.block_on(sink_pool.push_send(records));
            stats.add_custom("es_queue_wait_count", 1);
            stats.add_custom("es_queue_time", started.elapsed().as_micros() as i64);
        }

        HandlerOutcome {
            processed,
            skipped,
            size_total,
            q_dirs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pscatter_config::SinkConfig;
    use pscatter_sink::NullSink;

    // `process_batch` calls `Handle::block_on`, which panics if invoked
    // directly on a tokio worker thread — so these tests drive it through
    // `spawn_blocking`, the same way `ScanEngine` calls it from a plain
    // `std::thread`, rather than calling it inline in the test body.

    #[tokio::test]
    async fn stats_an_existing_file_and_forwards_a_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"hello").unwrap();

        let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), SinkConfig::default());
        sink_pool.start();
        let handler = SinkFileHandler::new(Arc::clone(&sink_pool), Handle::current());

        let root = dir.path().to_string_lossy().into_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            handler.process_batch(&root, &["f".to_string()], SystemTime::now(), &mut (), &ThreadStats::default())
        })
        .await
        .unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.size_total, 5);
    }

    #[tokio::test]
    async fn missing_entry_is_counted_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), SinkConfig::default());
        sink_pool.start();
        let handler = SinkFileHandler::new(Arc::clone(&sink_pool), Handle::current());

        let root = dir.path().to_string_lossy().into_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            handler.process_batch(
                &root,
                &["does-not-exist".to_string()],
                SystemTime::now(),
                &mut (),
                &ThreadStats::default(),
            )
        })
        .await
        .unwrap();

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.skipped, 1);
    }
}
