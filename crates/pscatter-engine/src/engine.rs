use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use pscatter_config::EngineConfig;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::handler::{FileHandler, HandlerOutcome};
use crate::queue::{DirQueue, FileBatch, FileQueue};
use crate::stats::{self, StatsSnapshot, ThreadStats};

/// Published per-thread state so `is_processing()` can answer without
/// touching either queue.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Idle = 0,
    ScanningDir = 1,
    HandlingFile = 2,
}

impl From<u8> for ThreadState {
    fn from(v: u8) -> Self {
        match v {
            1 => ThreadState::ScanningDir,
            2 => ThreadState::HandlingFile,
            _ => ThreadState::Idle,
        }
    }
}

const BACKOFF_INITIAL: Duration = Duration::from_millis(1);
const BACKOFF_MAX: Duration = Duration::from_millis(250);

/// Bounded worker pool draining a directory queue and a file queue. See
/// module-level docs for the per-thread scheduling policy.
pub struct ScanEngine<H: FileHandler> {
    handler: Arc<H>,
    dir_queue: Arc<DirQueue>,
    file_queue: Arc<FileQueue>,
    config: EngineConfig,
    thread_stats: Vec<Arc<ThreadStats>>,
    thread_states: Vec<Arc<AtomicU8>>,
    terminate: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl<H: FileHandler + 'static> ScanEngine<H> {
    pub fn new(handler: Arc<H>, config: EngineConfig) -> Arc<Self> {
        let n = config.scanner_threads.max(1);
        Arc::new(Self {
            handler,
            dir_queue: Arc::new(DirQueue::new()),
            file_queue: Arc::new(FileQueue::new()),
            config,
            thread_stats: (0..n).map(|_| Arc::new(ThreadStats::default())).collect(),
            thread_states: (0..n)
                .map(|_| Arc::new(AtomicU8::new(ThreadState::Idle as u8)))
                .collect(),
            terminate: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        })
    }

    pub fn add_scan_path(&self, paths: impl IntoIterator<Item = String>) {
        self.dir_queue.push_many(paths);
    }

    pub fn get_dir_queue_items(&self, count: usize, percentage: Option<f64>) -> Vec<String> {
        self.dir_queue.take_tail(count, percentage)
    }

    pub fn get_dir_queue_size(&self) -> usize {
        self.dir_queue.len()
    }

    pub fn get_file_queue_size(&self) -> usize {
        self.file_queue.len()
    }

    pub fn is_processing(&self) -> bool {
        self.thread_states
            .iter()
            .any(|s| ThreadState::from(s.load(Ordering::Acquire)) != ThreadState::Idle)
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        stats::aggregate(&self.thread_stats)
    }

    /// Spawns the scanner thread pool. `self` must already be held in an
    /// `Arc` (as returned by [`ScanEngine::new`]), since each thread clones
    /// it. Fails if the pool is already running.
    pub fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        let mut threads = self.threads.lock().unwrap();
        if !threads.is_empty() {
            return Err(EngineError::AlreadyStarted);
        }
        for id in 0..self.thread_stats.len() {
            let engine = Arc::clone(self);
            threads.push(std::thread::spawn(move || engine.run_thread(id)));
        }
        Ok(())
    }

    /// Signals every scanner thread to exit after finishing its current
    /// item. Pending queue contents are discarded. `exit_on_idle` is always
    /// false for this engine — only an explicit `terminate()` call ends the
    /// threads.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::Release);
    }

    /// Blocks until every scanner thread has exited.
    pub fn join(&self) {
        let handles: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn set_state(&self, id: usize, state: ThreadState) {
        self.thread_states[id].store(state as u8, Ordering::Release);
    }

    fn run_thread(self: Arc<Self>, id: usize) {
        let stats = Arc::clone(&self.thread_stats[id]);
        let mut thread_state = self.handler.init_thread();
        let mut backoff = BACKOFF_INITIAL;

        loop {
            if self.terminate.load(Ordering::Acquire) {
                self.set_state(id, ThreadState::Idle);
                return;
            }

            let dir_len = self.dir_queue.len();
            let file_len = self.file_queue.len();
            let prefer_dir = dir_len > 0
                && (file_len <= self.config.file_q_cutoff
                    || dir_len > self.config.dir_priority_count);

            if prefer_dir {
                if let Some(dir) = self.dir_queue.pop_front() {
                    self.set_state(id, ThreadState::ScanningDir);
                    self.scan_directory(&dir, &stats);
                    backoff = BACKOFF_INITIAL;
                    continue;
                }
            }

            if let Some(batch) = self.file_queue.pop_front() {
                self.set_state(id, ThreadState::HandlingFile);
                self.handle_batch(batch, &mut thread_state, &stats);
                backoff = BACKOFF_INITIAL;
                continue;
            }

            self.set_state(id, ThreadState::Idle);
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    fn scan_directory(&self, dir: &str, stats: &ThreadStats) {
        let started = Instant::now();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = dir, error = %e, "directory unlistable, skipping");
                stats.dirs_skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let mut file_names = Vec::new();
        let mut subdirs_found = 0u64;
        for entry in entries.flatten() {
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                self.dir_queue
                    .push(entry.path().to_string_lossy().into_owned());
                subdirs_found += 1;
            } else {
                file_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        let chunk_size = self.config.file_chunk.max(1);
        for chunk in file_names.chunks(chunk_size) {
            self.file_queue.push(FileBatch {
                parent: dir.to_string(),
                names: chunk.to_vec(),
            });
            stats
                .files_queued
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        stats.dirs_processed.fetch_add(1, Ordering::Relaxed);
        stats.dirs_queued.fetch_add(subdirs_found, Ordering::Relaxed);
        stats
            .dir_scan_time_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
    }

    fn handle_batch(
        &self,
        batch: FileBatch,
        thread_state: &mut H::ThreadState,
        stats: &ThreadStats,
    ) {
        let started = Instant::now();
        let handler = &self.handler;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler.process_batch(&batch.parent, &batch.names, SystemTime::now(), thread_state, stats)
        }));

        let outcome = outcome.unwrap_or_else(|_| {
            warn!(parent = %batch.parent, "file handler panicked, batch counted as skipped");
            HandlerOutcome {
                processed: 0,
                skipped: batch.names.len() as u64,
                size_total: 0,
                q_dirs: Vec::new(),
            }
        });

        stats
            .files_processed
            .fetch_add(outcome.processed, Ordering::Relaxed);
        stats
            .files_skipped
            .fetch_add(outcome.skipped, Ordering::Relaxed);
        stats
            .file_size_total
            .fetch_add(outcome.size_total, Ordering::Relaxed);
        stats
            .file_handler_time_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);

        if !outcome.q_dirs.is_empty() {
            self.dir_queue.push_many(outcome.q_dirs);
        }
    }
}
