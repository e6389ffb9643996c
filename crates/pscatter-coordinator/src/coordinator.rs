use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use pscatter_config::{log_coordinator_debug, log_coordinator_info, log_coordinator_warn, CoordinatorConfig};
use pscatter_proto::{ClientId, Command as ProtoCommand, ControlMessage, Listener, WireStats};
use pscatter_stats::SlidingWindowStats;

use crate::accept::spawn_accept_loop;
use crate::error::CoordinatorError;
use crate::event::CoordinatorEvent;
use crate::launcher::{NodeSpec, RemoteLauncher};
use crate::signals::spawn_signal_listeners;
use crate::state::{WorkerState, WorkerStatus};

/// Interim/final FPS rate buckets (spec.md §4.6's example: short/medium/
/// long windows for the throughput printout).
const FPS_BUCKETS_SECS: [u64; 3] = [60, 300, 900];

/// Owns the global work list and worker-state table, and runs the single
/// rebalancing event loop described by spec.md §4.5.
pub struct Coordinator {
    config: CoordinatorConfig,
    launcher: Box<dyn RemoteLauncher>,
    node_list: Vec<NodeSpec>,
    work_list: VecDeque<String>,
    workers: HashMap<ClientId, WorkerState>,
    outboxes: HashMap<ClientId, mpsc::UnboundedSender<ControlMessage>>,
    debug_enabled: bool,
    fps_window: SlidingWindowStats,
    last_files_processed: u64,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        launcher: Box<dyn RemoteLauncher>,
        node_list: Vec<NodeSpec>,
        initial_work: Vec<String>,
    ) -> Self {
        let fps_window = SlidingWindowStats::new(
            &FPS_BUCKETS_SECS.map(Duration::from_secs),
            config.stats_interval(),
        );
        Self {
            config,
            launcher,
            node_list,
            work_list: initial_work.into(),
            workers: HashMap::new(),
            outboxes: HashMap::new(),
            debug_enabled: false,
            fps_window,
            last_files_processed: 0,
        }
    }

    /// Runs until an operator quit (SIGINT, `command{cmd: quit}`, or the
    /// natural idle-and-empty termination check) drains the scan, printing
    /// a final statistics report before returning.
    pub async fn run(mut self, listener: Listener) -> Result<(), CoordinatorError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<CoordinatorEvent>();

        spawn_accept_loop(listener, events_tx.clone());
        spawn_signal_listeners(events_tx.clone());
        drop(events_tx);

        if let Err(e) = self.launcher.launch(&self.node_list) {
            log_coordinator_warn!("remote launch failed", error = format!("{e}"));
        }

        let start = Instant::now();
        let mut last_stats_report = Instant::now();

        loop {
            let outcome = tokio::time::timeout(self.config.queue_timeout(), events_rx.recv()).await;

            let quit_requested = match outcome {
                Ok(Some(event)) => !self.handle_event(event),
                Ok(None) => true,
                Err(_) => false,
            };

            if quit_requested {
                self.broadcast_quit();
                break;
            }

            if last_stats_report.elapsed() >= self.config.stats_interval() {
                self.print_interim_stats(start.elapsed());
                last_stats_report = Instant::now();
            }

            let (idle_workers, have_dirs, mut wants_work, continue_running) = self.compute_sets();

            if idle_workers == self.workers.len() && self.work_list.is_empty() {
                self.broadcast_quit();
            } else {
                self.distribute(&mut wants_work);
                self.solicit(&have_dirs, &wants_work);
            }

            if !continue_running {
                break;
            }
        }

        self.print_final_stats(start.elapsed());
        Ok(())
    }

    /// Returns `false` when this event means the whole coordinator should
    /// shut down (an explicit operator quit), `true` otherwise.
    fn handle_event(&mut self, event: CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::ClientConnected(id, outbox) => {
                self.outboxes.insert(id, outbox);
                self.on_client_connected(id);
                true
            }
            CoordinatorEvent::ClientMessage(id, msg) => self.dispatch_message(id, msg),
            CoordinatorEvent::ClientClosed(id) => {
                self.workers.remove(&id);
                self.outboxes.remove(&id);
                log_coordinator_debug!("worker disconnected", client_id = id);
                true
            }
            CoordinatorEvent::RemoteCallback(Ok(())) => true,
            CoordinatorEvent::RemoteCallback(Err(e)) => {
                log_coordinator_warn!("remote launch callback reported failure", error = format!("{e}"));
                true
            }
            CoordinatorEvent::Quit => false,
            CoordinatorEvent::ToggleDebug => {
                self.debug_enabled = !self.debug_enabled;
                log_coordinator_info!("debug toggled", enabled = self.debug_enabled);
                true
            }
            CoordinatorEvent::DumpState => {
                self.dump_state();
                true
            }
        }
    }

    /// Registers state for a newly connected worker and, mirroring the
    /// original's connect handshake, hands it a single work item
    /// immediately if the global list is non-empty.
    fn on_client_connected(&mut self, id: ClientId) {
        let mut state = WorkerState::new();
        state.want_data = Some(Instant::now());
        if let Some(path) = self.work_list.pop_front() {
            self.send(id, ControlMessage::ClientDirList { work_item: vec![path] });
            state.want_data = None;
        }
        log_coordinator_info!("worker connected", client_id = id, worker_count = self.workers.len() + 1);
        self.workers.insert(id, state);
    }

    fn dispatch_message(&mut self, id: ClientId, msg: ControlMessage) -> bool {
        let now = Instant::now();
        match msg {
            ControlMessage::WorkerDirList { work_item } => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.sent_data = None;
                    w.want_data = None;
                }
                log_coordinator_debug!("worker returned directories", client_id = id, count = work_item.len());
                self.work_list.extend(work_item);
                true
            }
            ControlMessage::WorkerReqDirList => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.want_data = Some(now);
                }
                true
            }
            ControlMessage::WorkerStateIdle => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.status = WorkerStatus::Idle;
                    w.want_data = Some(now);
                }
                true
            }
            ControlMessage::WorkerStateRunning => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.status = WorkerStatus::Running;
                    w.want_data = None;
                }
                true
            }
            ControlMessage::WorkerStateStopped => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.status = WorkerStatus::Stopped;
                    w.want_data = None;
                }
                true
            }
            ControlMessage::WorkerStatusDirCount { count } => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.dir_count = count;
                }
                true
            }
            ControlMessage::WorkerStatusStats { stats } => {
                if let Some(w) = self.workers.get_mut(&id) {
                    w.stats = stats;
                    w.stats_time = Some(now);
                }
                true
            }
            ControlMessage::Command { cmd } => match cmd {
                ProtoCommand::Quit => false,
                ProtoCommand::DumpState => {
                    self.dump_state();
                    true
                }
                ProtoCommand::ToggleDebug => {
                    self.debug_enabled = !self.debug_enabled;
                    log_coordinator_info!("debug toggled", enabled = self.debug_enabled);
                    true
                }
            },
            other => {
                log_coordinator_debug!(
                    "ignoring unexpected message direction",
                    client_id = id,
                    message = format!("{other:?}")
                );
                true
            }
        }
    }

    /// spec.md §4.5 step 3: the three worker sets, plus whether the loop
    /// should keep running at all (any connected non-stopped worker, or
    /// unclaimed work with nobody connected yet).
    fn compute_sets(&self) -> (usize, Vec<ClientId>, Vec<ClientId>, bool) {
        let mut idle_workers = 0;
        let mut have_dirs = Vec::new();
        let mut wants_work = Vec::new();
        let mut continue_running = false;

        for (&id, w) in &self.workers {
            if w.status != WorkerStatus::Stopped {
                continue_running = true;
            }
            if w.counts_as_idle() {
                idle_workers += 1;
            }
            if w.has_spare_dirs() {
                have_dirs.push(id);
            }
            if w.wants_work() {
                wants_work.push(id);
            }
        }
        if !self.work_list.is_empty() {
            continue_running = true;
        }
        (idle_workers, have_dirs, wants_work, continue_running)
    }

    /// spec.md §4.5 step 5: ceiling-division distribution. Clears the
    /// global list unconditionally afterward, matching the original's
    /// `self.work_list[:] = []`.
    fn distribute(&mut self, wants_work: &mut Vec<ClientId>) {
        if wants_work.is_empty() || self.work_list.is_empty() {
            return;
        }
        let items: Vec<String> = self.work_list.drain(..).collect();
        let len_dir_list = items.len();
        let len_want_work = wants_work.len();
        let increment = len_dir_list / len_want_work + usize::from(len_dir_list % len_want_work != 0);

        let mut index = 0;
        let mut got_work = Vec::new();
        for &id in wants_work.iter() {
            if index >= items.len() {
                continue;
            }
            let end = (index + increment).min(items.len());
            let share = items[index..end].to_vec();
            if share.is_empty() {
                continue;
            }
            self.send(id, ControlMessage::ClientDirList { work_item: share });
            if let Some(w) = self.workers.get_mut(&id) {
                w.want_data = None;
            }
            index += increment;
            got_work.push(id);
        }
        wants_work.retain(|id| !got_work.contains(id));
    }

    /// spec.md §4.5 step 6: rate-limited solicitation of workers known to
    /// hold spare directories, only while somebody still wants work.
    fn solicit(&mut self, have_dirs: &[ClientId], wants_work: &[ClientId]) {
        if wants_work.is_empty() || have_dirs.is_empty() {
            return;
        }
        let now = Instant::now();
        let interval = self.config.request_work_interval();
        let mut targets = Vec::new();
        for &id in have_dirs {
            let due = match self.workers.get(&id).and_then(|w| w.sent_data) {
                Some(last) => now.duration_since(last) > interval,
                None => true,
            };
            if due {
                targets.push(id);
            }
        }
        for id in targets {
            self.send(
                id,
                ControlMessage::ClientReqDirList {
                    pct: Some(self.config.request_work_percentage),
                },
            );
            if let Some(w) = self.workers.get_mut(&id) {
                w.sent_data = Some(now);
            }
        }
    }

    /// spec.md §4.5 termination check: broadcasts `quit` to every
    /// non-stopped worker. Used both for the natural idle-and-empty
    /// termination and for an explicit operator quit (spec.md §5:
    /// "coordinator broadcasts quit").
    fn broadcast_quit(&mut self) {
        let targets: Vec<ClientId> = self
            .workers
            .iter()
            .filter(|(_, w)| w.status != WorkerStatus::Stopped)
            .map(|(&id, _)| id)
            .collect();
        for id in targets {
            self.send(id, ControlMessage::ClientQuit);
        }
    }

    fn send(&self, id: ClientId, msg: ControlMessage) {
        if let Some(tx) = self.outboxes.get(&id) {
            let _ = tx.send(msg);
        }
    }

    fn dump_state(&self) {
        log_coordinator_info!(
            "coordinator state dump",
            workers = self.workers.len(),
            work_list_len = self.work_list.len(),
            debug_enabled = self.debug_enabled
        );
    }

    /// Sums the named counters across every worker's last-known stats
    /// snapshot. `custom` is intentionally left unmerged here — the
    /// original's `merge_process_stats` skips that key in its generic
    /// merge too; custom-field aggregation is a per-process concern
    /// handled inside `pscatter-engine`, not across distributed workers.
    fn aggregate_stats(&self) -> WireStats {
        let mut total = WireStats::default();
        for w in self.workers.values() {
            let s = &w.stats;
            total.dirs_processed += s.dirs_processed;
            total.dirs_queued += s.dirs_queued;
            total.dirs_skipped += s.dirs_skipped;
            total.files_processed += s.files_processed;
            total.files_queued += s.files_queued;
            total.files_skipped += s.files_skipped;
            total.file_size_total += s.file_size_total;
            total.file_size_physical_total += s.file_size_physical_total;
            total.dir_handler_time += s.dir_handler_time;
            total.file_handler_time += s.file_handler_time;
            total.dir_scan_time += s.dir_scan_time;
            total.q_wait_time += s.q_wait_time;
        }
        total
    }

    fn print_interim_stats(&mut self, runtime: Duration) {
        let stats = self.aggregate_stats();
        let delta = stats.files_processed.saturating_sub(self.last_files_processed);
        self.fps_window.add_sample(delta);
        self.last_files_processed = stats.files_processed;

        let interval = self.fps_window.sample_interval().as_secs_f64().max(1.0);
        let fps_per_bucket: Vec<String> = self
            .fps_window
            .get_all_windows()
            .into_iter()
            .map(|total| format!("{:.1}", total as f64 / interval))
            .collect();
        let overall_fps = stats.files_processed as f64 / runtime.as_secs_f64().max(1.0);

        log_coordinator_info!(
            "interim statistics",
            runtime_secs = runtime.as_secs(),
            fps_overall = format!("{overall_fps:.1}"),
            fps_recent = fps_per_bucket.join(" - "),
            files_processed = stats.files_processed,
            files_queued = stats.files_queued,
            files_skipped = stats.files_skipped,
            file_size_total = stats.file_size_total,
            dirs_processed = stats.dirs_processed,
            dirs_queued = stats.dirs_queued,
            dirs_skipped = stats.dirs_skipped
        );
    }

    fn print_final_stats(&self, wall_time: Duration) {
        let stats = self.aggregate_stats();
        let wall_secs = wall_time.as_secs_f64().max(1.0);
        let avg_fps = (stats.files_processed + stats.files_skipped) as f64 / wall_secs;

        log_coordinator_info!(
            "final statistics",
            wall_time_secs = format!("{wall_secs:.2}"),
            dir_handler_time = format!("{:.2}", stats.dir_handler_time),
            file_handler_time = format!("{:.2}", stats.file_handler_time),
            dirs_processed = stats.dirs_processed,
            dirs_queued = stats.dirs_queued,
            dirs_skipped = stats.dirs_skipped,
            files_processed = stats.files_processed,
            files_queued = stats.files_queued,
            files_skipped = stats.files_skipped,
            file_size_total = stats.file_size_total,
            avg_files_per_second = format!("{avg_fps:.1}")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::NoopLauncher;

    fn test_config() -> CoordinatorConfig {
        CoordinatorConfig {
            queue_timeout_secs: 0.05,
            stats_interval_secs: 3600.0,
            request_work_interval_secs: 5.0,
            request_work_percentage: 0.5,
        }
    }

    fn coordinator(initial_work: Vec<String>) -> Coordinator {
        Coordinator::new(test_config(), Box::new(NoopLauncher), Vec::new(), initial_work)
    }

    #[test]
    fn distribute_splits_evenly_by_ceiling_division() {
        let mut c = coordinator(vec!["a", "b", "c", "d", "e"].into_iter().map(String::from).collect());
        c.workers.insert(1, WorkerState::new());
        c.workers.insert(2, WorkerState::new());
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        c.outboxes.insert(1, tx1);
        c.outboxes.insert(2, tx2);

        let mut wants_work = vec![1, 2];
        c.distribute(&mut wants_work);

        assert!(wants_work.is_empty());
        assert!(c.work_list.is_empty());

        let msg1 = rx1.try_recv().unwrap();
        let msg2 = rx2.try_recv().unwrap();
        match (msg1, msg2) {
            (
                ControlMessage::ClientDirList { work_item: a },
                ControlMessage::ClientDirList { work_item: b },
            ) => {
                assert_eq!(a.len(), 3);
                assert_eq!(b.len(), 2);
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[test]
    fn termination_check_fires_when_all_idle_and_work_list_empty() {
        let mut c = coordinator(Vec::new());
        c.workers.insert(1, WorkerState { status: WorkerStatus::Idle, ..WorkerState::new() });
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        c.outboxes.insert(1, tx1);

        let (idle, _have, _want, continue_running) = c.compute_sets();
        assert_eq!(idle, 1);
        assert_eq!(idle, c.workers.len());
        assert!(c.work_list.is_empty());
        // `continue_running` only goes false once the worker reports
        // `stopped` after receiving the quit broadcast below — an idle
        // worker alone does not end the loop.
        assert!(continue_running);

        c.broadcast_quit();
        assert!(matches!(rx1.try_recv().unwrap(), ControlMessage::ClientQuit));
    }

    #[test]
    fn solicitation_respects_rate_limit() {
        let mut c = coordinator(Vec::new());
        let mut w = WorkerState::new();
        w.dir_count = 5;
        w.sent_data = Some(Instant::now());
        c.workers.insert(1, w);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        c.outboxes.insert(1, tx1);

        c.solicit(&[1], &[2]);
        assert!(rx1.try_recv().is_err(), "solicitation must be rate-limited just after sent_data");
    }

    #[test]
    fn disconnect_removes_worker_state() {
        let mut c = coordinator(Vec::new());
        c.workers.insert(1, WorkerState::new());
        c.outboxes.insert(1, mpsc::unbounded_channel().0);
        assert!(c.handle_event(CoordinatorEvent::ClientClosed(1)));
        assert!(c.workers.is_empty());
        assert!(c.outboxes.is_empty());
    }
}
