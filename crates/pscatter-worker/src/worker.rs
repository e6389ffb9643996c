use std::sync::Arc;
use std::time::{Duration, Instant};

use pscatter_config::WorkerConfig;
use pscatter_config::{log_worker_debug, log_worker_info, log_worker_warn};
use pscatter_engine::{FileHandler, ScanEngine, StatsSnapshot};
use pscatter_proto::{Command as ProtoCommand, Connection, ControlMessage, WireStats};
use pscatter_sink::{Sink, SinkForwarderPool};

use crate::error::WorkerError;
use crate::state::{RunStateCell, WorkerRunState};

/// Separate from the sink's own flush deadline — this bounds only the
/// final frame flush on the transport itself.
const CONNECTION_CLOSE_DEADLINE: Duration = Duration::from_secs(5);

fn to_wire_stats(s: StatsSnapshot) -> WireStats {
    WireStats {
        dirs_processed: s.dirs_processed,
        dirs_queued: s.dirs_queued,
        dirs_skipped: s.dirs_skipped,
        files_processed: s.files_processed,
        files_queued: s.files_queued,
        files_skipped: s.files_skipped,
        file_size_total: s.file_size_total,
        file_size_physical_total: s.file_size_physical_total,
        dir_handler_time: s.dir_handler_time,
        file_handler_time: s.file_handler_time,
        dir_scan_time: s.dir_scan_time,
        q_wait_time: s.q_wait_time,
        custom: s.custom,
    }
}

/// Owns one scanner engine, one sink forwarder pool, and the transport to
/// the coordinator. Runs the worker side of the control-plane protocol as a
/// single `tokio::select!` event loop.
pub struct Worker<H: FileHandler + 'static, S: Sink + 'static> {
    connection: Connection,
    engine: Arc<ScanEngine<H>>,
    sink_pool: Arc<SinkForwarderPool<S>>,
    config: WorkerConfig,
    state: RunStateCell,
    last_dir_request: Instant,
    debug_enabled: bool,
}

impl<H: FileHandler + 'static, S: Sink + 'static> Worker<H, S> {
    pub fn new(
        connection: Connection,
        engine: Arc<ScanEngine<H>>,
        sink_pool: Arc<SinkForwarderPool<S>>,
        config: WorkerConfig,
    ) -> Self {
        let last_dir_request = Instant::now()
            .checked_sub(config.dir_request_interval())
            .unwrap_or_else(Instant::now);
        Self {
            connection,
            engine,
            sink_pool,
            config,
            state: RunStateCell::default(),
            last_dir_request,
            debug_enabled: false,
        }
    }

    pub fn state(&self) -> WorkerRunState {
        self.state.get()
    }

    /// Runs until `quit` or transport closure, then performs an orderly
    /// sink/engine shutdown.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        self.engine.start()?;
        self.sink_pool.start();

        let mut stats_timer = tokio::time::interval(self.config.stats_interval());
        let mut dir_output_timer = tokio::time::interval(self.config.dir_output_interval());
        // `interval` fires immediately on its first tick; consume that so
        // the first real report lands a full interval after startup.
        stats_timer.tick().await;
        dir_output_timer.tick().await;

        loop {
            tokio::select! {
                msg = self.connection.recv() => {
                    match msg {
                        Some(msg) => {
                            if !self.handle_message(msg).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = stats_timer.tick() => {
                    self.send_stats();
                }
                _ = dir_output_timer.tick() => {
                    let count = self.engine.get_dir_queue_size() as u64;
                    let _ = self.connection.send(ControlMessage::WorkerStatusDirCount { count });
                }
                _ = tokio::time::sleep(self.config.poll_interval()) => {
                    self.maybe_request_work();
                    self.refresh_idle_state();
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn handle_message(&mut self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::ClientDirList { work_item } => {
                let has_work = !work_item.is_empty();
                self.engine.add_scan_path(work_item);
                if has_work {
                    self.transition_running();
                }
                true
            }
            ControlMessage::ClientReqDirList { pct } => {
                let pct = pct.or(Some(self.config.dir_request_percentage));
                let items = self.engine.get_dir_queue_items(1, pct);
                if !items.is_empty() {
                    let _ = self
                        .connection
                        .send(ControlMessage::WorkerDirList { work_item: items });
                }
                true
            }
            ControlMessage::ClientQuit => false,
            // Nothing in this system constructs `ConfigUpdate` (no coordinator
            // call site sends one); accept it on the wire for protocol
            // compatibility but don't pretend to apply it.
            ControlMessage::ConfigUpdate { .. } => {
                log_worker_debug!("config_update received but not applied: no runtime reconfiguration path is wired up");
                true
            }
            ControlMessage::Debug { dump_state } => {
                if dump_state {
                    self.dump_state();
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
                    log_worker_info!("debug toggled", enabled = self.debug_enabled);
                    true
                }
            },
            ControlMessage::Closed => false,
            other => {
                log_worker_debug!(
                    "ignoring unexpected message direction",
                    message = format!("{other:?}")
                );
                true
            }
        }
    }

    fn transition_running(&mut self) {
        if self.state.get() != WorkerRunState::Running {
            self.state.set(WorkerRunState::Running);
            let _ = self.connection.send(ControlMessage::WorkerStateRunning);
        }
    }

    fn refresh_idle_state(&mut self) {
        let busy = self.engine.is_processing()
            || self.engine.get_dir_queue_size() > 0
            || self.engine.get_file_queue_size() > 0;
        if !busy && self.state.get() == WorkerRunState::Running {
            self.state.set(WorkerRunState::Idle);
            let _ = self.connection.send(ControlMessage::WorkerStateIdle);
            self.send_stats();
        }
    }

    fn maybe_request_work(&mut self) {
        if self.engine.get_dir_queue_size() != 0 {
            return;
        }
        if self.last_dir_request.elapsed() < self.config.dir_request_interval() {
            return;
        }
        if self.connection.send(ControlMessage::WorkerReqDirList).is_ok() {
            self.last_dir_request = Instant::now();
        }
    }

    fn send_stats(&self) {
        let stats = to_wire_stats(self.engine.get_stats());
        let _ = self
            .connection
            .send(ControlMessage::WorkerStatusStats { stats });
    }

    fn dump_state(&self) {
        log_worker_info!(
            "worker state dump",
            state = format!("{:?}", self.state.get()),
            dir_queue_size = self.engine.get_dir_queue_size(),
            file_queue_size = self.engine.get_file_queue_size(),
            sink_queue_depth = self.sink_pool.queue_depth()
        );
    }

    async fn shutdown(&mut self) {
        self.state.set(WorkerRunState::Stopped);
        let _ = self.connection.send(ControlMessage::WorkerStateStopped);

        self.engine.terminate();
        self.sink_pool.shutdown(true).await;

        let engine = Arc::clone(&self.engine);
        if tokio::task::spawn_blocking(move || engine.join())
            .await
            .is_err()
        {
            log_worker_warn!("engine thread pool join task panicked");
        }

        self.connection.close(CONNECTION_CLOSE_DEADLINE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pscatter_config::EngineConfig;
    use pscatter_engine::NullFileHandler;
    use pscatter_proto::Listener;
    use pscatter_sink::NullSink;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    async fn coordinator_pair() -> (Connection, Connection) {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_fut = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let worker_side = Connection::connect(addr).await.unwrap();
        let coordinator_side = accept_fut.await.unwrap();
        (coordinator_side, worker_side)
    }

    fn fast_worker_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval_secs: 0.02,
            stats_interval_secs: 60.0,
            dir_output_interval_secs: 60.0,
            dir_request_interval_secs: 60.0,
            dir_request_percentage: 0.5,
        }
    }

    #[tokio::test]
    async fn dir_list_transitions_to_running() {
        let (mut coordinator, worker_conn) = coordinator_pair().await;
        let dir = tempfile::tempdir().unwrap();

        let engine = ScanEngine::new(Arc::new(NullFileHandler), EngineConfig::default());
        let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), pscatter_config::SinkConfig::default());
        let worker = Worker::new(worker_conn, engine, sink_pool, fast_worker_config());
        let run_handle = tokio::spawn(worker.run());

        coordinator
            .send(ControlMessage::ClientDirList {
                work_item: vec![dir.path().to_string_lossy().into_owned()],
            })
            .unwrap();

        let msg = timeout(StdDuration::from_secs(2), coordinator.recv())
            .await
            .expect("expected a WorkerStateRunning message")
            .unwrap();
        assert!(matches!(msg, ControlMessage::WorkerStateRunning));

        coordinator.send(ControlMessage::ClientQuit).unwrap();
        timeout(StdDuration::from_secs(5), run_handle)
            .await
            .expect("worker run() must return after quit")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn quit_drives_orderly_shutdown() {
        let (mut coordinator, worker_conn) = coordinator_pair().await;

        let engine = ScanEngine::new(Arc::new(NullFileHandler), EngineConfig::default());
        let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), pscatter_config::SinkConfig::default());
        let worker = Worker::new(worker_conn, engine, sink_pool, fast_worker_config());
        let run_handle = tokio::spawn(worker.run());

        coordinator.send(ControlMessage::ClientQuit).unwrap();

        let mut saw_stopped = false;
        for _ in 0..8 {
            match timeout(StdDuration::from_secs(2), coordinator.recv()).await {
                Ok(Some(ControlMessage::WorkerStateStopped)) => {
                    saw_stopped = true;
                    break;
                }
                Ok(Some(ControlMessage::Closed)) | Ok(None) => break,
                Ok(Some(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(saw_stopped, "expected a WorkerStateStopped message before close");

        timeout(StdDuration::from_secs(5), run_handle)
            .await
            .expect("worker run() must return after quit")
            .unwrap()
            .unwrap();
    }
}
