use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pscatter_config::SinkConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::queue::{CommandMsg, DataCommand};
use crate::record::FileRecord;
use crate::sink::Sink;

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Fixed pool of forwarder tasks draining a shared data queue into a
/// [`Sink`], with at-least-once delivery, capped exponential backoff, and a
/// bounded flush-on-shutdown window.
pub struct SinkForwarderPool<S: Sink + 'static> {
    sink: Arc<S>,
    config: SinkConfig,
    data_queue: Arc<Mutex<VecDeque<DataCommand>>>,
    command_tx: broadcast::Sender<CommandMsg>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: Sink + 'static> SinkForwarderPool<S> {
    pub fn new(sink: Arc<S>, config: SinkConfig) -> Arc<Self> {
        let (command_tx, _) = broadcast::channel(config.forwarder_threads.max(1) + 4);
        Arc::new(Self {
            sink,
            config,
            data_queue: Arc::new(Mutex::new(VecDeque::new())),
            command_tx,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the forwarder tasks. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().unwrap();
        if !handles.is_empty() {
            return;
        }
        for id in 0..self.config.forwarder_threads.max(1) {
            let pool = Arc::clone(self);
            handles.push(tokio::spawn(async move { pool.run_forwarder(id).await }));
        }
    }

    /// Enqueues a `SEND` batch, applying the backpressure sleep-and-recheck
    /// loop when the queue is over `max_send_q_size`. Returns the number of
    /// backpressure iterations observed, for callers that want to feed this
    /// into a `es_queue_wait_count`-style counter.
    pub async fn push_send(&self, records: Vec<FileRecord>) -> u32 {
        self.push(DataCommand::Send(records)).await
    }

    pub async fn push_send_dir(&self, records: Vec<FileRecord>) -> u32 {
        self.push(DataCommand::SendDir(records)).await
    }

    async fn push(&self, cmd: DataCommand) -> u32 {
        let mut waits = 0u32;
        while waits < self.config.max_q_wait_loops {
            let len = self.data_queue.lock().unwrap().len();
            if len <= self.config.max_send_q_size {
                break;
            }
            waits += 1;
            tokio::time::sleep(self.config.send_q_sleep()).await;
        }
        self.data_queue.lock().unwrap().push_back(cmd);
        waits
    }

    /// Broadcasts `FLUSH`: every forwarder drains its current queue view
    /// once without exiting.
    pub fn flush(&self) {
        let _ = self.command_tx.send(CommandMsg::Flush);
    }

    /// Broadcasts `EXIT{flush}` and waits up to `flush_deadline` for every
    /// forwarder to exit. Forwarders still running past the deadline are
    /// abandoned with a warning — their tasks keep running detached.
    pub async fn shutdown(&self, flush: bool) {
        let _ = self.command_tx.send(CommandMsg::Exit { flush });
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        let deadline = self.config.flush_deadline();
        let joined = tokio::time::timeout(deadline, join_all(handles)).await;
        if joined.is_err() {
            warn!(
                deadline_secs = self.config.flush_deadline_secs,
                "sink forwarders did not exit within the flush deadline, abandoning \
                 (possible data loss)"
            );
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.data_queue.lock().unwrap().len()
    }

    async fn run_forwarder(self: Arc<Self>, id: usize) {
        let mut command_rx = self.command_tx.subscribe();
        loop {
            match command_rx.try_recv() {
                Ok(CommandMsg::Exit { flush }) => {
                    if flush {
                        self.drain().await;
                    }
                    debug!(forwarder = id, flush, "forwarder exiting");
                    return;
                }
                Ok(CommandMsg::Flush) => {
                    self.drain().await;
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => return,
                Err(_) => {}
            }

            let next = self.data_queue.lock().unwrap().pop_front();
            match next {
                Some(cmd) => self.deliver(cmd).await,
                None => tokio::time::sleep(IDLE_POLL).await,
            }
        }
    }

    async fn drain(&self) {
        loop {
            let next = self.data_queue.lock().unwrap().pop_front();
            match next {
                Some(cmd) => self.deliver(cmd).await,
                None => return,
            }
        }
    }

    async fn deliver(&self, cmd: DataCommand) {
        let records = cmd.into_records();
        let mut backoff = self.config.backoff_initial();
        let mut attempt = 0u32;

        loop {
            let sink = Arc::clone(&self.sink);
            let batch = records.clone();
            let result =
                tokio::task::spawn_blocking(move || sink.send(batch)).await;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("sink forwarder task panicked, batch dropped");
                    return;
                }
            };

            match outcome {
                Ok(()) => return,
                Err(crate::error::SinkError::Terminal(msg)) => {
                    warn!(error = %msg, "sink rejected batch terminally, dropping");
                    return;
                }
                Err(crate::error::SinkError::Transient(msg)) => {
                    attempt += 1;
                    if attempt > self.config.backoff_max_retries {
                        warn!(
                            error = %msg,
                            attempts = attempt,
                            "sink send exhausted retries, dropping batch"
                        );
                        return;
                    }
                    debug!(error = %msg, attempt, backoff = ?backoff, "sink send failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.backoff_max());
                }
            }
        }
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
