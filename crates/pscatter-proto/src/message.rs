use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operator command carried by [`ControlMessage::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Quit,
    DumpState,
    ToggleDebug,
}

/// Dynamic reconfiguration payload carried by [`ControlMessage::ConfigUpdate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Forwarded verbatim to the file handler for runtime reconfiguration
    /// (sink credentials, index name, thread count).
    pub client_config: Option<HashMap<String, serde_json::Value>>,
    pub log_level: Option<String>,
    pub logger: Option<HashMap<String, serde_json::Value>>,
}

/// A statistics snapshot as carried on the wire. Field names match
/// `pscatter_engine::StatsSnapshot`; this crate does not depend on the
/// engine crate, so the shape is duplicated here as the wire contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireStats {
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

/// Every message exchanged between coordinator and worker, plus the
/// transport-synthetic `Closed` variant delivered by [`crate::Connection::recv`]
/// when the peer goes away. One-to-one with the message table in this
/// system's control-plane specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlMessage {
    /// C→W: assign directories to scan.
    ClientDirList { work_item: Vec<String> },
    /// C→W: please return roughly `pct` of your queued directories.
    ClientReqDirList { pct: Option<f64> },
    /// C→W: drain sinks and exit.
    ClientQuit,
    /// C→W: dynamic reconfiguration.
    ConfigUpdate { config: ConfigUpdate },
    /// C→W: dump worker state to log.
    Debug { dump_state: bool },
    /// W→C: returning work after a solicitation, or the initial registration
    /// handshake's empty work offer.
    WorkerDirList { work_item: Vec<String> },
    /// W→C: request work.
    WorkerReqDirList,
    /// W→C: state transitions.
    WorkerStateIdle,
    WorkerStateRunning,
    WorkerStateStopped,
    /// W→C: local dir-queue depth.
    WorkerStatusDirCount { count: u64 },
    /// W→C: periodic statistics snapshot.
    WorkerStatusStats { stats: WireStats },
    /// Either direction: operator command.
    Command { cmd: Command },
    /// Transport-synthetic: delivered by `recv` when the peer disconnects.
    Closed,
}
