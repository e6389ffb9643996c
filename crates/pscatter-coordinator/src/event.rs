use tokio::sync::mpsc;

use pscatter_proto::{ClientId, ControlMessage};

use crate::error::LaunchError;

/// Everything that can make the coordinator's single event loop do work:
/// TCP control messages, connection lifecycle, the remote-launcher
/// callback, and the local signal handlers (`SIGINT`/`SIGUSR1`/`SIGUSR2`)
/// feeding the same queue per spec.md §4.5's "supplemented" note.
pub enum CoordinatorEvent {
    ClientConnected(ClientId, mpsc::UnboundedSender<ControlMessage>),
    ClientMessage(ClientId, ControlMessage),
    ClientClosed(ClientId),
    RemoteCallback(Result<(), LaunchError>),
    /// `SIGINT` / operator `command{cmd: quit}` issued directly at the
    /// coordinator process rather than over the wire.
    Quit,
    ToggleDebug,
    DumpState,
}
