use std::time::Duration;

use pscatter_proto::{Command, Connection, ControlMessage, ProtoError};

/// Bounds how long the one-shot connection is held open after the command
/// is enqueued, giving the background writer task a chance to flush it.
const SEND_SETTLE: Duration = Duration::from_millis(200);
const CLOSE_DEADLINE: Duration = Duration::from_secs(2);

/// One-shot operator command channel (spec.md §4.7 / C7): connect, send a
/// single `command{cmd}`, settle briefly, disconnect. Grounded on
/// `vrift-ipc::client::DaemonClient`'s connect/send shape, adapted from a
/// request/response round trip to this protocol's fire-and-forget command
/// semantics — there is no acknowledgement to wait for.
pub struct CommandClient {
    connection: Connection,
}

impl CommandClient {
    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> Result<Self, ProtoError> {
        let connection = Connection::connect(addr).await?;
        Ok(Self { connection })
    }

    pub async fn send_command(mut self, cmd: Command) -> Result<(), ProtoError> {
        self.connection.send(ControlMessage::Command { cmd })?;
        tokio::time::sleep(SEND_SETTLE).await;
        self.connection.close(CLOSE_DEADLINE).await;
        Ok(())
    }
}
