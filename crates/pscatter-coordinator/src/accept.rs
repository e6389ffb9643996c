use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pscatter_config::log_coordinator_warn;
use pscatter_proto::{ClientId, Connection, ControlMessage, Listener};

use crate::event::CoordinatorEvent;

/// Bounds the final frame flush when a client actor tears down its
/// connection, separate from the sink's own flush deadline.
const CONNECTION_CLOSE_DEADLINE: Duration = Duration::from_secs(5);

/// Accepts worker connections forever, spawning one [`client_actor`] per
/// connection. Grounded on `vrift-vdird::socket::run_listener`'s
/// accept-then-spawn loop, generalized from request/response to the
/// push-style protocol this control plane uses.
pub fn spawn_accept_loop(
    listener: Listener,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((conn, id)) => {
                    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<ControlMessage>();
                    if events
                        .send(CoordinatorEvent::ClientConnected(id, outbox_tx))
                        .is_err()
                    {
                        return;
                    }
                    tokio::spawn(client_actor(id, conn, outbox_rx, events.clone()));
                }
                Err(e) => {
                    log_coordinator_warn!("accept failed", error = format!("{e}"));
                }
            }
        }
    })
}

/// Owns one accepted [`Connection`] for its whole lifetime: forwards every
/// inbound frame to the coordinator's event queue, and relays every
/// message the coordinator pushes into `outbox` out over the wire. This
/// keeps `Connection::recv`'s `&mut self` requirement and the
/// coordinator's need to address many connections concurrently from
/// fighting over ownership of the same struct.
async fn client_actor(
    id: ClientId,
    mut conn: Connection,
    mut outbox: mpsc::UnboundedReceiver<ControlMessage>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
) {
    loop {
        tokio::select! {
            msg = conn.recv() => {
                match msg {
                    Some(ControlMessage::Closed) | None => {
                        let _ = events.send(CoordinatorEvent::ClientClosed(id));
                        return;
                    }
                    Some(m) => {
                        if events.send(CoordinatorEvent::ClientMessage(id, m)).is_err() {
                            return;
                        }
                    }
                }
            }
            out = outbox.recv() => {
                match out {
                    Some(msg) => {
                        let _ = conn.send(msg);
                    }
                    None => {
                        conn.close(CONNECTION_CLOSE_DEADLINE).await;
                        return;
                    }
                }
            }
        }
    }
}
