//! Length-prefixed message framing over TCP, with asynchronous send and
//! receive, for the coordinator/worker control plane.

mod connection;
mod error;
mod header;
mod message;

pub use connection::{ClientId, Connection, Listener, MAX_FRAME_LENGTH};
pub use error::ProtoError;
pub use header::{FrameHeader, FrameType, PROTOCOL_VERSION};
pub use message::{Command, ConfigUpdate, ControlMessage, WireStats};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn round_trips_a_message() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let mut client = Connection::connect(addr).await.unwrap();

        let (mut server, client_id) = accept.await.unwrap();
        assert!(client_id >= 1);

        client
            .send(ControlMessage::ClientReqDirList { pct: Some(0.5) })
            .unwrap();

        match server.recv().await.unwrap() {
            ControlMessage::ClientReqDirList { pct } => assert_eq!(pct, Some(0.5)),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn recv_yields_closed_once_then_none() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let client = Connection::connect(addr).await.unwrap();
        let (mut server, _id) = accept.await.unwrap();

        drop(client);

        assert!(matches!(server.recv().await, Some(ControlMessage::Closed)));
        assert!(server.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_flushes_pending_sends() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let mut client = Connection::connect(addr).await.unwrap();
        let (mut server, _id) = accept.await.unwrap();

        client
            .send(ControlMessage::WorkerStatusDirCount { count: 42 })
            .unwrap();
        client.close(Duration::from_secs(1)).await;

        match server.recv().await.unwrap() {
            ControlMessage::WorkerStatusDirCount { count } => assert_eq!(count, 42),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
