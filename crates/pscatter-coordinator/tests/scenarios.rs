//! End-to-end scenarios wiring a real `Coordinator` against real
//! `Worker`/`ScanEngine` instances over loopback TCP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pscatter_config::{CoordinatorConfig, EngineConfig, SinkConfig, WorkerConfig};
use pscatter_coordinator::{Coordinator, NoopLauncher};
use pscatter_engine::{BasicFileHandler, ScanEngine};
use pscatter_proto::{Command, Connection, ControlMessage, Listener};
use pscatter_sink::{NullSink, SinkForwarderPool};
use pscatter_worker::Worker;
use tokio::time::timeout;

/// Coordinator timers fast enough that the idle-and-empty termination
/// check and rebalancing solicitation don't dominate a test's wall clock.
fn fast_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        queue_timeout_secs: 0.05,
        stats_interval_secs: 60.0,
        request_work_interval_secs: 0.2,
        request_work_percentage: 0.5,
    }
}

fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval_secs: 0.02,
        stats_interval_secs: 60.0,
        dir_output_interval_secs: 60.0,
        dir_request_interval_secs: 0.1,
        dir_request_percentage: 0.5,
    }
}

async fn spawn_worker(addr: std::net::SocketAddr) -> tokio::task::JoinHandle<()> {
    let connection = Connection::connect(addr).await.unwrap();
    let engine = ScanEngine::new(Arc::new(BasicFileHandler), EngineConfig::default());
    let sink_pool = SinkForwarderPool::new(Arc::new(NullSink), SinkConfig::default());
    let worker = Worker::new(connection, engine, sink_pool, fast_worker_config());
    tokio::spawn(async move {
        worker.run().await.unwrap();
    })
}

/// S1 — single worker, tiny tree `/root/{a,b,c/d,c/e}`: 4 files, 2
/// directories (`root`, `root/c`), no skips, natural termination.
#[tokio::test]
async fn s1_single_worker_tiny_tree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a"), b"x").unwrap();
    std::fs::write(dir.path().join("b"), b"xx").unwrap();
    std::fs::create_dir(dir.path().join("c")).unwrap();
    std::fs::write(dir.path().join("c/d"), b"xxx").unwrap();
    std::fs::write(dir.path().join("c/e"), b"xxxx").unwrap();

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let initial_work = vec![dir.path().to_string_lossy().into_owned()];
    let coordinator_handle = tokio::spawn(
        Coordinator::new(fast_coordinator_config(), Box::new(NoopLauncher), Vec::new(), initial_work)
            .run(listener),
    );

    let worker_handle = spawn_worker(addr).await;

    timeout(Duration::from_secs(10), coordinator_handle)
        .await
        .expect("coordinator must terminate once the tree is drained")
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), worker_handle).await.unwrap().unwrap();
}

/// S4 — an operator `command{cmd:quit}` sent while a scan is in flight
/// drives the coordinator to broadcast `quit` and terminate promptly,
/// independent of whether the tree has finished draining.
#[tokio::test]
async fn s4_operator_quit_command_terminates_promptly() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..200 {
        std::fs::write(dir.path().join(format!("f{i}")), b"x").unwrap();
    }

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let initial_work = vec![dir.path().to_string_lossy().into_owned()];
    let coordinator_handle = tokio::spawn(
        Coordinator::new(fast_coordinator_config(), Box::new(NoopLauncher), Vec::new(), initial_work)
            .run(listener),
    );

    let worker_handle = spawn_worker(addr).await;

    let mut operator = Connection::connect(addr).await.unwrap();
    operator.send(ControlMessage::Command { cmd: Command::Quit }).unwrap();
    operator.close(Duration::from_secs(2)).await;

    timeout(Duration::from_secs(10), coordinator_handle)
        .await
        .expect("coordinator must terminate shortly after an operator quit")
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), worker_handle).await.unwrap().unwrap();
}

/// S6 — a child directory that can't be listed is skipped, not fatal; the
/// parent's other children still get processed and the scan still
/// terminates.
#[tokio::test]
async fn s6_permission_denied_subtree_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ok"), b"x").unwrap();
    let forbidden = dir.path().join("forbidden");
    std::fs::create_dir(&forbidden).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&forbidden, std::fs::Permissions::from_mode(0o000)).unwrap();
    }

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let initial_work = vec![dir.path().to_string_lossy().into_owned()];
    let coordinator_handle = tokio::spawn(
        Coordinator::new(fast_coordinator_config(), Box::new(NoopLauncher), Vec::new(), initial_work)
            .run(listener),
    );

    let worker_handle = spawn_worker(addr).await;

    timeout(Duration::from_secs(10), coordinator_handle)
        .await
        .expect("coordinator must terminate even with an unlistable subtree")
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), worker_handle).await.unwrap().unwrap();

    // Restore permissions so tempdir cleanup can remove it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&forbidden, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// S3 — a worker that disconnects mid-scan (dropped, not quit) is removed
/// from the coordinator's worker table and the remaining worker's share
/// still drains to completion.
#[tokio::test]
async fn s3_worker_disconnect_does_not_block_the_other_workers_scan() {
    let dir_a = tempfile::tempdir().unwrap();
    std::fs::write(dir_a.path().join("a"), b"x").unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    std::fs::write(dir_b.path().join("b"), b"x").unwrap();

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let initial_work = vec![
        dir_a.path().to_string_lossy().into_owned(),
        dir_b.path().to_string_lossy().into_owned(),
    ];
    let coordinator_handle = tokio::spawn(
        Coordinator::new(fast_coordinator_config(), Box::new(NoopLauncher), Vec::new(), initial_work)
            .run(listener),
    );

    // Worker 1 connects, gets a work item, then drops without a clean quit.
    {
        let connection = Connection::connect(addr).await.unwrap();
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(connection);
    }

    let worker_handle = spawn_worker(addr).await;

    timeout(Duration::from_secs(10), coordinator_handle)
        .await
        .expect("coordinator must terminate after the survivor's share drains")
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), worker_handle).await.unwrap().unwrap();
}
