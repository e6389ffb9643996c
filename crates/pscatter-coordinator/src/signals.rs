use tokio::sync::mpsc;

use crate::event::CoordinatorEvent;

/// Wires `SIGINT` → quit, `SIGUSR1` → toggle debug, `SIGUSR2` → dump state
/// into the same event queue the TCP control plane feeds, mirroring
/// `handler_signal_interrupt`/`handler_signal_usr1`/`handler_signal_usr2`
/// in the original. Grounded on `vrift-vdird::run_daemon`'s
/// `tokio::select!`-over-`ctrl_c()` pattern, generalized to one background
/// task per signal since the coordinator's own event loop already selects
/// over its `mpsc` queue rather than a raw `select!` across sources.
#[cfg(unix)]
pub fn spawn_signal_listeners(events: mpsc::UnboundedSender<CoordinatorEvent>) {
    spawn_one(tokio::signal::unix::SignalKind::interrupt(), events.clone(), || {
        CoordinatorEvent::Quit
    });
    spawn_one(
        tokio::signal::unix::SignalKind::user_defined1(),
        events.clone(),
        || CoordinatorEvent::ToggleDebug,
    );
    spawn_one(
        tokio::signal::unix::SignalKind::user_defined2(),
        events,
        || CoordinatorEvent::DumpState,
    );
}

#[cfg(unix)]
fn spawn_one(
    kind: tokio::signal::unix::SignalKind,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    make_event: impl Fn() -> CoordinatorEvent + Send + 'static,
) {
    use pscatter_config::log_coordinator_warn;
    use tokio::signal::unix::signal;

    tokio::spawn(async move {
        let mut stream = match signal(kind) {
            Ok(s) => s,
            Err(e) => {
                log_coordinator_warn!("failed to install signal handler", error = format!("{e}"));
                return;
            }
        };
        loop {
            if stream.recv().await.is_none() {
                return;
            }
            if events.send(make_event()).is_err() {
                return;
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_signal_listeners(_events: mpsc::UnboundedSender<CoordinatorEvent>) {}
