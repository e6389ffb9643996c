//! Sink forwarder pool: the worker-side half of the data path, draining
//! file records produced by the engine into an external collaborator.

mod error;
mod forwarder;
mod queue;
mod record;
mod sink;

pub use error::SinkError;
pub use forwarder::SinkForwarderPool;
pub use queue::{CommandMsg, DataCommand};
pub use record::FileRecord;
pub use sink::{testing, NullSink, Sink};

#[cfg(test)]
mod tests {
    use super::*;
    use sink::testing::{AlwaysFailSink, FlakySink};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config() -> pscatter_config::SinkConfig {
        pscatter_config::SinkConfig {
            forwarder_threads: 2,
            max_send_q_size: 4,
            send_q_sleep_secs: 0.01,
            max_q_wait_loops: 3,
            flush_deadline_secs: 2.0,
            backoff_initial_secs: 0.01,
            backoff_max_secs: 0.05,
            backoff_max_retries: 5,
        }
    }

    fn record(n: i64) -> FileRecord {
        FileRecord::new(serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn delivers_through_null_sink() {
        let pool = SinkForwarderPool::new(Arc::new(NullSink), fast_config());
        pool.start();
        pool.push_send(vec![record(1)]).await;
        pool.shutdown(true).await;
    }

    #[tokio::test]
    async fn retries_transient_failures_then_delivers() {
        let sink = Arc::new(FlakySink::new(2));
        let pool = SinkForwarderPool::new(Arc::clone(&sink), fast_config());
        pool.start();
        pool.push_send(vec![record(1), record(2)]).await;
        pool.shutdown(true).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].len(), 2);
    }

    #[tokio::test]
    async fn terminal_failure_drops_batch_without_blocking_shutdown() {
        let pool = SinkForwarderPool::new(Arc::new(AlwaysFailSink), fast_config());
        pool.start();
        pool.push_send(vec![record(1)]).await;
        tokio::time::timeout(Duration::from_secs(1), pool.shutdown(true))
            .await
            .expect("shutdown must not hang when the sink always fails terminally");
    }

    #[tokio::test]
    async fn backpressure_reports_wait_iterations_once_queue_is_full() {
        let config = fast_config();
        let pool = SinkForwarderPool::new(Arc::new(NullSink), config);
        // Don't start forwarders — the queue never drains, so once it is
        // over max_send_q_size, further pushes must observe the full
        // wait-loop budget before proceeding anyway.
        for i in 0..5 {
            pool.push_send(vec![record(i)]).await;
        }
        let waits = pool.push_send(vec![record(99)]).await;
        assert_eq!(waits, 3);
    }
}
