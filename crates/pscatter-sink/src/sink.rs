use crate::error::SinkError;
use crate::record::FileRecord;

/// The pluggable external collaborator a forwarder delivers batches to.
/// `send` is a blocking call by contract — forwarder tasks wrap it in
/// `spawn_blocking` rather than requiring an async implementation.
pub trait Sink: Send + Sync {
    fn send(&self, batch: Vec<FileRecord>) -> Result<(), SinkError>;
}

/// Discards every batch. Used where only the forwarder pool's queueing and
/// backoff behavior is under test.
pub struct NullSink;

impl Sink for NullSink {
    fn send(&self, _batch: Vec<FileRecord>) -> Result<(), SinkError> {
        Ok(())
    }
}

pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails the first `fail_count` sends with a transient error, then
    /// succeeds, recording every batch that ultimately landed.
    pub struct FlakySink {
        fail_count: usize,
        attempts: AtomicUsize,
        pub delivered: Mutex<Vec<Vec<FileRecord>>>,
    }

    impl FlakySink {
        pub fn new(fail_count: usize) -> Self {
            Self {
                fail_count,
                attempts: AtomicUsize::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl Sink for FlakySink {
        fn send(&self, batch: Vec<FileRecord>) -> Result<(), SinkError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_count {
                return Err(SinkError::Transient(format!("attempt {attempt} failed")));
            }
            self.delivered.lock().unwrap().push(batch);
            Ok(())
        }
    }

    /// Always fails — exercises the terminal-error drop path.
    pub struct AlwaysFailSink;

    impl Sink for AlwaysFailSink {
        fn send(&self, _batch: Vec<FileRecord>) -> Result<(), SinkError> {
            Err(SinkError::Terminal("sink permanently unavailable".into()))
        }
    }
}
