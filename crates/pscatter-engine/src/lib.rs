//! In-process scanner engine: a fixed pool of threads draining a directory
//! queue and a file queue, with pluggable per-file handling.

mod engine;
mod error;
mod handler;
mod queue;
mod stats;

pub use engine::{ScanEngine, ThreadState};
pub use error::EngineError;
pub use handler::{BasicFileHandler, CountingFileHandler, FileHandler, HandlerOutcome, NullFileHandler};
pub use queue::{DirQueue, FileBatch, FileQueue};
pub use stats::{StatsSnapshot, ThreadStats, CUSTOM_STATS_FIELDS};
