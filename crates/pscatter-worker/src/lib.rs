//! Worker node: owns a scanner engine, a sink forwarder pool, and the
//! transport connection to the coordinator, and runs the worker side of
//! the control-plane protocol.

mod error;
mod state;
mod worker;

pub use error::WorkerError;
pub use state::WorkerRunState;
pub use worker::Worker;
