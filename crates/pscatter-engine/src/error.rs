use thiserror::Error;

/// Engine-level error. Queue operations are infallible by design (§5); this
/// exists for the lifecycle operations that can genuinely fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine already started")]
    AlreadyStarted,
}
