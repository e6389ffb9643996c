use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transport error: {0}")]
    Transport(#[from] pscatter_proto::ProtoError),
    #[error("scanner engine error: {0}")]
    Engine(#[from] pscatter_engine::EngineError),
}
