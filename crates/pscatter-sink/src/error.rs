use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transient sink failure: {0}")]
    Transient(String),
    #[error("terminal sink failure: {0}")]
    Terminal(String),
}
