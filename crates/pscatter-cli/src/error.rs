use std::path::PathBuf;

/// Top-level CLI failure, carrying the exit code spec.md §6.3 assigns it.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid arguments: {0}")]
    BadArgs(String),
    #[error("credential file {path:?} unreadable: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Worker(#[from] pscatter_worker::WorkerError),
    #[error(transparent)]
    Coordinator(#[from] pscatter_coordinator::CoordinatorError),
    #[error(transparent)]
    Transport(#[from] pscatter_proto::ProtoError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl CliError {
    /// spec.md §6.3: `0` normal, `1` bad CLI, `2` platform mismatch
    /// (unreachable here — this rewrite has no OneFS-only code path, kept
    /// for interface fidelity with the original), `3` credential file
    /// unreadable.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::BadArgs(_) => 1,
            CliError::CredentialFile { .. } => 3,
            CliError::Worker(_)
            | CliError::Coordinator(_)
            | CliError::Transport(_)
            | CliError::Internal(_) => 1,
        }
    }
}
