#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("transport error: {0}")]
    Transport(#[from] pscatter_proto::ProtoError),
}

/// Failure launching a remote worker process, carried by [`crate::RemoteLauncher`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to launch {node}: {reason}")]
pub struct LaunchError {
    pub node: String,
    pub reason: String,
}
