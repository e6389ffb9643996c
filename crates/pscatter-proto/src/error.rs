use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad frame magic")]
    BadMagic,

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("frame exceeds maximum length: {0} bytes")]
    FrameTooLarge(u32),

    #[error("encode failed: {0}")]
    Encode(#[from] Box<bincode::ErrorKind>),

    #[error("connection closed")]
    Closed,
}
