use thiserror::Error;

/// Errors surfaced by the storage and recovery layers
#[derive(Error, Debug)]
pub enum Error {
    /// An underlying I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk data failed validation (bad length, checksum, framing)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// A file is structurally valid but not what we expected
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A storage-engine level failure (open modes, read-only writes)
    #[error("Storage engine error: {0}")]
    StorageEngine(String),

    /// Startup configuration is missing, malformed, or contradictory
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type used throughout PhoenixDB
pub type Result<T> = std::result::Result<T, Error>;
