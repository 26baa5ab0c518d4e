use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types.
///
/// Per-entry filesystem failures inside aggregate computations are absorbed
/// at the point of failure (they contribute zero) and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A root path handed to the engine does not exist or is not a directory.
    #[error("Invalid root: {0}")]
    InvalidRoot(String),

    /// The worker channel closed while events were still expected.
    #[error("Event channel closed")]
    ChannelClosed,
}
