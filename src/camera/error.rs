use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The backend could not open the device. Recoverable: the session
    /// falls through to the next source.
    #[error("failed to open capture device: {0}")]
    Open(String),

    /// A single frame read failed. Recoverable: backoff and retry.
    #[error("frame read failed: {0}")]
    Read(String),

    /// A device handle could not be released. Fatal for the session: a
    /// stale handle would block every later open.
    #[error("failed to release capture device: {0}")]
    Release(String),

    #[error("failed to spawn capture thread: {0}")]
    Spawn(String),

    #[error("capture session is faulted after a release failure")]
    SessionFaulted,

    #[error("capture thread exited unexpectedly")]
    Disconnected,

    #[error("preview resize failed: {0}")]
    Resize(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
