use thiserror::Error;

/// Top-level error type for Yamato.
#[derive(Debug, Error)]
pub enum YamatoError {
    /// Error from the AI provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the messaging transport.
    #[error("channel error: {0}")]
    Channel(String),

    /// The transport socket is gone. Health probes report this to force a reconnect.
    #[error("socket not open")]
    SocketClosed,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted store error.
    #[error("store error: {0}")]
    Store(String),

    /// Command plugin error.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
