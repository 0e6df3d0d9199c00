/// Shared error type used across all Harbor crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A create targeted a session ID that is already live.
    #[error("session already active: {0}")]
    Conflict(String),

    /// A lookup or rename referenced a session ID with no live entry.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The external engine connector failed during connect or disconnect.
    #[error("connection: {0}")]
    Connection(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
