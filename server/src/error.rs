//! Error types surfaced by the server.

use thiserror::Error;

/// No collision-free placement was found within the retry ceiling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("no free space for a snake after {0} attempts")]
    Snake(usize),
    #[error("no free space for a power-up after {0} attempts")]
    PowerUp(usize),
}

/// Invalid or unreadable game settings. Fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Why a client that finished the name handshake was turned away.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("server full")]
    ServerFull,
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("acceptor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
