use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cache store error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid frame file: {0}")]
    InvalidFrame(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BroadcastError>;
