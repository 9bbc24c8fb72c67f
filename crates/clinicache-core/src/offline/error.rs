use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Precache of {url} failed with status {status}")]
    PrecacheFailed { url: String, status: u16 },

    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),

    #[error("Invalid cache bucket name: {0:?}")]
    InvalidBucketName(String),

    #[error("Cache storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),

    #[error("Cache storage lock poisoned")]
    Poisoned,

    #[error("Background cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("No service worker controls this client")]
    NoController,
}

pub type Result<T> = std::result::Result<T, OfflineError>;
