use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage quota exceeded writing {key}: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Unknown preference: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, PrefsError>;
