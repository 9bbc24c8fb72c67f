use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: u64 },

    #[error("Cannot delete doctor {id}: {count} appointment(s) assigned")]
    DoctorHasAppointments { id: u64, count: usize },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt collection file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned by a panicked writer")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
