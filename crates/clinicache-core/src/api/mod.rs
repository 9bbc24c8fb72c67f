//! Drug information API client.
//!
//! This module provides the `DrugApiClient` for searching the openFDA drug
//! label endpoint. When the client is offline, callers substitute the fixed
//! sample payload from `offline_sample()`.

pub mod client;
pub mod error;

pub use client::{offline_sample, DrugApiClient, DEFAULT_DRUG_API_BASE, DEFAULT_SEARCH_LIMIT};
pub use error::ApiError;
