//! API client for the openFDA drug label endpoint.
//!
//! Read-only and unauthenticated. No retries: a failed search is reported
//! once and the caller decides whether to fall back to the offline sample.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, error};

use super::ApiError;
use crate::models::DrugSearchResponse;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the openFDA API
pub const DEFAULT_DRUG_API_BASE: &str = "https://api.fda.gov";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of results requested per search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// openFDA rejects limits above this.
const MAX_SEARCH_LIMIT: u32 = 1000;

/// Drug API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct DrugApiClient {
    client: Client,
    base_url: String,
}

impl DrugApiClient {
    /// Create a client for the public openFDA API
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_DRUG_API_BASE)
    }

    /// Create a client against another deployment (or a local test server)
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search drug labels. A 404 from openFDA means "no matches" and yields an empty result.
    pub async fn search_drugs(&self, query: &str, limit: u32) -> Result<DrugSearchResponse, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::EmptyQuery);
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

        let url = format!("{}/drug/label.json", self.base_url);
        debug!(query, limit, "Searching drug labels");

        let response = self
            .client
            .get(&url)
            .query(&[("search", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Drug search request failed"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(query, "No drug labels matched");
            return Ok(DrugSearchResponse::empty());
        }

        let body = response.text().await?;
        if !status.is_success() {
            let err = ApiError::from_status(status, &body);
            error!(error = %err, "Drug search failed");
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse drug labels: {}", e)))
    }

    /// Search when online; otherwise return the offline sample without touching the network.
    pub async fn search_or_offline(
        &self,
        query: &str,
        limit: u32,
        online: bool,
    ) -> Result<DrugSearchResponse, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::EmptyQuery);
        }
        if !online {
            debug!(query, "Offline, returning sample drug data");
            return Ok(offline_sample());
        }
        self.search_drugs(query, limit).await
    }
}

/// Fixed sample payload shown while offline.
pub fn offline_sample() -> DrugSearchResponse {
    let sample = json!({
        "meta": { "disclaimer": "Sample data for offline mode" },
        "results": [
            {
                "openfda": {
                    "brand_name": ["Paracetamol"],
                    "generic_name": ["Acetaminophen"]
                },
                "indications_and_usage": ["Para el alivio temporal de dolores y fiebre"],
                "dosage_and_administration": ["Adultos: 500mg cada 4-6 horas según sea necesario"],
                "warnings": ["No usar más de 4000mg en 24 horas"]
            },
            {
                "openfda": {
                    "brand_name": ["Ibuprofeno"],
                    "generic_name": ["Ibuprofen"]
                },
                "indications_and_usage": ["Antiinflamatorio para dolor y fiebre"],
                "dosage_and_administration": ["Adultos: 200-400mg cada 4-6 horas según sea necesario"],
                "warnings": ["Puede aumentar el riesgo de problemas cardiovasculares"]
            }
        ]
    });
    serde_json::from_value(sample).unwrap_or_default()
}
