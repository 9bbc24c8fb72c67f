use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use super::backend::KeyValueBackend;
use super::error::Result;

const SESSION_DATA_KEY: &str = "hospital_session_data";

/// Search terms kept in the session.
const MAX_SEARCH_HISTORY: usize = 20;

/// Search terms shown to the user.
const RECENT_SEARCHES_SHOWN: usize = 5;

/// Key under `temporary_data` holding per-page visit counters.
const PAGE_VISITS_KEY: &str = "pageVisits";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionData {
    #[serde(rename = "lastVisitedPage", default = "default_page")]
    pub last_visited_page: String,
    /// Most recent first.
    #[serde(rename = "searchHistory", default)]
    pub search_history: Vec<String>,
    #[serde(rename = "temporaryData", default)]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub temporary_data: Map<String, Value>,
}

fn default_page() -> String {
    "/".to_string()
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            last_visited_page: default_page(),
            search_history: Vec::new(),
            temporary_data: Map::new(),
        }
    }
}

pub struct SessionService<B> {
    backend: B,
}

impl<B: KeyValueBackend> SessionService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Stored session data, or defaults if missing or unreadable.
    pub fn get(&self) -> SessionData {
        let stored = match self.backend.get_item(SESSION_DATA_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return SessionData::default(),
            Err(e) => {
                error!(error = %e, "Failed to read session data");
                return SessionData::default();
            }
        };

        serde_json::from_str(&stored).unwrap_or_else(|e| {
            error!(error = %e, "Stored session data is invalid, using defaults");
            SessionData::default()
        })
    }

    pub fn save(&self, data: &SessionData) -> Result<()> {
        let json = serde_json::to_string(data)?;
        self.backend
            .set_item(SESSION_DATA_KEY, &json)
            .inspect_err(|e| error!(error = %e, "Failed to save session data"))
    }

    fn modify<T>(&self, change: impl FnOnce(&mut SessionData) -> T) -> Result<T> {
        let mut data = self.get();
        let result = change(&mut data);
        self.save(&data)?;
        Ok(result)
    }

    pub fn update_last_visited_page(&self, page: &str) -> Result<()> {
        self.modify(|data| data.last_visited_page = page.to_string())
    }

    /// Record a search term. Blank terms are ignored; a repeated term moves to the front.
    pub fn add_to_search_history(&self, term: &str) -> Result<()> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(());
        }
        self.modify(|data| {
            data.search_history.retain(|t| t != term);
            data.search_history.insert(0, term.to_string());
            data.search_history.truncate(MAX_SEARCH_HISTORY);
        })
    }

    /// The most recent search terms, newest first, at most five.
    pub fn recent_searches(&self) -> Vec<String> {
        let mut history = self.get().search_history;
        history.truncate(RECENT_SEARCHES_SHOWN);
        history
    }

    pub fn clear_search_history(&self) -> Result<()> {
        self.modify(|data| data.search_history.clear())
    }

    /// Increment and return the visit counter for `page`.
    pub fn record_page_visit(&self, page: &str) -> Result<u64> {
        self.modify(|data| {
            let visits = data
                .temporary_data
                .entry(PAGE_VISITS_KEY)
                .or_insert_with(|| Value::Object(Map::new()));
            if !visits.is_object() {
                *visits = Value::Object(Map::new());
            }
            let count = visits
                .get(page)
                .and_then(Value::as_u64)
                .unwrap_or(0)
                + 1;
            if let Some(map) = visits.as_object_mut() {
                map.insert(page.to_string(), Value::from(count));
            }
            count
        })
    }

    pub fn set_temporary(&self, key: &str, value: Value) -> Result<()> {
        self.modify(|data| {
            data.temporary_data.insert(key.to_string(), value);
        })
    }

    pub fn temporary(&self, key: &str) -> Option<Value> {
        self.get().temporary_data.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{MemoryBackend, PrefsError};
    use serde_json::json;

    fn service() -> SessionService<MemoryBackend> {
        SessionService::new(MemoryBackend::new())
    }

    #[test]
    fn test_defaults() {
        let data = service().get();
        assert_eq!(data.last_visited_page, "/");
        assert!(data.search_history.is_empty());
        assert!(data.temporary_data.is_empty());
    }

    #[test]
    fn test_update_last_visited_page() {
        let service = service();
        service.update_last_visited_page("/citas").unwrap();
        assert_eq!(service.get().last_visited_page, "/citas");
    }

    #[test]
    fn test_search_history_dedupes_and_caps_display() {
        let service = service();
        for term in ["mario", "dolor", "  ", "bodoque", "mario", "a", "b", "c"] {
            service.add_to_search_history(term).unwrap();
        }

        let history = service.get().search_history;
        assert_eq!(history, vec!["c", "b", "a", "mario", "bodoque", "dolor"]);
        assert_eq!(service.recent_searches(), vec!["c", "b", "a", "mario", "bodoque"]);

        service.clear_search_history().unwrap();
        assert!(service.recent_searches().is_empty());
    }

    #[test]
    fn test_search_history_is_bounded() {
        let service = service();
        for i in 0..30 {
            service.add_to_search_history(&format!("term {}", i)).unwrap();
        }
        let history = service.get().search_history;
        assert_eq!(history.len(), MAX_SEARCH_HISTORY);
        assert_eq!(history[0], "term 29");
    }

    #[test]
    fn test_record_page_visit() {
        let service = service();
        assert_eq!(service.record_page_visit("/doctores").unwrap(), 1);
        assert_eq!(service.record_page_visit("/doctores").unwrap(), 2);
        assert_eq!(service.record_page_visit("/citas").unwrap(), 1);
        assert_eq!(
            service.temporary(PAGE_VISITS_KEY),
            Some(json!({"/doctores": 2, "/citas": 1}))
        );
    }

    #[test]
    fn test_temporary_values() {
        let service = service();
        service
            .set_temporary("appointmentFilter", json!({"status": "pending"}))
            .unwrap();
        assert_eq!(
            service.temporary("appointmentFilter"),
            Some(json!({"status": "pending"}))
        );
        assert_eq!(service.temporary("missing"), None);
    }

    #[test]
    fn test_reads_legacy_client_format() {
        let backend = MemoryBackend::new();
        backend
            .set_item(
                SESSION_DATA_KEY,
                r#"{"lastVisitedPage":"/medicamentos","searchHistory":["ibuprofeno"]}"#,
            )
            .unwrap();
        let data = SessionService::new(backend).get();
        assert_eq!(data.last_visited_page, "/medicamentos");
        assert_eq!(data.search_history, vec!["ibuprofeno"]);
    }

    #[test]
    fn test_write_failure_surfaces() {
        let service = SessionService::new(MemoryBackend::with_quota(4));
        assert!(matches!(
            service.update_last_visited_page("/doctores"),
            Err(PrefsError::QuotaExceeded { .. })
        ));
        assert_eq!(service.get(), SessionData::default());
    }
}
