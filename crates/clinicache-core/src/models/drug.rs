// openFDA drug label payloads. Every field is optional upstream, so everything
// defaults and accessors fall back to placeholder text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DrugSearchResponse {
    #[serde(default)]
    pub meta: Option<DrugMeta>,
    #[serde(default)]
    pub results: Vec<DrugLabel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DrugMeta {
    #[serde(default)]
    pub disclaimer: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub results: Option<ResultPage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ResultPage {
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OpenFda {
    #[serde(default)]
    pub brand_name: Vec<String>,
    #[serde(default)]
    pub generic_name: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DrugLabel {
    #[serde(default)]
    pub openfda: Option<OpenFda>,
    #[serde(default)]
    pub indications_and_usage: Vec<String>,
    #[serde(default)]
    pub dosage_and_administration: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DrugSearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl DrugLabel {
    pub fn brand_name(&self) -> &str {
        self.openfda
            .as_ref()
            .and_then(|o| o.brand_name.first())
            .map(String::as_str)
            .unwrap_or("Name not available")
    }

    pub fn generic_name(&self) -> &str {
        self.openfda
            .as_ref()
            .and_then(|o| o.generic_name.first())
            .map(String::as_str)
            .unwrap_or("Generic name not available")
    }

    pub fn indications(&self) -> &str {
        self.indications_and_usage
            .first()
            .map(String::as_str)
            .unwrap_or("No indications information available")
    }

    pub fn dosage(&self) -> &str {
        self.dosage_and_administration
            .first()
            .map(String::as_str)
            .unwrap_or("No dosage information available")
    }

    pub fn warning(&self) -> &str {
        self.warnings
            .first()
            .map(String::as_str)
            .unwrap_or("No warnings available")
    }
}
