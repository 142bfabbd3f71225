//! Per-chunk task configurations for search and fetch.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::RequestSpec;

/// Search endpoint relative to the E-utilities root
pub const ESEARCH_PATH: &str = "esearch.fcgi";

/// Fetch endpoint relative to the E-utilities root
pub const EFETCH_PATH: &str = "efetch.fcgi";

/// Join the E-utilities root and an endpoint name
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// One search chunk: a group of terms OR-joined into a single query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTaskConfig {
    /// Entrez database name
    pub db: String,
    /// Terms joined with ` OR `
    pub term: String,
    /// Page size requested per search call
    pub retmax: usize,
    pub api_key: Option<String>,
    /// Attempts per page
    pub max_retries: u32,
}

impl SearchTaskConfig {
    /// Build the task for one chunk of terms
    pub fn from_terms(terms: &[String], db: &str, config: &Config) -> Self {
        Self {
            db: db.to_string(),
            term: terms.join(" OR "),
            retmax: config.search.ids_per_request,
            api_key: config.http.api_key().map(str::to_string),
            max_retries: config.search.max_retries,
        }
    }

    /// Request for the first page; later pages only change `retstart`
    pub fn to_request(&self, base_url: &str) -> RequestSpec {
        let spec = RequestSpec::new(endpoint(base_url, ESEARCH_PATH))
            .param("db", &self.db)
            .param("term", &self.term)
            .param("retmode", "xml")
            .param("retmax", self.retmax);

        match &self.api_key {
            Some(key) => spec.param("api_key", key),
            None => spec,
        }
    }
}

/// One fetch batch: up to `fetch.ids_per_request` IDs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTaskConfig {
    pub db: String,
    /// IDs in batch order
    pub ids: Vec<u64>,
    pub api_key: Option<String>,
    /// Attempts for this batch
    pub max_retries: u32,
}

impl FetchTaskConfig {
    pub fn from_ids(ids: &[u64], db: &str, config: &Config) -> Self {
        Self {
            db: db.to_string(),
            ids: ids.to_vec(),
            api_key: config.http.api_key().map(str::to_string),
            max_retries: config.fetch.max_retries,
        }
    }

    pub fn to_request(&self, base_url: &str) -> RequestSpec {
        let ids = self
            .ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let spec = RequestSpec::new(endpoint(base_url, EFETCH_PATH))
            .param("db", &self.db)
            .param("id", ids)
            .param("retmode", "xml")
            .param("retmax", self.ids.len());

        match &self.api_key {
            Some(key) => spec.param("api_key", key),
            None => spec,
        }
    }
}
