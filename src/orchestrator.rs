//! Search-then-fetch orchestration.
//!
//! One run turns terms and/or IDs into a [`ResultSet`]:
//!
//! 1. terms are chunked by `search.terms_per_request`, each chunk OR-joined
//!    into one paginated search task;
//! 2. search hits are merged with the supplied IDs and deduplicated;
//! 3. the merged list is chunked by `fetch.ids_per_request` into fetch tasks;
//! 4. both phases go through the same [`RateLimiter`].
//!
//! Any failed chunk fails the run. The fetch phase never starts on an
//! incomplete search result.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{FetchError, Phase};
use crate::models::{FetchTaskConfig, MetadataTable, ResultSet, SearchTaskConfig};
use crate::tasks::{drive, FetchTask, SearchTask};
use crate::utils::{chunked, merge_ids, HttpClient, RateLimiter, Transport};

/// Database used when none is given
pub const DEFAULT_DB: &str = "sra";

/// Inputs of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Free-text search terms
    pub terms: Vec<String>,
    /// IDs to fetch in addition to search hits
    pub ids: Vec<u64>,
    /// Entrez database name
    pub db: String,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            ids: Vec::new(),
            db: DEFAULT_DB.to_string(),
        }
    }
}

impl FetchRequest {
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            ..Default::default()
        }
    }

    pub fn terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }
}

/// Runs searches and fetches against one transport with one configuration
#[derive(Debug, Clone)]
pub struct MetaFetcher {
    config: Config,
    transport: Arc<dyn Transport>,
}

impl MetaFetcher {
    /// Create a fetcher backed by a real HTTP client
    pub fn new(config: Config) -> Result<Self, FetchError> {
        config.validate()?;
        let client = HttpClient::from_config(&config.http)?;
        Ok(Self {
            config,
            transport: Arc::new(client),
        })
    }

    /// Create with a custom transport (for testing)
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn limiter(&self) -> Result<RateLimiter, FetchError> {
        RateLimiter::new(self.config.http.rate_limit())
    }

    /// One search task per chunk of terms
    pub fn search_tasks(&self, terms: &[String], db: &str) -> Vec<SearchTask> {
        chunked(terms, self.config.search.terms_per_request)
            .iter()
            .map(|chunk| {
                SearchTask::new(
                    SearchTaskConfig::from_terms(chunk, db, &self.config),
                    &self.config.http.base_url,
                    &self.config.http.retry_on,
                    self.config.search_retry_policy(),
                )
            })
            .collect()
    }

    /// One fetch task per batch of IDs
    pub fn fetch_tasks(&self, ids: &[u64], db: &str) -> Vec<FetchTask> {
        chunked(ids, self.config.fetch.ids_per_request)
            .iter()
            .map(|batch| {
                FetchTask::new(
                    FetchTaskConfig::from_ids(batch, db, &self.config),
                    &self.config.http.base_url,
                    self.config.fetch_retry_policy(),
                )
            })
            .collect()
    }

    /// Union of the IDs matching any of `terms`
    pub async fn search(&self, terms: &[String], db: &str) -> Result<BTreeSet<u64>, FetchError> {
        let limiter = self.limiter()?;
        let tasks = self.search_tasks(terms, db);
        tracing::info!(db, terms = terms.len(), chunks = tasks.len(), "searching");

        let operations = tasks
            .into_iter()
            .map(|task| drive(task, self.transport.clone()))
            .collect::<Vec<_>>();
        let pages = limiter.run(Phase::Search, operations).await?;

        let ids: BTreeSet<u64> = pages.into_iter().flatten().collect();
        tracing::info!(db, found = ids.len(), "search finished");
        Ok(ids)
    }

    /// Records for `ids`, batch order then record order
    pub async fn fetch(&self, ids: &[u64], db: &str) -> Result<MetadataTable, FetchError> {
        let limiter = self.limiter()?;
        let tasks = self.fetch_tasks(ids, db);
        tracing::info!(db, ids = ids.len(), batches = tasks.len(), "fetching");

        let operations = tasks
            .into_iter()
            .map(|task| drive(task, self.transport.clone()))
            .collect::<Vec<_>>();
        let tables = limiter.run(Phase::Fetch, operations).await?;

        let mut metadata = MetadataTable::new();
        for table in tables {
            metadata.append(table);
        }
        tracing::info!(
            db,
            records = metadata.len(),
            columns = metadata.columns().len(),
            "fetch finished"
        );
        Ok(metadata)
    }

    /// Search (when terms are given), merge IDs, fetch, and collect everything
    pub async fn run(&self, request: &FetchRequest) -> Result<ResultSet, FetchError> {
        if request.terms.is_empty() && request.ids.is_empty() {
            return Err(FetchError::NoInputSpecified);
        }
        // Reject a bad rate before any request goes out
        self.limiter()?;

        let searched = if request.terms.is_empty() {
            BTreeSet::new()
        } else {
            self.search(&request.terms, &request.db).await?
        };

        let ids = merge_ids(&request.ids, &searched);
        let metadata = if ids.is_empty() {
            tracing::info!(db = %request.db, "nothing to fetch");
            MetadataTable::new()
        } else {
            self.fetch(&ids, &request.db).await?
        };

        Ok(ResultSet::new(searched, ids, metadata))
    }
}

/// Run one search-then-fetch pass over HTTP
pub async fn fetch_metadata(request: &FetchRequest, config: Config) -> Result<ResultSet, FetchError> {
    MetaFetcher::new(config)?.run(request).await
}
