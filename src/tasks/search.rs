//! Paginated `esearch` task.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::error::{FetchError, Phase, TransientError};
use crate::models::{RequestSpec, SearchPage, SearchTaskConfig};
use crate::normalize::root_element;
use crate::tasks::{RequestTask, Step};
use crate::utils::{AttemptError, HttpResponse, RetryPolicy};

/// Expected root of a search response
const SEARCH_ROOT: &str = "eSearchResult";

/// Parse E-utilities search response XML
pub fn parse_search_page(xml: &str) -> Result<SearchPage, FetchError> {
    #[derive(Debug, Deserialize)]
    struct ESearchResult {
        #[serde(rename = "Count")]
        count: u64,
        #[serde(rename = "RetMax")]
        retmax: u64,
        #[serde(rename = "IdList")]
        id_list: IdList,
    }

    #[derive(Debug, Deserialize)]
    struct IdList {
        #[serde(rename = "Id", default)]
        ids: Vec<u64>,
    }

    let result: ESearchResult = quick_xml::de::from_str(xml)
        .map_err(|e| FetchError::Parse(format!("Failed to parse search XML: {}", e)))?;

    Ok(SearchPage {
        count: result.count,
        retmax: result.retmax,
        ids: result.id_list.ids.into_iter().collect(),
    })
}

/// Collects every ID matching one OR-joined chunk of terms.
///
/// Pages are requested strictly one after another; the offset advances by
/// the page size the server reports until it reaches the total count.
#[derive(Debug, Clone)]
pub struct SearchTask {
    config: SearchTaskConfig,
    request: RequestSpec,
    policy: RetryPolicy,
    retry_on: Vec<u16>,
    retstart: u64,
    pages: u32,
    ids: BTreeSet<u64>,
}

impl SearchTask {
    pub fn new(
        config: SearchTaskConfig,
        base_url: &str,
        retry_on: &[u16],
        policy: RetryPolicy,
    ) -> Self {
        let request = config.to_request(base_url);
        Self {
            config,
            request,
            policy,
            retry_on: retry_on.to_vec(),
            retstart: 0,
            pages: 0,
            ids: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &SearchTaskConfig {
        &self.config
    }

    /// Current offset cursor
    pub fn retstart(&self) -> u64 {
        self.retstart
    }

    /// Pages consumed so far
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Fold one page into the running set and move the cursor
    pub fn advance(&mut self, page: SearchPage) -> Result<Step<BTreeSet<u64>>, FetchError> {
        if page.retmax == 0 && self.retstart < page.count {
            // The cursor could never reach the total
            return Err(FetchError::Parse(format!(
                "search for {:?} returned an empty page at offset {} of {}",
                self.config.term, self.retstart, page.count
            )));
        }
        if page.ids.is_empty() && page.count > 0 {
            tracing::warn!(
                term = %self.config.term,
                retstart = self.retstart,
                retmax = page.retmax,
                "search page reported a size but listed no IDs"
            );
        }

        self.pages += 1;
        self.retstart += page.retmax;
        self.ids.extend(page.ids);

        tracing::debug!(
            term = %self.config.term,
            retstart = self.retstart,
            count = page.count,
            collected = self.ids.len(),
            "search page consumed"
        );

        if self.retstart >= page.count {
            Ok(Step::Done(std::mem::take(&mut self.ids)))
        } else {
            self.request.set_param("retstart", self.retstart);
            Ok(Step::Continue)
        }
    }
}

impl RequestTask for SearchTask {
    type Output = BTreeSet<u64>;

    fn phase(&self) -> Phase {
        Phase::Search
    }

    fn next_request(&self) -> RequestSpec {
        self.request.clone()
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn check(&self, response: HttpResponse) -> Result<String, AttemptError> {
        if self.retry_on.contains(&response.status) {
            return Err(TransientError::Status(response.status).into());
        }
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
            }
            .into());
        }

        match root_element(&response.body) {
            Some(root) if root == SEARCH_ROOT => Ok(response.body),
            Some(root) => Err(TransientError::UnexpectedRoot(root).into()),
            None => Err(TransientError::UnexpectedRoot("<none>".to_string()).into()),
        }
    }

    fn consume(&mut self, body: &str) -> Result<Step<Self::Output>, FetchError> {
        let page = parse_search_page(body)?;
        self.advance(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn search_xml(count: u64, retmax: u64, ids: &[u64]) -> String {
        let ids = ids
            .iter()
            .map(|id| format!("<Id>{}</Id>", id))
            .collect::<String>();
        format!(
            "<?xml version=\"1.0\"?><eSearchResult><Count>{}</Count><RetMax>{}</RetMax>\
             <RetStart>0</RetStart><IdList>{}</IdList></eSearchResult>",
            count, retmax, ids
        )
    }

    fn task() -> SearchTask {
        let mut config = Config::default();
        config.http.api_key = None;
        let terms = vec!["foo".to_string()];
        SearchTask::new(
            SearchTaskConfig::from_terms(&terms, "sra", &config),
            "https://host",
            &[429],
            RetryPolicy::exponential(3, Duration::ZERO, Duration::ZERO),
        )
    }

    #[test]
    fn test_parse_search_page() {
        let page = parse_search_page(&search_xml(3, 3, &[1, 2, 3])).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.retmax, 3);
        assert_eq!(page.ids, BTreeSet::from([1, 2, 3]));

        let empty = parse_search_page(
            "<eSearchResult><Count>0</Count><RetMax>0</RetMax><IdList/></eSearchResult>",
        )
        .unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.ids.is_empty());
    }

    #[test]
    fn test_parse_requires_all_fields() {
        let no_count = "<eSearchResult><RetMax>1</RetMax><IdList><Id>1</Id></IdList></eSearchResult>";
        let no_list = "<eSearchResult><Count>1</Count><RetMax>1</RetMax></eSearchResult>";
        let error = "<eSearchResult><ERROR>Invalid query</ERROR></eSearchResult>";

        for xml in [no_count, no_list, error] {
            assert!(matches!(parse_search_page(xml), Err(FetchError::Parse(_))));
        }
    }

    #[test]
    fn test_pagination_advances_by_returned_size() {
        let mut task = task();

        let first = SearchPage {
            count: 5,
            retmax: 2,
            ids: BTreeSet::from([1, 2]),
        };
        assert_eq!(task.advance(first).unwrap(), Step::Continue);
        assert_eq!(task.next_request().get_param("retstart"), Some("2"));

        let second = SearchPage {
            count: 5,
            retmax: 2,
            ids: BTreeSet::from([3, 4]),
        };
        assert_eq!(task.advance(second).unwrap(), Step::Continue);
        assert_eq!(task.retstart(), 4);

        let last = SearchPage {
            count: 5,
            retmax: 1,
            ids: BTreeSet::from([5]),
        };
        assert_eq!(
            task.advance(last).unwrap(),
            Step::Done(BTreeSet::from([1, 2, 3, 4, 5]))
        );
        assert_eq!(task.pages(), 3);
    }

    #[test]
    fn test_zero_size_page_below_total_is_fatal() {
        let mut task = task();
        let page = SearchPage {
            count: 10,
            retmax: 0,
            ids: BTreeSet::new(),
        };
        assert!(matches!(task.advance(page), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_no_matches_finishes_immediately() {
        let mut task = task();
        let page = SearchPage::default();
        assert_eq!(task.advance(page).unwrap(), Step::Done(BTreeSet::new()));
    }

    #[test]
    fn test_check_classifies_responses() {
        let task = task();

        assert!(matches!(
            task.check(HttpResponse::new(429, "")),
            Err(AttemptError::Transient(TransientError::Status(429)))
        ));
        assert!(matches!(
            task.check(HttpResponse::new(400, "bad")),
            Err(AttemptError::Fatal(FetchError::Status { status: 400 }))
        ));
        assert!(matches!(
            task.check(HttpResponse::new(200, "<html>busy</html>")),
            Err(AttemptError::Transient(TransientError::UnexpectedRoot(_)))
        ));
        assert!(task.check(HttpResponse::new(200, search_xml(0, 0, &[]))).is_ok());
    }
}
