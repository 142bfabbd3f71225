//! Single-request `efetch` task for one batch of IDs.

use crate::error::{FetchError, Phase, TransientError};
use crate::models::{FetchTaskConfig, MetadataTable, RequestSpec};
use crate::normalize::normalize;
use crate::tasks::{RequestTask, Step};
use crate::utils::{AttemptError, HttpResponse, RetryPolicy};

/// Fetches and normalizes the records of one ID batch
#[derive(Debug, Clone)]
pub struct FetchTask {
    config: FetchTaskConfig,
    request: RequestSpec,
    policy: RetryPolicy,
}

impl FetchTask {
    pub fn new(config: FetchTaskConfig, base_url: &str, policy: RetryPolicy) -> Self {
        let request = config.to_request(base_url);
        Self {
            config,
            request,
            policy,
        }
    }

    pub fn config(&self) -> &FetchTaskConfig {
        &self.config
    }
}

impl RequestTask for FetchTask {
    type Output = MetadataTable;

    fn phase(&self) -> Phase {
        Phase::Fetch
    }

    fn next_request(&self) -> RequestSpec {
        self.request.clone()
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn check(&self, response: HttpResponse) -> Result<String, AttemptError> {
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(TransientError::Status(response.status).into())
        }
    }

    fn consume(&mut self, body: &str) -> Result<Step<Self::Output>, FetchError> {
        let table = normalize(body)?;

        if table.len() != self.config.ids.len() {
            tracing::debug!(
                requested = self.config.ids.len(),
                received = table.len(),
                "fetch batch returned a different number of records"
            );
        }

        Ok(Step::Done(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn task(ids: &[u64]) -> FetchTask {
        let config = Config::default();
        FetchTask::new(
            FetchTaskConfig::from_ids(ids, "sra", &config),
            "https://host",
            RetryPolicy::jittered(2, Duration::ZERO, Duration::ZERO),
        )
    }

    #[test]
    fn test_any_failure_status_is_transient() {
        let task = task(&[1]);
        for status in [400, 404, 429, 500, 503] {
            assert!(matches!(
                task.check(HttpResponse::new(status, "")),
                Err(AttemptError::Transient(TransientError::Status(s))) if s == status
            ));
        }
        assert_eq!(
            task.check(HttpResponse::new(200, "<Set/>")).unwrap(),
            "<Set/>"
        );
    }

    #[test]
    fn test_consume_normalizes_body() {
        let mut task = task(&[1, 2]);
        let step = task
            .consume("<Set><Rec><A>1</A></Rec><Rec><A>2</A></Rec></Set>")
            .unwrap();

        match step {
            Step::Done(table) => {
                assert_eq!(table.len(), 2);
                assert_eq!(table.columns(), &["A"]);
            }
            Step::Continue => panic!("fetch tasks finish after one response"),
        }
    }

    #[test]
    fn test_malformed_body_fails_batch() {
        let mut task = task(&[1]);
        assert!(matches!(
            task.consume("<Set><Rec>"),
            Err(FetchError::Parse(_))
        ));
    }
}
