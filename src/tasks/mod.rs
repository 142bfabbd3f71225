//! Request tasks: the unit of work the scheduler runs.
//!
//! A task produces the next [`RequestSpec`], decides which responses are
//! worth retrying, and consumes accepted bodies until it is done. Search
//! tasks loop over result pages; fetch tasks finish after one response.
//! [`drive`] runs any task against a [`Transport`].

mod fetch;
mod search;

pub use fetch::FetchTask;
pub use search::{parse_search_page, SearchTask};

use std::sync::Arc;

use crate::error::{FetchError, Phase};
use crate::models::RequestSpec;
use crate::utils::{with_retry, AttemptError, HttpResponse, RetryPolicy, Transport};

/// What a task wants after consuming a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Issue [`RequestTask::next_request`] again
    Continue,
    /// Finished with this output
    Done(T),
}

/// One logical search or fetch job
pub trait RequestTask: Send + Sync {
    type Output: Send + 'static;

    fn phase(&self) -> Phase;

    /// Request to send next
    fn next_request(&self) -> RequestSpec;

    fn retry_policy(&self) -> &RetryPolicy;

    /// Accept a response body or classify the failure
    fn check(&self, response: HttpResponse) -> Result<String, AttemptError>;

    /// Fold an accepted body into the task state
    fn consume(&mut self, body: &str) -> Result<Step<Self::Output>, FetchError>;
}

/// Run a task to completion, retrying each request per the task's policy
pub async fn drive<T: RequestTask>(
    mut task: T,
    transport: Arc<dyn Transport>,
) -> Result<T::Output, FetchError> {
    loop {
        let request = task.next_request();
        let phase = task.phase();

        let body = {
            let task = &task;
            let request = &request;
            let transport = transport.as_ref();
            with_retry(task.retry_policy(), |attempt| async move {
                tracing::debug!(
                    %phase,
                    attempt,
                    method = %request.method(),
                    url = %request.url,
                    "request attempt"
                );
                let response = transport.send(request).await?;
                task.check(response)
            })
            .await?
        };

        match task.consume(&body)? {
            Step::Continue => continue,
            Step::Done(output) => return Ok(output),
        }
    }
}
