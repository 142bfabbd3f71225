//! Utility modules supporting the fetch pipeline.
//!
//! - [`HttpClient`]: reqwest-backed [`Transport`]
//! - [`RetryPolicy`] and [`with_retry`]: bounded retries with exponential or jittered backoff
//! - [`RateLimiter`]: concurrency- and rate-limited batch execution
//! - [`chunked`] and [`merge_ids`]: request-sized chunks and ID union
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use ezmetafetch::utils::{with_retry, AttemptError, RetryPolicy};
//! use ezmetafetch::TransientError;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::exponential(3, Duration::from_secs(1), Duration::from_secs(2));
//! let value = with_retry(&policy, |attempt| async move {
//!     if attempt < 2 {
//!         Err(AttemptError::Transient(TransientError::Status(429)))
//!     } else {
//!         Ok(attempt)
//!     }
//! })
//! .await?;
//! assert_eq!(value, 2);
//! # Ok(())
//! # }
//! ```

mod chunk;
mod http;
mod retry;
mod scheduler;

pub use chunk::{chunked, merge_ids};
pub use http::{HttpClient, HttpResponse, Transport};
pub use retry::{with_retry, AttemptError, Backoff, RetryPolicy};
pub use scheduler::RateLimiter;
