//! Rate-limited execution of independent async operations.
//!
//! Two limits hold at once: at most `R + 1` operations in flight, and
//! consecutive launches at least `1/R` seconds apart. The extra slot lets one
//! operation finish while the next one starts.

use futures_util::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::{sleep_until, Instant};

use crate::error::{FetchError, Phase};

/// The gate is owned by one `run` call and never closed while it runs
fn gate_closed(err: AcquireError) -> FetchError {
    FetchError::Join(format!("admission gate closed: {}", err))
}

/// Runs batches of operations under a launch-rate and concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    requests_per_second: u32,
}

impl RateLimiter {
    /// Fails with [`FetchError::InvalidRateLimit`] unless the rate is positive
    pub fn new(requests_per_second: i64) -> Result<Self, FetchError> {
        match u32::try_from(requests_per_second) {
            Ok(rps) if rps > 0 => Ok(Self {
                requests_per_second: rps,
            }),
            _ => Err(FetchError::InvalidRateLimit(requests_per_second)),
        }
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    /// Minimum spacing between two launches
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.requests_per_second))
    }

    /// Admission gate size
    pub fn capacity(&self) -> usize {
        self.requests_per_second as usize + 1
    }

    /// Run every operation and return the results in submission order.
    ///
    /// If any operation fails, no further operations are admitted, already
    /// running ones finish on their own, and the earliest failed submission
    /// is reported as [`FetchError::Orchestration`].
    pub async fn run<T, Fut>(&self, phase: Phase, operations: Vec<Fut>) -> Result<Vec<T>, FetchError>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let total = operations.len();
        let interval = self.interval();
        let gate = Arc::new(Semaphore::new(self.capacity()));
        let failed = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(total);

        tracing::debug!(
            %phase,
            total,
            rate = self.requests_per_second,
            "scheduling operations"
        );

        for (index, operation) in operations.into_iter().enumerate() {
            if failed.load(Ordering::SeqCst) {
                tracing::warn!(
                    %phase,
                    skipped = total - index,
                    "a {} task failed, not launching the remaining ones",
                    phase
                );
                break;
            }

            let permit = gate
                .clone()
                .acquire_owned()
                .await
                .map_err(gate_closed)?;
            let started = Instant::now();
            let failed = failed.clone();

            handles.push(tokio::spawn(async move {
                let result = operation.await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                drop(permit);
                result
            }));

            if index + 1 < total {
                sleep_until(started + interval).await;
            }
        }

        let mut outputs = Vec::with_capacity(total);
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let error = match joined {
                Ok(Ok(value)) => {
                    outputs.push(value);
                    continue;
                }
                Ok(Err(error)) => error,
                Err(join) => FetchError::Join(join.to_string()),
            };

            tracing::error!(%phase, index, "task failed: {}", error);
            return Err(FetchError::Orchestration {
                phase,
                index,
                source: Box::new(error),
            });
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_closed_gate_is_reported_as_admission_failure() {
        let gate = Semaphore::new(1);
        gate.close();
        let err = gate_closed(gate.acquire().await.unwrap_err());

        assert!(matches!(err, FetchError::Join(_)));
        assert!(err.to_string().contains("admission gate closed"));
    }

    #[test]
    fn test_invalid_rate_limit() {
        assert!(matches!(
            RateLimiter::new(0),
            Err(FetchError::InvalidRateLimit(0))
        ));
        assert!(matches!(
            RateLimiter::new(-3),
            Err(FetchError::InvalidRateLimit(-3))
        ));

        let limiter = RateLimiter::new(4).unwrap();
        assert_eq!(limiter.capacity(), 5);
        assert_eq!(limiter.interval(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_are_spaced_and_results_ordered() {
        let limiter = RateLimiter::new(2).unwrap();
        let launches = Arc::new(Mutex::new(Vec::new()));

        let operations = (0..5)
            .map(|i| {
                let launches = launches.clone();
                async move {
                    launches.lock().unwrap().push(Instant::now());
                    Ok::<_, FetchError>(i)
                }
            })
            .collect::<Vec<_>>();

        let results = limiter.run(Phase::Search, operations).await.unwrap();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);

        let launches = launches.lock().unwrap();
        assert_eq!(launches.len(), 5);
        let spread = launches[4] - launches[0];
        assert!(spread >= Duration::from_secs(2), "spread was {:?}", spread);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_submission_not_completion_order() {
        let limiter = RateLimiter::new(10).unwrap();

        let operations = (0..4u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(500 - i * 100)).await;
                Ok::<_, FetchError>(i * 10)
            })
            .collect::<Vec<_>>();

        let results = limiter.run(Phase::Fetch, operations).await.unwrap();
        assert_eq!(results, vec![0, 10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_capacity() {
        let limiter = RateLimiter::new(2).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let operations = (0..8)
            .map(|_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, FetchError>(())
                }
            })
            .collect::<Vec<_>>();

        limiter.run(Phase::Fetch, operations).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), limiter.capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_admission_and_fails_batch() {
        let limiter = RateLimiter::new(10).unwrap();
        let launched = Arc::new(AtomicUsize::new(0));

        let operations = (0..5usize)
            .map(|i| {
                let launched = launched.clone();
                async move {
                    launched.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        Err(FetchError::Parse("bad page".to_string()))
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect::<Vec<_>>();

        let result = limiter.run(Phase::Search, operations).await;

        match result {
            Err(FetchError::Orchestration {
                phase: Phase::Search,
                index: 1,
                source,
            }) => assert!(matches!(*source, FetchError::Parse(_))),
            other => panic!("expected orchestration failure, got {:?}", other),
        }
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let limiter = RateLimiter::new(3).unwrap();
        let operations: Vec<std::future::Ready<Result<u8, FetchError>>> = Vec::new();
        assert!(limiter.run(Phase::Fetch, operations).await.unwrap().is_empty());
    }
}
