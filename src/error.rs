//! Error types shared by the fetch pipeline.

use std::fmt;

/// Pipeline phase a scheduled chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Term search with pagination
    Search,
    /// Batched metadata fetch
    Fetch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Search => f.write_str("search"),
            Phase::Fetch => f.write_str("fetch"),
        }
    }
}

/// A single attempt's retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransientError {
    /// The server answered with a status that the policy retries on
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, timeout or body read failure
    #[error("network failure: {0}")]
    Network(String),

    /// The body did not start with the expected root element
    #[error("unexpected response root: {0}")]
    UnexpectedRoot(String),
}

/// Errors that can occur while searching or fetching records
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Requests per second must be positive
    #[error("Invalid rate limit: {0} requests per second")]
    InvalidRateLimit(i64),

    /// Neither terms nor IDs were given
    #[error("Either terms or ids need to be specified")]
    NoInputSpecified,

    /// Any other configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// The retry ceiling was reached for one task
    #[error("Request exhausted after {attempts} attempts, last failure: {last}")]
    RequestExhausted { attempts: u32, last: TransientError },

    /// Non-retryable HTTP status
    #[error("Upstream returned non-retryable status {status}")]
    Status { status: u16 },

    /// Malformed or structurally unexpected response body
    #[error("Parse error: {0}")]
    Parse(String),

    /// A scheduled chunk failed and took the whole run with it
    #[error("{phase} chunk {index} failed: {source}")]
    Orchestration {
        phase: Phase,
        index: usize,
        #[source]
        source: Box<FetchError>,
    },

    /// A scheduled task panicked or was aborted, or could not be admitted
    #[error("Task join error: {0}")]
    Join(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// True for errors raised before any network activity
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidRateLimit(_) | FetchError::NoInputSpecified | FetchError::Config(_)
        )
    }

    /// Innermost error, looking through orchestration wrappers
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::Orchestration { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<quick_xml::DeError> for FetchError {
    fn from(err: quick_xml::DeError) -> Self {
        FetchError::Parse(format!("XML: {}", err))
    }
}

impl From<quick_xml::Error> for FetchError {
    fn from(err: quick_xml::Error) -> Self {
        FetchError::Parse(format!("XML: {}", err))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(format!("JSON: {}", err))
    }
}

impl From<reqwest::Error> for TransientError {
    fn from(err: reqwest::Error) -> Self {
        TransientError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_orchestration() {
        let err = FetchError::Orchestration {
            phase: Phase::Fetch,
            index: 2,
            source: Box::new(FetchError::RequestExhausted {
                attempts: 5,
                last: TransientError::Status(503),
            }),
        };

        assert!(matches!(
            err.root(),
            FetchError::RequestExhausted { attempts: 5, .. }
        ));
        assert_eq!(
            err.to_string(),
            "fetch chunk 2 failed: Request exhausted after 5 attempts, last failure: HTTP status 503"
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(FetchError::NoInputSpecified.is_configuration());
        assert!(FetchError::InvalidRateLimit(0).is_configuration());
        assert!(!FetchError::Parse("x".to_string()).is_configuration());
    }
}
