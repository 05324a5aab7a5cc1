//! crates/firefly_core/src/ports.rs
//!
//! Defines the transport contract (trait) and the closed error family for
//! the engine. The trait forms the boundary of the hexagonal architecture,
//! allowing the core to be independent of the concrete HTTP client that
//! talks to Firefly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Event, Task};

//=========================================================================================
// Error Family
//=========================================================================================

/// The four kinds of cycle failure the engine distinguishes.
///
/// This is a closed set: every transport failure maps to exactly one kind,
/// and unknown failure shapes default to `DataFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Connection,
    RateLimit,
    DataFormat,
}

impl ErrorKind {
    /// All kinds, in a stable order. Used to build the health table.
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::Authentication,
        ErrorKind::Connection,
        ErrorKind::RateLimit,
        ErrorKind::DataFormat,
    ];
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Connection => "connection",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::DataFormat => "data_format",
        };
        f.write_str(s)
    }
}

/// A failure raised by the Firefly transport.
///
/// One variant per [`ErrorKind`]; `kind()` is the total classifier. The
/// adapter constructs these directly instead of throwing an open-ended
/// exception hierarchy.
#[derive(Debug, thiserror::Error)]
pub enum FireflyError {
    /// Credentials rejected or token expired. Requires external re-auth;
    /// does not self-heal.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport-level failure (timeout, refused connection, 5xx).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The service asked us to back off.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Payload shape violated expectations, or an unclassifiable failure.
    #[error("Data format error: {0}")]
    DataFormat(String),
}

impl FireflyError {
    /// Classify this failure. Pure and total: every error has exactly one kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FireflyError::Authentication(_) => ErrorKind::Authentication,
            FireflyError::Connection(_) => ErrorKind::Connection,
            FireflyError::RateLimit(_) => ErrorKind::RateLimit,
            FireflyError::DataFormat(_) => ErrorKind::DataFormat,
        }
    }
}

/// A convenience type alias for `Result<T, FireflyError>`.
pub type FireflyResult<T> = Result<T, FireflyError>;

//=========================================================================================
// Transport Port (Trait)
//=========================================================================================

/// The external data source for one Firefly installation.
///
/// One logical request per child per call; the orchestrator may issue calls
/// for independent children concurrently. Implementations impose their own
/// per-call timeout and surface it as [`FireflyError::Connection`].
#[async_trait]
pub trait FireflyApi: Send + Sync {
    /// Fetch timetable events for a child within `[start, end)`.
    async fn fetch_events(
        &self,
        child_guid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FireflyResult<Vec<Event>>;

    /// Fetch the task listing for a child. Window filtering happens in the
    /// engine, not here; the listing should include overdue and completed
    /// tasks so every bucket can be derived from one response.
    async fn fetch_tasks(&self, child_guid: &str) -> FireflyResult<Vec<Task>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_over_all_variants() {
        let cases = [
            (
                FireflyError::Authentication("token expired".into()),
                ErrorKind::Authentication,
            ),
            (
                FireflyError::Connection("timeout".into()),
                ErrorKind::Connection,
            ),
            (FireflyError::RateLimit("429".into()), ErrorKind::RateLimit),
            (
                FireflyError::DataFormat("bad json".into()),
                ErrorKind::DataFormat,
            ),
        ];
        for (err, want) in cases {
            assert_eq!(err.kind(), want);
        }
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::RateLimit).unwrap(),
            "\"rate_limit\""
        );
    }
}
