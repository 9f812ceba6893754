use thiserror::Error;

/// Unified error taxonomy for the ingestion pipeline.
///
/// Every component (upstream client, transform pool, bulk writer, scheduler)
/// returns one of these variants so the race processor and scheduler can apply
/// a single retry/classification policy instead of inspecting library-specific
/// error types at each call site.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("transient upstream error: {0}")]
    TransientUpstream(String),

    #[error("permanent upstream error (status {status}): {excerpt}")]
    PermanentUpstream { status: u16, excerpt: String },

    #[error("partition not found: {0}")]
    PartitionMissing(String),

    #[error("transient database error: {0}")]
    DbTransient(String),

    #[error("logic/invariant error: {0}")]
    Logic(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl IngestError {
    /// Whether the fetch/write step that produced this error may be retried
    /// by its caller. Cancellation and permanent/logic errors are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            IngestError::TransientUpstream(_) | IngestError::DbTransient(_)
        )
    }

    pub fn sanitize_excerpt(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.len() > 500 {
            format!("{}...", &trimmed[..500])
        } else {
            trimmed.to_string()
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                IngestError::DbTransient(err.to_string())
            }
            sqlx::Error::Database(db_err) => {
                // Postgres: 40001 serialization_failure, 40P01 deadlock_detected,
                // 08006/08003 connection errors.
                match db_err.code().as_deref() {
                    Some("40001") | Some("40P01") | Some("08006") | Some("08003") => {
                        IngestError::DbTransient(err.to_string())
                    }
                    _ => IngestError::Logic(err.to_string()),
                }
            }
            _ => IngestError::Logic(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return IngestError::TransientUpstream(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.is_server_error() {
                return IngestError::TransientUpstream(err.to_string());
            }
            return IngestError::PermanentUpstream {
                status: status.as_u16(),
                excerpt: IngestError::sanitize_excerpt(&err.to_string()),
            };
        }
        IngestError::TransientUpstream(err.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_db_transient_are_retriable() {
        assert!(IngestError::TransientUpstream("x".into()).is_retriable());
        assert!(IngestError::DbTransient("x".into()).is_retriable());
        assert!(!IngestError::Cancelled.is_retriable());
        assert!(!IngestError::Logic("x".into()).is_retriable());
        assert!(!IngestError::PartitionMissing("x".into()).is_retriable());
        assert!(!IngestError::PermanentUpstream {
            status: 404,
            excerpt: "x".into()
        }
        .is_retriable());
    }

    #[test]
    fn sanitize_excerpt_truncates_long_bodies() {
        let body = "a".repeat(600);
        let excerpt = IngestError::sanitize_excerpt(&body);
        assert!(excerpt.len() <= 503);
        assert!(excerpt.ends_with("..."));
    }
}
