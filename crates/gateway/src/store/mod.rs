//! Remote record store: the four persistence verbs the gateway wraps.
//!
//! The gateway treats the store as an opaque collaborator. [`RecordStore`] is
//! the seam; [`PostgrestStore`] talks to a hosted PostgREST API.

pub mod postgrest;

pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use common::protocol::{MatchCriteria, Record, SelectQuery};
use thiserror::Error;

/// Error codes the store uses for "relation does not exist".
///
/// `42P01` is PostgreSQL's `undefined_table`; `PGRST205` is PostgREST's
/// "table not found in the schema cache".
pub const MISSING_RELATION_CODES: &[&str] = &["42P01", "PGRST205"];

/// Errors returned by a [`RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced an HTTP response.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("store returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Store error code, when the body carried one.
        code: Option<String>,
        /// Store error message.
        message: String,
    },

    /// The store answered with a body the gateway could not decode.
    #[error("invalid store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// `true` when the store reported that the table does not exist.
    pub fn is_missing_relation(&self) -> bool {
        match self {
            StoreError::Remote {
                code: Some(code), ..
            } => MISSING_RELATION_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// The error PostgREST returns for a nonexistent table.
    pub fn missing_relation(table: &str) -> Self {
        StoreError::Remote {
            status: 404,
            code: Some("42P01".into()),
            message: format!("relation \"public.{table}\" does not exist"),
        }
    }
}

/// The remote persistence verbs.
///
/// Implementations must be safe to share across tasks; the gateway holds one
/// behind an `Arc` for the life of the process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read rows of `table` matching `query`.
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Record>, StoreError>;

    /// Insert `rows` into `table`, returning the stored rows.
    async fn insert(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>, StoreError>;

    /// Apply `patch` to rows of `table` matching `matching`, returning the updated rows.
    async fn update(
        &self,
        table: &str,
        patch: Record,
        matching: &MatchCriteria,
    ) -> Result<Vec<Record>, StoreError>;

    /// Delete rows of `table` matching `matching`.
    async fn delete(&self, table: &str, matching: &MatchCriteria) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_relation_is_recognised() {
        assert!(StoreError::missing_relation("cases").is_missing_relation());
        let pgrst = StoreError::Remote {
            status: 404,
            code: Some("PGRST205".into()),
            message: "Could not find the table 'public.cases' in the schema cache".into(),
        };
        assert!(pgrst.is_missing_relation());
    }

    #[test]
    fn other_errors_are_not_missing_relation() {
        let denied = StoreError::Remote {
            status: 401,
            code: Some("42501".into()),
            message: "permission denied".into(),
        };
        assert!(!denied.is_missing_relation());
        assert!(!StoreError::Transport("connection refused".into()).is_missing_relation());
    }
}
