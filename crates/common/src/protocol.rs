//! Record and wire types exchanged between callers, the gateway, and the store.
//!
//! These types are serialised as JSON over the public HTTP API and are also
//! used directly by in-process callers of the gateway library.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records and queries
// ---------------------------------------------------------------------------

/// One row: a flat map from field name to value.
///
/// Values are strings, numbers, booleans, dates (as strings), or null.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Equality match criteria, `column → value`, used to scope reads and writes.
pub type MatchCriteria = BTreeMap<String, String>;

/// Sort order applied to a select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Column to sort by.
    pub column: String,
    /// `true` for ascending (the default), `false` for descending.
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

/// Parameters of a read against one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Comma-separated column list; `None` selects every column.
    #[serde(default)]
    pub columns: Option<String>,
    /// Rows must match every entry.
    #[serde(default)]
    pub filters: MatchCriteria,
    /// Maximum number of rows to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Optional sort order.
    #[serde(default)]
    pub order: Option<Order>,
}

impl SelectQuery {
    /// A query that selects every row and column.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality filter.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort by `column`.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Body returned by every record route: exactly one of `data` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse<T> {
    /// Payload on success.
    pub data: Option<T>,
    /// Structured error on failure.
    pub error: Option<ErrorResponse>,
}

impl<T> GatewayResponse<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// A failed response carrying `error` and no data.
    pub fn err(error: ErrorResponse) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }
}

/// Standard error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"relation_does_not_exist"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health, status, and setup
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether a real (non-fallback, long enough) key is in use.
    pub key_configured: bool,
    /// Number of tables with registered sensitive fields.
    pub tables_registered: usize,
}

/// Response body for `GET /encryption/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionStatus {
    /// Where the active key came from (`"environment"`, `"secret_store"`,
    /// `"development_fallback"`).
    pub key_source: String,
    /// Whether the key passes the configuration check.
    pub key_configured: bool,
    /// Advisory strength findings for the active key.
    pub key_issues: Vec<String>,
    /// Sensitive fields per table.
    pub tables: BTreeMap<String, Vec<String>>,
}

/// Response body for `POST /encryption/self-test`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestResponse {
    /// Whether encrypt, detect, and decrypt all behaved.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

/// Response body for `POST /encryption/generate-key`.
///
/// The key is returned to the operator once and never stored by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedKey {
    /// Freshly generated key, suitable for `ENCRYPTION_KEY`.
    pub key: String,
    /// Length in characters.
    pub length: usize,
}

/// Readiness of one table in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    /// The table answered a probe read.
    Ready,
    /// The store reported that the relation does not exist.
    Missing,
    /// The probe failed for any other reason.
    Unreachable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_query_builder() {
        let q = SelectQuery::all()
            .filter("status", "open")
            .limit(10)
            .order_by("created_at", false);
        assert_eq!(q.filters.get("status").map(String::as_str), Some("open"));
        assert_eq!(q.limit, Some(10));
        assert_eq!(
            q.order,
            Some(Order {
                column: "created_at".into(),
                ascending: false
            })
        );
    }

    #[test]
    fn order_defaults_to_ascending() {
        let order: Order = serde_json::from_value(json!({"column": "name"})).unwrap();
        assert!(order.ascending);
    }

    #[test]
    fn error_envelope_has_null_data() {
        let resp: GatewayResponse<Vec<Record>> =
            GatewayResponse::err(ErrorResponse::new("relation_does_not_exist", "no table"));
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v["data"].is_null());
        assert_eq!(v["error"]["code"], "relation_does_not_exist");
    }

    #[test]
    fn table_state_serialises_snake_case() {
        let v = serde_json::to_value(TableState::Unreachable).unwrap();
        assert_eq!(v, json!("unreachable"));
    }
}
