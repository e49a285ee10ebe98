//! Axum request handlers for all service endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    EncryptionStatus, ErrorResponse, GatewayResponse, GeneratedKey, HealthResponse,
    MatchCriteria, Order, Record, SelectQuery,
};
use common::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::AppState;
use crate::key::{generate_key, MIN_KEY_CHARS};

/// Longest table name PostgreSQL accepts without truncation.
const MAX_TABLE_NAME_LEN: usize = 63;

/// Longest key `POST /encryption/generate-key` will produce.
const MAX_GENERATED_KEY_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Record routes
// ---------------------------------------------------------------------------

/// `GET /records/{table}` — read and decrypt rows.
///
/// Query parameters: `select` (column list), `limit`, `order` (`col`,
/// `col.asc`, or `col.desc`); every other parameter is an equality filter.
pub async fn select_records(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    params: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> Response {
    let (table, Query(params)) = match (table_param(table), params.map_err(bad_query)) {
        (Ok(table), Ok(params)) => (table, params),
        (Err(e), _) | (_, Err(e)) => return failure(e),
    };
    let query = match parse_select(params) {
        Ok(q) => q,
        Err(e) => return failure(e),
    };

    match state.gateway.select(&table, &query).await {
        Ok(rows) => success(StatusCode::OK, rows),
        Err(e) => failure(e.into()),
    }
}

/// `POST /records/{table}` — encrypt and insert one row (object) or many (array).
pub async fn insert_records(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let rows = match (table_param(table), body.map_err(bad_body)) {
        (Ok(table), Ok(Json(body))) => rows_from_body(body).map(|rows| (table, rows)),
        (Err(e), _) | (_, Err(e)) => Err(e),
    };
    let (table, rows) = match rows {
        Ok(parsed) => parsed,
        Err(e) => return failure(e),
    };

    match state.gateway.insert(&table, rows).await {
        Ok(stored) => success(StatusCode::CREATED, stored),
        Err(e) => failure(e.into()),
    }
}

/// `PATCH /records/{table}?<col>=<value>` — encrypt the patch and update matching rows.
pub async fn update_records(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    matching: Result<Query<MatchCriteria>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (table, matching) = match scoped(table, matching) {
        Ok(scope) => scope,
        Err(e) => return failure(e),
    };
    let patch = match body.map_err(bad_body) {
        Ok(Json(Value::Object(map))) => map,
        Ok(_) => {
            return failure(ServiceError::BadRequest(
                "update body must be a JSON object".into(),
            ))
        }
        Err(e) => return failure(e),
    };

    match state.gateway.update(&table, &patch, &matching).await {
        Ok(updated) => success(StatusCode::OK, updated),
        Err(e) => failure(e.into()),
    }
}

/// `DELETE /records/{table}?<col>=<value>` — delete matching rows.
pub async fn delete_records(
    State(state): State<AppState>,
    table: Result<Path<String>, PathRejection>,
    matching: Result<Query<MatchCriteria>, QueryRejection>,
) -> Response {
    let (table, matching) = match scoped(table, matching) {
        Ok(scope) => scope,
        Err(e) => return failure(e),
    };

    match state.gateway.delete(&table, &matching).await {
        Ok(()) => success(StatusCode::OK, true),
        Err(e) => failure(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Operational routes
// ---------------------------------------------------------------------------

/// `GET /health` — liveness plus key configuration.
///
/// Always `200` while the process serves. The key check is advisory: a
/// fallback or short key only turns the status to `"degraded"`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let codec = state.gateway.codec();
    let key_configured = codec.keys().is_properly_configured();

    Json(HealthResponse {
        status: if key_configured { "ok" } else { "degraded" }.into(),
        key_configured,
        tables_registered: codec.registry().len(),
    })
}

/// `GET /encryption/status` — key source, configuration, strength, and registry.
pub async fn encryption_status(State(state): State<AppState>) -> Json<EncryptionStatus> {
    let codec = state.gateway.codec();
    let keys = codec.keys();
    Json(EncryptionStatus {
        key_source: keys.key().source().as_str().into(),
        key_configured: keys.is_properly_configured(),
        key_issues: keys
            .strength_issues()
            .iter()
            .map(ToString::to_string)
            .collect(),
        tables: codec.registry().as_map().clone(),
    })
}

/// `POST /encryption/self-test` — encrypt, detect, and decrypt a probe value.
pub async fn self_test(State(state): State<AppState>) -> Response {
    let report = state.gateway.codec().self_test();
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report)).into_response()
}

/// Query parameters for `POST /encryption/generate-key`.
#[derive(Debug, Deserialize)]
pub struct GenerateKeyParams {
    /// Key length in characters; defaults to [`MIN_KEY_CHARS`].
    pub length: Option<usize>,
}

/// `POST /encryption/generate-key` — a fresh random key for operators to install.
///
/// The key is not adopted by the running process and is never logged.
pub async fn generate_encryption_key(
    params: Result<Query<GenerateKeyParams>, QueryRejection>,
) -> Response {
    let length = match params.map_err(bad_query) {
        Ok(Query(p)) => p.length.unwrap_or(MIN_KEY_CHARS),
        Err(e) => return failure(e),
    };
    if !(MIN_KEY_CHARS..=MAX_GENERATED_KEY_CHARS).contains(&length) {
        return failure(ServiceError::BadRequest(format!(
            "length must be between {MIN_KEY_CHARS} and {MAX_GENERATED_KEY_CHARS}"
        )));
    }

    let key = generate_key(length);
    success(
        StatusCode::OK,
        GeneratedKey {
            key: key.as_str().to_owned(),
            length,
        },
    )
}

/// `GET /setup/tables` — probe every registered table in the remote store.
pub async fn setup_tables(State(state): State<AppState>) -> Response {
    let tables: Vec<String> = state
        .gateway
        .codec()
        .registry()
        .tables()
        .map(str::to_owned)
        .collect();
    let states = state.gateway.check_tables(tables).await;
    success(StatusCode::OK, states)
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(GatewayResponse::<()>::err(err)))
}

// ---------------------------------------------------------------------------
// Request parsing helpers
// ---------------------------------------------------------------------------

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(GatewayResponse::ok(data))).into_response()
}

fn failure(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(GatewayResponse::<()>::err(err.to_response()))).into_response()
}

fn bad_body(rejection: JsonRejection) -> ServiceError {
    ServiceError::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
}

fn bad_query(rejection: QueryRejection) -> ServiceError {
    ServiceError::BadRequest(format!("invalid query string: {}", rejection.body_text()))
}

fn table_param(table: Result<Path<String>, PathRejection>) -> Result<String, ServiceError> {
    let Path(table) = table
        .map_err(|e| ServiceError::BadRequest(format!("invalid path: {}", e.body_text())))?;
    validate_table(&table)?;
    Ok(table)
}

/// Table plus non-empty match criteria, as required by update and delete.
fn scoped(
    table: Result<Path<String>, PathRejection>,
    matching: Result<Query<MatchCriteria>, QueryRejection>,
) -> Result<(String, MatchCriteria), ServiceError> {
    let table = table_param(table)?;
    let Query(matching) = matching.map_err(bad_query)?;
    require_scope(&matching)?;
    Ok((table, matching))
}

/// Table names become URL path segments upstream, so only plain identifiers pass.
fn validate_table(table: &str) -> Result<(), ServiceError> {
    let valid = !table.is_empty()
        && table.len() <= MAX_TABLE_NAME_LEN
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("invalid table name: {table:?}")))
    }
}

fn require_scope(matching: &MatchCriteria) -> Result<(), ServiceError> {
    if matching.is_empty() {
        return Err(ServiceError::BadRequest(
            "at least one match parameter is required".into(),
        ));
    }
    Ok(())
}

fn parse_select(mut params: BTreeMap<String, String>) -> Result<SelectQuery, ServiceError> {
    let columns = params.remove("select");
    let limit = params
        .remove("limit")
        .map(|l| {
            l.parse::<usize>()
                .map_err(|_| ServiceError::BadRequest(format!("invalid limit: {l:?}")))
        })
        .transpose()?;
    let order = params.remove("order").map(|o| parse_order(&o)).transpose()?;

    Ok(SelectQuery {
        columns,
        filters: params,
        limit,
        order,
    })
}

fn parse_order(raw: &str) -> Result<Order, ServiceError> {
    let (column, ascending) = match raw.rsplit_once('.') {
        Some((column, "asc")) => (column, true),
        Some((column, "desc")) => (column, false),
        Some(_) => return Err(ServiceError::BadRequest(format!("invalid order: {raw:?}"))),
        None => (raw, true),
    };
    if column.is_empty() {
        return Err(ServiceError::BadRequest(format!("invalid order: {raw:?}")));
    }
    Ok(Order {
        column: column.to_owned(),
        ascending,
    })
}

fn rows_from_body(body: Value) -> Result<Vec<Record>, ServiceError> {
    let not_object = || ServiceError::BadRequest("rows must be JSON objects".into());
    match body {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) if !items.is_empty() => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(not_object()),
            })
            .collect(),
        Value::Array(_) => Err(ServiceError::BadRequest("no rows to insert".into())),
        _ => Err(not_object()),
    }
}
