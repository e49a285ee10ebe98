//! [`PostgrestStore`]: [`RecordStore`] over a PostgREST HTTP API.
//!
//! Filters are sent as `column=eq.value`; writes ask for
//! `Prefer: return=representation` so the stored rows come back. Error bodies
//! have the PostgREST shape `{code, message, details, hint}`.

use async_trait::async_trait;
use bytes::Bytes;
use common::protocol::{MatchCriteria, Record, SelectQuery};
use http_body_util::{BodyExt, Full};
use hyper::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Request,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use tracing::debug;

use super::{RecordStore, StoreError};

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

/// Client for one PostgREST endpoint.
#[derive(Clone)]
pub struct PostgrestStore {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl PostgrestStore {
    /// Create a client for `base_url` (e.g. `https://<project>.supabase.co/rest/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the TLS configuration cannot be built.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| StoreError::Transport(format!("failed to configure TLS: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> String {
        let mut url = format!("{}/{}", self.base_url, encode_component(table));
        if !params.is_empty() {
            url.push('?');
            url.push_str(&query_string(params));
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        prefer: &str,
    ) -> Result<Bytes, StoreError> {
        debug!(method = %method, "sending store request");
        let req = Request::builder()
            .method(method)
            .uri(url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", prefer)
            .body(Full::new(body.map(Bytes::from).unwrap_or_default()))
            .map_err(|e| StoreError::Transport(format!("failed to build request: {e}")))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        if status.is_success() {
            Ok(body)
        } else {
            Err(decode_error(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Record>, StoreError> {
        let url = self.table_url(table, &select_params(query));
        let body = self.send(Method::GET, url, None, RETURN_REPRESENTATION).await?;
        decode_rows(&body)
    }

    async fn insert(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        let url = self.table_url(table, &[]);
        let payload = serde_json::to_vec(&rows).map_err(|e| StoreError::Decode(e.to_string()))?;
        let body = self
            .send(Method::POST, url, Some(payload), RETURN_REPRESENTATION)
            .await?;
        decode_rows(&body)
    }

    async fn update(
        &self,
        table: &str,
        patch: Record,
        matching: &MatchCriteria,
    ) -> Result<Vec<Record>, StoreError> {
        let url = self.table_url(table, &filter_params(matching));
        let payload = serde_json::to_vec(&patch).map_err(|e| StoreError::Decode(e.to_string()))?;
        let body = self
            .send(Method::PATCH, url, Some(payload), RETURN_REPRESENTATION)
            .await?;
        decode_rows(&body)
    }

    async fn delete(&self, table: &str, matching: &MatchCriteria) -> Result<(), StoreError> {
        let url = self.table_url(table, &filter_params(matching));
        self.send(Method::DELETE, url, None, RETURN_MINIMAL).await?;
        Ok(())
    }
}

fn filter_params(matching: &MatchCriteria) -> Vec<(String, String)> {
    matching
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{value}")))
        .collect()
}

fn select_params(query: &SelectQuery) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_owned(),
        query.columns.clone().unwrap_or_else(|| "*".into()),
    )];
    params.extend(filter_params(&query.filters));
    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".into(), format!("{}.{direction}", order.column)));
    }
    params
}

fn query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside RFC 3986 unreserved characters, keeping
/// `,` and `*` which PostgREST uses in `select` lists.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' | b'*' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn decode_rows(body: &[u8]) -> Result<Vec<Record>, StoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(body).map_err(|e| StoreError::Decode(e.to_string()))
}

fn decode_error(status: u16, body: &[u8]) -> StoreError {
    match serde_json::from_slice::<PostgrestError>(body) {
        Ok(err) => StoreError::Remote {
            status,
            code: err.code,
            message: err
                .message
                .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
        },
        Err(_) => StoreError::Remote {
            status,
            code: None,
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
