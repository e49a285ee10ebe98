//! The Gateway: wraps the store verbs with the field codec.
//!
//! Outbound records go through [`FieldCodec::encrypt_record`], inbound records
//! through [`FieldCodec::decrypt_record`]. Delete carries no field payload and
//! bypasses the codec.
//!
//! Each call is stateless. Remote failures are returned as values; the
//! gateway never retries and never distinguishes transient from permanent
//! failures. Encryption happens in memory before the network call, so a
//! failed call leaves nothing half-applied on the gateway side.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::protocol::{MatchCriteria, Record, SelectQuery, TableState};
use common::ServiceError;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::codec::FieldCodec;
use crate::crypto::CipherError;
use crate::store::{RecordStore, StoreError};

/// Errors returned by [`Gateway`] verbs.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An outbound field could not be encrypted; nothing was sent.
    #[error("failed to encrypt outbound record: {0}")]
    Encryption(#[from] CipherError),
}

impl GatewayError {
    /// `true` when the store reported that the table does not exist.
    pub fn is_missing_relation(&self) -> bool {
        matches!(self, GatewayError::Store(e) if e.is_missing_relation())
    }
}

impl From<GatewayError> for ServiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            e if e.is_missing_relation() => ServiceError::MissingRelation(e.to_string()),
            GatewayError::Store(e) => ServiceError::Upstream(e.to_string()),
            GatewayError::Encryption(e) => ServiceError::EncryptionFailure(e.to_string()),
        }
    }
}

/// Encryption-transparent access to the remote store.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn RecordStore>,
    codec: FieldCodec,
}

impl Gateway {
    /// Create a gateway over `store` using `codec`.
    pub fn new(store: Arc<dyn RecordStore>, codec: FieldCodec) -> Self {
        Self { store, codec }
    }

    /// The codec applied to every record.
    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    /// Read rows and decrypt their sensitive fields.
    ///
    /// Decryption is always attempted; rows whose fields cannot be opened are
    /// returned with those fields as stored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] if the remote read fails.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn select(
        &self,
        table: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Record>, GatewayError> {
        self.warn_encrypted_filters(table, &query.filters);
        let rows = self
            .store
            .select(table, query)
            .await
            .inspect_err(|e| warn!(error = %e, "store select failed"))?;
        Ok(self.decrypt_rows(table, &rows))
    }

    /// Encrypt and insert `rows`, returning the stored rows decrypted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Encryption`] before any network call if a field
    /// cannot be sealed, or [`GatewayError::Store`] if the insert fails.
    #[instrument(skip_all, fields(table = %table, rows = rows.len()))]
    pub async fn insert(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>, GatewayError> {
        let encrypted = rows
            .iter()
            .map(|row| self.codec.encrypt_record(table, row))
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self
            .store
            .insert(table, encrypted)
            .await
            .inspect_err(|e| warn!(error = %e, "store insert failed"))?;
        Ok(self.decrypt_rows(table, &stored))
    }

    /// Encrypt `patch` and apply it to rows matching `matching`, returning the
    /// updated rows decrypted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Encryption`] before any network call if a field
    /// cannot be sealed, or [`GatewayError::Store`] if the update fails.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn update(
        &self,
        table: &str,
        patch: &Record,
        matching: &MatchCriteria,
    ) -> Result<Vec<Record>, GatewayError> {
        self.warn_encrypted_filters(table, matching);
        let encrypted = self.codec.encrypt_record(table, patch)?;
        let updated = self
            .store
            .update(table, encrypted, matching)
            .await
            .inspect_err(|e| warn!(error = %e, "store update failed"))?;
        Ok(self.decrypt_rows(table, &updated))
    }

    /// Delete rows matching `matching`. No codec involvement.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] if the delete fails.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn delete(&self, table: &str, matching: &MatchCriteria) -> Result<(), GatewayError> {
        self.warn_encrypted_filters(table, matching);
        self.store
            .delete(table, matching)
            .await
            .inspect_err(|e| warn!(error = %e, "store delete failed"))?;
        Ok(())
    }

    /// Probe each table with a one-row read and report whether it is usable.
    pub async fn check_tables<I, S>(&self, tables: I) -> BTreeMap<String, TableState>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let probe = SelectQuery::all().limit(1);
        let mut out = BTreeMap::new();
        for table in tables {
            let table = table.as_ref();
            let state = match self.store.select(table, &probe).await {
                Ok(_) => TableState::Ready,
                Err(e) if e.is_missing_relation() => TableState::Missing,
                Err(e) => {
                    warn!(table, error = %e, "table probe failed");
                    TableState::Unreachable
                }
            };
            out.insert(table.to_owned(), state);
        }
        info!(tables = out.len(), "table setup check complete");
        out
    }

    /// Filter columns of `table` that hold envelopes.
    ///
    /// Every envelope carries a random salt and nonce, so an equality filter on
    /// one of these columns never matches a stored row.
    pub fn encrypted_filter_columns<'a>(
        &self,
        table: &str,
        filters: &'a MatchCriteria,
    ) -> Vec<&'a str> {
        filters
            .keys()
            .filter(|column| self.codec.registry().is_sensitive(table, column))
            .map(String::as_str)
            .collect()
    }

    fn warn_encrypted_filters(&self, table: &str, filters: &MatchCriteria) {
        for column in self.encrypted_filter_columns(table, filters) {
            warn!(column, "filter on an encrypted column cannot match stored rows");
        }
    }

    fn decrypt_rows(&self, table: &str, rows: &[Record]) -> Vec<Record> {
        rows.iter()
            .map(|row| self.codec.decrypt_record(table, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::looks_encrypted;
    use crate::key::{EncryptionKey, KeyProvider, KeySource};
    use crate::registry::SensitiveFieldRegistry;
    use crate::store::MockRecordStore;
    use serde_json::{json, Value};

    fn codec() -> FieldCodec {
        FieldCodec::new(
            KeyProvider::from_key(EncryptionKey::new(
                "9cD4tX!q7Yz*P0Lm$2aBvW#r5NfGhJ8k",
                KeySource::Environment,
            )),
            Arc::new(SensitiveFieldRegistry::builtin()),
        )
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn gateway(store: MockRecordStore) -> Gateway {
        Gateway::new(Arc::new(store), codec())
    }

    #[tokio::test]
    async fn insert_encrypts_outbound_and_decrypts_echo() {
        let mut store = MockRecordStore::new();
        store.expect_insert().times(1).returning(|table, rows| {
            assert_eq!(table, "cases");
            let sent = rows[0]["case_details"].as_str().unwrap();
            assert!(looks_encrypted(sent), "sent plaintext: {sent}");
            Ok(rows)
        });

        let out = gateway(store)
            .insert("cases", vec![record(json!({"case_details": "confidential note"}))])
            .await
            .unwrap();
        assert_eq!(out[0]["case_details"], "confidential note");
    }

    #[tokio::test]
    async fn select_decrypts_every_row() {
        let codec = codec();
        let stored: Vec<Record> = ["Arun Kumar", "Priya S"]
            .iter()
            .map(|name| {
                codec
                    .encrypt_record("criminal_records", &record(json!({"name": name, "case_id": "TN-001"})))
                    .unwrap()
            })
            .collect();

        let mut store = MockRecordStore::new();
        store
            .expect_select()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));

        let rows = gateway(store)
            .select("criminal_records", &SelectQuery::all())
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], "Arun Kumar");
        assert_eq!(rows[1]["name"], "Priya S");
        assert_eq!(rows[1]["case_id"], "TN-001");
    }

    #[tokio::test]
    async fn select_on_missing_table_reports_missing_relation() {
        let mut store = MockRecordStore::new();
        store
            .expect_select()
            .returning(|table, _| Err(StoreError::missing_relation(table)));

        let err = gateway(store)
            .select("no_such_table", &SelectQuery::all())
            .await
            .unwrap_err();
        assert!(err.is_missing_relation());
        assert!(matches!(
            ServiceError::from(err),
            ServiceError::MissingRelation(_)
        ));
    }

    #[tokio::test]
    async fn update_encrypts_patch_and_passes_match() {
        let mut store = MockRecordStore::new();
        store.expect_update().times(1).returning(|_, patch, matching| {
            assert_eq!(matching.get("id").map(String::as_str), Some("7"));
            assert!(looks_encrypted(patch["bio"].as_str().unwrap()));
            assert_eq!(patch["status"], "wanted");
            let mut row = patch;
            row.insert("id".into(), json!(7));
            Ok(vec![row])
        });

        let mut matching = MatchCriteria::new();
        matching.insert("id".into(), "7".into());
        let out = gateway(store)
            .update(
                "criminal_records",
                &record(json!({"bio": "known forger", "status": "wanted"})),
                &matching,
            )
            .await
            .unwrap();
        assert_eq!(out[0]["bio"], "known forger");
        assert_eq!(out[0]["id"], 7);
    }

    #[tokio::test]
    async fn delete_passes_through() {
        let mut store = MockRecordStore::new();
        store.expect_delete().times(1).returning(|table, matching| {
            assert_eq!(table, "cases");
            assert_eq!(matching.len(), 1);
            Ok(())
        });

        let mut matching = MatchCriteria::new();
        matching.insert("case_id".into(), "FRA-2024-001".into());
        gateway(store).delete("cases", &matching).await.unwrap();
    }

    #[tokio::test]
    async fn remote_failure_is_returned_not_retried() {
        let mut store = MockRecordStore::new();
        store.expect_insert().times(1).returning(|_, _| {
            Err(StoreError::Remote {
                status: 401,
                code: Some("42501".into()),
                message: "permission denied".into(),
            })
        });

        let err = gateway(store)
            .insert("users", vec![record(json!({"email": "a@example.com"}))])
            .await
            .unwrap_err();
        assert!(!err.is_missing_relation());
        assert!(matches!(ServiceError::from(err), ServiceError::Upstream(_)));
    }

    #[test]
    fn filters_on_encrypted_columns_are_detected() {
        let gateway = gateway(MockRecordStore::new());
        let mut filters = MatchCriteria::new();
        filters.insert("case_id".into(), "TN-001".into());
        filters.insert("name".into(), "Arun Kumar".into());
        assert_eq!(
            gateway.encrypted_filter_columns("criminal_records", &filters),
            vec!["name"]
        );
        assert!(gateway
            .encrypted_filter_columns("police_officers", &filters)
            .is_empty());
    }

    #[tokio::test]
    async fn select_with_encrypted_filter_still_reaches_store() {
        let mut store = MockRecordStore::new();
        store.expect_select().times(1).returning(|_, _| Ok(Vec::new()));
        let rows = gateway(store)
            .select(
                "criminal_records",
                &SelectQuery::all().filter("name", "Arun Kumar"),
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn check_tables_classifies_each_table() {
        let mut store = MockRecordStore::new();
        store.expect_select().returning(|table, query| {
            assert_eq!(query.limit, Some(1));
            match table {
                "cases" => Ok(Vec::new()),
                "users" => Err(StoreError::missing_relation(table)),
                _ => Err(StoreError::Transport("connection refused".into())),
            }
        });

        let states = gateway(store)
            .check_tables(["cases", "users", "criminal_records"])
            .await;
        assert_eq!(states["cases"], TableState::Ready);
        assert_eq!(states["users"], TableState::Missing);
        assert_eq!(states["criminal_records"], TableState::Unreachable);
    }
}
