//! Field Codec: encrypts and decrypts the registered sensitive fields of a record.
//!
//! Encryption is idempotent: values that already carry the envelope marker are
//! left alone. Decryption fails open: [`FieldCodec::decrypt_field`] returns its
//! input unchanged when a value cannot be opened, so partially migrated or
//! foreign-keyed rows still render. Callers that need to tell the two apart
//! use [`FieldCodec::try_decrypt_field`].

use std::sync::Arc;

use common::protocol::{Record, SelfTestResponse};
use serde_json::Value;
use tracing::debug;

use crate::crypto::cipher::{self, looks_encrypted, CipherError, Envelope};
use crate::key::KeyProvider;
use crate::registry::SensitiveFieldRegistry;

const SELF_TEST_PROBE: &str = "record vault self-test probe";

/// Applies the envelope cipher to the sensitive fields of records.
///
/// Cheap to clone; the key and registry are shared read-only.
#[derive(Clone, Debug)]
pub struct FieldCodec {
    keys: KeyProvider,
    registry: Arc<SensitiveFieldRegistry>,
}

impl FieldCodec {
    /// Create a codec over `keys` and `registry`.
    pub fn new(keys: KeyProvider, registry: Arc<SensitiveFieldRegistry>) -> Self {
        Self { keys, registry }
    }

    /// The key provider this codec seals under.
    pub fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    /// The registry this codec consults.
    pub fn registry(&self) -> &SensitiveFieldRegistry {
        &self.registry
    }

    /// Encrypt one value.
    ///
    /// Empty values and values that already look encrypted are returned
    /// unchanged, so encrypting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if sealing fails.
    pub fn encrypt_field(&self, value: &str) -> Result<String, CipherError> {
        if value.is_empty() || looks_encrypted(value) {
            return Ok(value.to_owned());
        }
        let envelope = cipher::seal(value.as_bytes(), self.keys.key().as_bytes())?;
        Ok(envelope.to_string_repr())
    }

    /// Decrypt one value, reporting why it could not be opened.
    ///
    /// Empty values and values without the envelope marker are returned
    /// unchanged as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] for a malformed envelope, a failed
    /// authentication (wrong key or tampering), or non-UTF-8 plaintext.
    pub fn try_decrypt_field(&self, value: &str) -> Result<String, CipherError> {
        if value.is_empty() || !looks_encrypted(value) {
            return Ok(value.to_owned());
        }
        let envelope: Envelope = value.parse()?;
        let plaintext = cipher::open(&envelope, self.keys.key().as_bytes())?;
        String::from_utf8(plaintext).map_err(|_| CipherError::NotUtf8)
    }

    /// Decrypt one value, returning the input unchanged on any failure.
    pub fn decrypt_field(&self, value: &str) -> String {
        match self.try_decrypt_field(value) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!(error = %e, "field left as stored: decryption failed");
                value.to_owned()
            }
        }
    }

    /// [`encrypt_field`](Self::encrypt_field) lifted to JSON values.
    /// Null and non-string values pass through.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if sealing fails.
    pub fn encrypt_value(&self, value: &Value) -> Result<Value, CipherError> {
        match value {
            Value::String(s) => Ok(Value::String(self.encrypt_field(s)?)),
            other => Ok(other.clone()),
        }
    }

    /// [`decrypt_field`](Self::decrypt_field) lifted to JSON values.
    /// Null and non-string values pass through.
    pub fn decrypt_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.decrypt_field(s)),
            other => other.clone(),
        }
    }

    /// Return a copy of `record` with the sensitive fields of `table` encrypted.
    ///
    /// Only registered fields holding non-empty strings change; `record` itself
    /// is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if sealing any field fails.
    pub fn encrypt_record(&self, table: &str, record: &Record) -> Result<Record, CipherError> {
        let mut out = record.clone();
        for field in self.registry.fields(table) {
            if let Some(Value::String(s)) = record.get(field) {
                if !s.is_empty() {
                    out.insert(field.clone(), Value::String(self.encrypt_field(s)?));
                }
            }
        }
        Ok(out)
    }

    /// Return a copy of `record` with the sensitive fields of `table` decrypted.
    ///
    /// Fields that cannot be opened keep their stored value; `record` itself is
    /// not modified.
    pub fn decrypt_record(&self, table: &str, record: &Record) -> Record {
        let mut out = record.clone();
        for field in self.registry.fields(table) {
            if let Some(Value::String(s)) = record.get(field) {
                if looks_encrypted(s) {
                    match self.try_decrypt_field(s) {
                        Ok(plaintext) => {
                            out.insert(field.clone(), Value::String(plaintext));
                        }
                        Err(e) => {
                            debug!(table, field = %field, error = %e, "field left as stored: decryption failed");
                        }
                    }
                }
            }
        }
        out
    }

    /// Encrypt a probe, check it carries the envelope marker, and decrypt it back.
    pub fn self_test(&self) -> SelfTestResponse {
        let encrypted = match self.encrypt_field(SELF_TEST_PROBE) {
            Ok(e) => e,
            Err(e) => return failed(format!("encryption failed: {e}")),
        };
        if !looks_encrypted(&encrypted) {
            return failed("encryption failed: output is not an envelope".into());
        }
        match self.try_decrypt_field(&encrypted) {
            Ok(plaintext) if plaintext == SELF_TEST_PROBE => SelfTestResponse {
                success: true,
                message: "encryption self-test passed".into(),
            },
            Ok(_) => failed("decryption failed: output mismatch".into()),
            Err(e) => failed(format!("decryption failed: {e}")),
        }
    }
}

fn failed(message: String) -> SelfTestResponse {
    SelfTestResponse {
        success: false,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{EncryptionKey, KeySource};
    use serde_json::json;

    const KEY: &str = "9cD4tX!q7Yz*P0Lm$2aBvW#r5NfGhJ8k";

    fn codec_with_key(key: &str) -> FieldCodec {
        let registry = SensitiveFieldRegistry::from_tables([(
            "criminal_records",
            vec!["name", "phone_number", "email"],
        )]);
        FieldCodec::new(
            KeyProvider::from_key(EncryptionKey::new(key, KeySource::Environment)),
            Arc::new(registry),
        )
    }

    fn codec() -> FieldCodec {
        codec_with_key(KEY)
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn encrypt_is_idempotent() {
        let codec = codec();
        for s in ["Arun Kumar", "9876543210", "a", "ünïcødé ✓"] {
            let once = codec.encrypt_field(s).unwrap();
            let twice = codec.encrypt_field(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let codec = codec();
        for s in ["Arun Kumar", "line one\nline two", "ünïcødé ✓", "enc"] {
            let encrypted = codec.encrypt_field(s).unwrap();
            assert_ne!(encrypted, s);
            assert_eq!(codec.decrypt_field(&encrypted), s);
        }
    }

    #[test]
    fn same_plaintext_gives_distinct_envelopes() {
        let codec = codec();
        let a = codec.encrypt_field("same").unwrap();
        let b = codec.encrypt_field("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_passes_through() {
        let codec = codec();
        assert_eq!(codec.encrypt_field("").unwrap(), "");
        assert_eq!(codec.decrypt_field(""), "");
    }

    #[test]
    fn null_passes_through() {
        let codec = codec();
        assert_eq!(codec.encrypt_value(&Value::Null).unwrap(), Value::Null);
        assert_eq!(codec.decrypt_value(&Value::Null), Value::Null);
    }

    #[test]
    fn plaintext_is_not_decrypted() {
        let codec = codec();
        assert_eq!(codec.decrypt_field("Arun Kumar"), "Arun Kumar");
        assert_eq!(codec.try_decrypt_field("Arun Kumar").unwrap(), "Arun Kumar");
    }

    #[test]
    fn fake_envelope_fails_open() {
        let codec = codec();
        let fake = "enc.v1.not-real-ciphertext-but-matches-prefix";
        assert_eq!(codec.decrypt_field(fake), fake);
        assert!(codec.try_decrypt_field(fake).is_err());
    }

    #[test]
    fn wrong_key_fails_open() {
        let encrypted = codec().encrypt_field("secret").unwrap();
        let other = codec_with_key("a-completely-different-key-of-32+chars");
        assert!(matches!(
            other.try_decrypt_field(&encrypted),
            Err(CipherError::AeadFailure)
        ));
        assert_eq!(other.decrypt_field(&encrypted), encrypted);
    }

    #[test]
    fn record_scenario_round_trips() {
        let codec = codec();
        let input = record(json!({
            "name": "Arun Kumar",
            "case_id": "TN-001",
            "phone_number": "9876543210"
        }));

        let encrypted = codec.encrypt_record("criminal_records", &input).unwrap();
        assert_eq!(encrypted["case_id"], "TN-001");
        for field in ["name", "phone_number"] {
            let v = encrypted[field].as_str().unwrap();
            assert!(looks_encrypted(v));
            assert_ne!(v, input[field].as_str().unwrap());
        }

        let decrypted = codec.decrypt_record("criminal_records", &encrypted);
        assert_eq!(decrypted, input);
    }

    #[test]
    fn encrypt_record_is_selective() {
        let codec = codec();
        let input = record(json!({
            "name": "",
            "email": null,
            "phone_number": 9876543210u64,
            "city": "Chennai",
            "id": 7
        }));
        let encrypted = codec.encrypt_record("criminal_records", &input).unwrap();
        // empty, null, and non-string sensitive values are untouched; so are
        // fields outside the registry.
        assert_eq!(encrypted, input);
    }

    #[test]
    fn unknown_table_is_untouched() {
        let codec = codec();
        let input = record(json!({"name": "Officer Ravi"}));
        let encrypted = codec.encrypt_record("police_officers", &input).unwrap();
        assert_eq!(encrypted, input);
    }

    #[test]
    fn records_are_not_mutated() {
        let codec = codec();
        let input = record(json!({"name": "Arun Kumar", "email": "arun@example.com"}));
        let snapshot = input.clone();
        let encrypted = codec.encrypt_record("criminal_records", &input).unwrap();
        assert_eq!(input, snapshot);

        let encrypted_snapshot = encrypted.clone();
        let _ = codec.decrypt_record("criminal_records", &encrypted);
        assert_eq!(encrypted, encrypted_snapshot);
    }

    #[test]
    fn decrypt_record_keeps_undecryptable_fields() {
        let codec = codec();
        let input = record(json!({"name": "enc.v1.garbage", "email": "plain@example.com"}));
        assert_eq!(codec.decrypt_record("criminal_records", &input), input);
    }

    #[test]
    fn self_test_passes() {
        let report = codec().self_test();
        assert!(report.success, "{}", report.message);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const TABLE: &str = "criminal_records";
        const COLUMNS: [&str; 5] = ["name", "phone_number", "email", "city", "id"];

        fn value_strategy() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::from),
                Just(Value::String(String::new())),
                any::<String>().prop_map(Value::String),
            ]
        }

        fn record_strategy() -> impl Strategy<Value = Record> {
            prop::collection::btree_map(
                prop::sample::select(COLUMNS.to_vec()),
                value_strategy(),
                0..COLUMNS.len(),
            )
            .prop_map(|m| m.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn encrypt_field_is_idempotent(s in any::<String>()) {
                let codec = codec();
                let once = codec.encrypt_field(&s).unwrap();
                let twice = codec.encrypt_field(&once).unwrap();
                prop_assert_eq!(twice, once);
            }

            #[test]
            fn decrypt_inverts_encrypt(s in any::<String>()) {
                let codec = codec();
                let encrypted = codec.encrypt_field(&s).unwrap();
                prop_assert_eq!(codec.decrypt_field(&encrypted), s);
            }

            #[test]
            fn encrypt_record_touches_only_registered_strings(input in record_strategy()) {
                let codec = codec();
                let snapshot = input.clone();
                let encrypted = codec.encrypt_record(TABLE, &input).unwrap();

                prop_assert_eq!(&input, &snapshot);
                prop_assert_eq!(encrypted.len(), input.len());
                for (column, original) in &input {
                    let out = &encrypted[column.as_str()];
                    let registered = codec.registry().is_sensitive(TABLE, column);
                    match original {
                        Value::String(s) if registered && !s.is_empty() && !looks_encrypted(s) => {
                            let sealed = out.as_str().unwrap();
                            prop_assert!(looks_encrypted(sealed));
                            prop_assert_eq!(&codec.decrypt_field(sealed), s);
                        }
                        _ => prop_assert_eq!(out, original),
                    }
                }

                prop_assert_eq!(codec.decrypt_record(TABLE, &encrypted), input);
            }
        }
    }
}
