//! Sensitive-field registry: which fields of which tables are encrypted at rest.
//!
//! # Module invariants
//!
//! - **Immutable after construction.** The registry is built once at startup
//!   and shared behind an `Arc`; nothing mutates it afterwards.
//! - Fields not listed for a table are never transformed.
//! - **No crypto dependencies.** This module must not import `crate::crypto`.

pub mod loader;

pub use loader::{load_file, RegistryError};

use std::collections::BTreeMap;

/// Table name → ordered, de-duplicated list of sensitive field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveFieldRegistry {
    tables: BTreeMap<String, Vec<String>>,
}

impl SensitiveFieldRegistry {
    /// Build a registry from `(table, fields)` pairs.
    ///
    /// Field order is kept; repeated fields keep their first position. Lists
    /// for the same table are merged.
    pub fn from_tables<T, F, S>(tables: T) -> Self
    where
        T: IntoIterator<Item = (S, F)>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (table, fields) in tables {
            let entry = out.entry(table.into()).or_default();
            for field in fields {
                let field = field.into();
                if !entry.contains(&field) {
                    entry.push(field);
                }
            }
        }
        Self { tables: out }
    }

    /// The registry used when no file is configured.
    pub fn builtin() -> Self {
        Self::from_tables([
            (
                "criminal_records",
                vec![
                    "name",
                    "phone_number",
                    "email",
                    "address",
                    "address_line",
                    "city",
                    "state",
                    "country",
                    "nationality",
                    "bio",
                    "modus_operandi",
                    "tools_used",
                    "associates",
                    "connected_criminals",
                    "known_associates",
                    "case_progress_timeline",
                    "last_location",
                ],
            ),
            (
                "cases",
                vec![
                    "case_details",
                    "victim_name",
                    "victim_statement",
                    "witness_statements",
                    "officer_notes",
                ],
            ),
            ("users", vec!["email", "phone_number", "address"]),
        ])
    }

    /// Sensitive fields for `table`; empty for unknown tables.
    pub fn fields(&self, table: &str) -> &[String] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `field` of `table` is encrypted at rest.
    pub fn is_sensitive(&self, table: &str, field: &str) -> bool {
        self.fields(table).iter().any(|f| f == field)
    }

    /// Names of all registered tables, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// `true` if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Full mapping, for status output.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_expected_tables() {
        let reg = SensitiveFieldRegistry::builtin();
        assert_eq!(
            reg.tables().collect::<Vec<_>>(),
            vec!["cases", "criminal_records", "users"]
        );
        assert_eq!(reg.fields("criminal_records").len(), 17);
        assert!(reg.is_sensitive("cases", "case_details"));
    }

    #[test]
    fn unknown_table_has_no_fields() {
        let reg = SensitiveFieldRegistry::builtin();
        assert!(reg.fields("police_officers").is_empty());
        assert!(!reg.is_sensitive("police_officers", "name"));
    }

    #[test]
    fn case_id_is_not_sensitive() {
        let reg = SensitiveFieldRegistry::builtin();
        assert!(!reg.is_sensitive("criminal_records", "case_id"));
    }

    #[test]
    fn from_tables_dedups_and_keeps_order() {
        let reg = SensitiveFieldRegistry::from_tables([
            ("t", vec!["b", "a", "b"]),
            ("t", vec!["c", "a"]),
        ]);
        assert_eq!(reg.fields("t"), ["b", "a", "c"]);
        assert_eq!(reg.len(), 1);
    }
}
