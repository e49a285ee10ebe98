//! Loading a [`SensitiveFieldRegistry`] from a YAML or JSON file.
//!
//! File shape:
//!
//! ```yaml
//! criminal_records: [name, phone_number, email]
//! cases: [case_details]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::SensitiveFieldRegistry;

/// Errors from registry loading.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file could not be read.
    #[error("failed to read sensitive field file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The contents are neither a valid YAML nor a valid JSON table map.
    #[error("sensitive field file {0} is not a valid YAML or JSON table map")]
    Parse(String),

    /// A table or field name is empty.
    #[error("sensitive field file {0} contains an empty table or field name")]
    EmptyName(String),
}

/// Read and parse the registry file at `path`.
///
/// # Errors
///
/// Returns [`RegistryError`] if the file is unreadable, unparsable, or names
/// an empty table or field.
pub fn load_file(path: impl AsRef<Path>) -> Result<SensitiveFieldRegistry, RegistryError> {
    let path = path.as_ref();
    let path_display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path_display.clone(),
        source,
    })?;

    let registry = parse(&text, &path_display)?;
    info!(path = %path_display, tables = registry.len(), "loaded sensitive field registry");
    Ok(registry)
}

/// Parse registry text as YAML, falling back to JSON.
fn parse(text: &str, origin: &str) -> Result<SensitiveFieldRegistry, RegistryError> {
    let map: BTreeMap<String, Vec<String>> = if let Ok(parsed) = serde_yaml::from_str(text) {
        parsed
    } else if let Ok(parsed) = serde_json::from_str(text) {
        parsed
    } else {
        return Err(RegistryError::Parse(origin.to_owned()));
    };

    let has_empty = map
        .iter()
        .any(|(table, fields)| table.trim().is_empty() || fields.iter().any(|f| f.trim().is_empty()));
    if has_empty {
        return Err(RegistryError::EmptyName(origin.to_owned()));
    }

    Ok(SensitiveFieldRegistry::from_tables(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml() {
        let reg = parse(
            "criminal_records: [name, phone_number, email]\ncases:\n  - case_details\n",
            "test",
        )
        .unwrap();
        assert_eq!(reg.fields("criminal_records"), ["name", "phone_number", "email"]);
        assert_eq!(reg.fields("cases"), ["case_details"]);
    }

    #[test]
    fn parses_json() {
        let reg = parse(r#"{"users": ["email", "email", "address"]}"#, "test").unwrap();
        assert_eq!(reg.fields("users"), ["email", "address"]);
    }

    #[test]
    fn rejects_non_map() {
        assert!(matches!(
            parse("- just\n- a list\n", "test"),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_field_name() {
        assert!(matches!(
            parse(r#"{"users": [""]}"#, "test"),
            Err(RegistryError::EmptyName(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_file("/nonexistent/sensitive-fields.yaml"),
            Err(RegistryError::Io { .. })
        ));
    }
}
