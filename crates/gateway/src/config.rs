//! Configuration loading and validation for the gateway service.
//!
//! All values are read from environment variables at startup. The process
//! exits with a clear error message if a required variable is missing or
//! invalid. A missing encryption key is not an error: the key provider falls
//! back and warns instead.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the PostgREST API, e.g. `https://<project>.supabase.co/rest/v1`.
    /// **Required.**
    pub store_url: String,

    /// API key sent as `apikey` and bearer token to the store. **Required.**
    pub store_api_key: String,

    /// Encryption passphrase. Falls back to a development key when absent.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Secrets Manager id or ARN holding the passphrase as a secret string.
    #[serde(default)]
    pub encryption_key_secret_id: Option<String>,

    /// Endpoint override for the AWS SDK (local emulators).
    #[serde(default)]
    pub aws_endpoint_url: Option<String>,

    /// YAML or JSON file mapping table names to sensitive field lists.
    /// The built-in registry is used when absent.
    #[serde(default)]
    pub sensitive_fields_path: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// OTLP endpoint for trace export. Export is disabled when absent.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.store_url, "STORE_URL")?;
        ensure_non_empty(&self.store_api_key, "STORE_API_KEY")?;

        if !(self.store_url.starts_with("https://") || self.store_url.starts_with("http://")) {
            anyhow::bail!("STORE_URL must be an http:// or https:// URL");
        }
        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        if let Some(path) = &self.sensitive_fields_path {
            ensure_non_empty(path, "SENSITIVE_FIELDS_PATH")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
