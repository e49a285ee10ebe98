//! Key Provider: resolves the single encryption key once at startup.
//!
//! # Lifecycle
//!
//! 1. [`load`] tries `ENCRYPTION_KEY`, then the AWS Secrets Manager secret
//!    named by `ENCRYPTION_KEY_SECRET_ID`, then the development fallback.
//! 2. The resolved [`EncryptionKey`] lives only in process memory behind an
//!    `Arc` and is immutable until the process exits. There is no rotation.
//!
//! # Security invariants
//!
//! - The key is **never** logged, traced, or returned by any endpoint.
//! - Resolution never fails: a misconfigured key only produces warnings and
//!   a `false` from [`KeyProvider::is_properly_configured`].

pub mod provider;

pub use provider::{
    generate_key, validate_key_strength, EncryptionKey, KeyIssue, KeyProvider, KeySource,
    DEVELOPMENT_FALLBACK_KEY, KEY_ALPHABET, MIN_KEY_CHARS,
};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aws::AwsClients;
use crate::config::Config;

/// Resolve the process key from configuration, then the secret store, then
/// the fallback.
pub async fn load(cfg: &Config) -> KeyProvider {
    let configured = cfg
        .encryption_key
        .clone()
        .filter(|k| !k.trim().is_empty());

    let provider = match (configured, cfg.encryption_key_secret_id.as_deref()) {
        (Some(secret), _) => {
            info!(source = KeySource::Environment.as_str(), "encryption key resolved");
            KeyProvider::from_key(EncryptionKey::new(secret, KeySource::Environment))
        }
        (None, Some(secret_id)) => match fetch_from_secret_store(cfg, secret_id).await {
            Ok(secret) => {
                info!(source = KeySource::SecretStore.as_str(), "encryption key resolved");
                KeyProvider::from_key(EncryptionKey::new(secret, KeySource::SecretStore))
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch encryption key from secret store");
                KeyProvider::resolve(None)
            }
        },
        (None, None) => KeyProvider::resolve(None),
    };

    if !provider.is_properly_configured() {
        warn!(
            min_chars = MIN_KEY_CHARS,
            "encryption key is not properly configured; data is protected by a weak or shared key"
        );
    }
    for issue in provider.strength_issues() {
        warn!(issue = %issue, "encryption key strength");
    }

    provider
}

/// Fetch the key passphrase stored as a secret string in AWS Secrets Manager.
///
/// # Errors
///
/// Returns an error if the SDK cannot be initialised, the call fails, or the
/// secret has no string value.
async fn fetch_from_secret_store(cfg: &Config, secret_id: &str) -> Result<String> {
    let aws = AwsClients::init(cfg.aws_endpoint_url.as_deref()).await?;
    let secret = aws
        .secretsmanager
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .context("failed to fetch encryption key from Secrets Manager")?;

    let value = secret
        .secret_string()
        .context("encryption key secret must be stored as a string")?;
    if value.trim().is_empty() {
        anyhow::bail!("encryption key secret is empty");
    }
    Ok(value.to_owned())
}
