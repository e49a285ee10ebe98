//! [`KeyProvider`]: the single process-wide encryption key and its checks.

use std::fmt;
use std::sync::Arc;

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use tracing::warn;
use zeroize::Zeroizing;

/// Passphrase used when no real key is configured, so local development keeps working.
pub const DEVELOPMENT_FALLBACK_KEY: &str = "dev-fallback-encryption-key-32-chars-long!";

/// Minimum key length, in characters, for a key to count as configured.
pub const MIN_KEY_CHARS: usize = 32;

/// Characters [`generate_key`] draws from.
pub const KEY_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()_+-=";

/// Where the active key was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `ENCRYPTION_KEY` environment variable.
    Environment,
    /// AWS Secrets Manager.
    SecretStore,
    /// The built-in development passphrase.
    DevelopmentFallback,
}

impl KeySource {
    /// Stable name used in status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Environment => "environment",
            KeySource::SecretStore => "secret_store",
            KeySource::DevelopmentFallback => "development_fallback",
        }
    }
}

/// The passphrase every field envelope is sealed under.
///
/// The secret is zeroed when dropped and never printed.
pub struct EncryptionKey {
    secret: Zeroizing<String>,
    source: KeySource,
}

impl EncryptionKey {
    /// Wrap `secret` resolved from `source`.
    pub fn new(secret: impl Into<String>, source: KeySource) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            source,
        }
    }

    /// Passphrase bytes fed to key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.secret.chars().count()
    }

    /// Where this key came from.
    pub fn source(&self) -> KeySource {
        self.source
    }

    fn expose(&self) -> &str {
        self.secret.as_str()
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("secret", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Read-only handle to the process key. Cheap to clone.
#[derive(Clone, Debug)]
pub struct KeyProvider {
    key: Arc<EncryptionKey>,
}

impl KeyProvider {
    /// Use `configured` when it is present and non-empty, otherwise the
    /// development fallback. Never fails.
    pub fn resolve(configured: Option<String>) -> Self {
        match configured.filter(|k| !k.trim().is_empty()) {
            Some(secret) => Self::from_key(EncryptionKey::new(secret, KeySource::Environment)),
            None => {
                warn!("no encryption key configured; using the development fallback key");
                Self::fallback()
            }
        }
    }

    /// Provider backed by the development fallback key.
    pub fn fallback() -> Self {
        Self::from_key(EncryptionKey::new(
            DEVELOPMENT_FALLBACK_KEY,
            KeySource::DevelopmentFallback,
        ))
    }

    /// Provider backed by an already-resolved key.
    pub fn from_key(key: EncryptionKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// The active key.
    pub fn key(&self) -> &EncryptionKey {
        &self.key
    }

    /// `true` only for a non-fallback key of at least [`MIN_KEY_CHARS`] characters.
    ///
    /// Advisory: nothing is blocked when this is `false`.
    pub fn is_properly_configured(&self) -> bool {
        self.key.source != KeySource::DevelopmentFallback
            && self.key.expose() != DEVELOPMENT_FALLBACK_KEY
            && self.key.char_len() >= MIN_KEY_CHARS
    }

    /// Strength findings for the active key.
    pub fn strength_issues(&self) -> Vec<KeyIssue> {
        validate_key_strength(self.key.expose())
    }
}

/// One advisory finding about a key's strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIssue {
    /// Fewer than [`MIN_KEY_CHARS`] characters.
    TooShort,
    /// No ASCII uppercase letter.
    NoUppercase,
    /// No ASCII lowercase letter.
    NoLowercase,
    /// No ASCII digit.
    NoDigit,
    /// No ASCII punctuation character.
    NoSpecial,
}

impl fmt::Display for KeyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIssue::TooShort => write!(f, "key must be at least {MIN_KEY_CHARS} characters long"),
            KeyIssue::NoUppercase => f.write_str("key should contain uppercase letters"),
            KeyIssue::NoLowercase => f.write_str("key should contain lowercase letters"),
            KeyIssue::NoDigit => f.write_str("key should contain numbers"),
            KeyIssue::NoSpecial => f.write_str("key should contain special characters"),
        }
    }
}

/// Check `key` against the length and character-class rules.
///
/// An empty result means the key passes every rule.
pub fn validate_key_strength(key: &str) -> Vec<KeyIssue> {
    let mut issues = Vec::new();
    if key.chars().count() < MIN_KEY_CHARS {
        issues.push(KeyIssue::TooShort);
    }
    if !key.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(KeyIssue::NoUppercase);
    }
    if !key.chars().any(|c| c.is_ascii_lowercase()) {
        issues.push(KeyIssue::NoLowercase);
    }
    if !key.chars().any(|c| c.is_ascii_digit()) {
        issues.push(KeyIssue::NoDigit);
    }
    if !key.chars().any(|c| c.is_ascii_punctuation()) {
        issues.push(KeyIssue::NoSpecial);
    }
    issues
}

/// Generate a random key of `len` characters from [`KEY_ALPHABET`] using the OS RNG.
///
/// Keys of at least [`MIN_KEY_CHARS`] are redrawn until they pass
/// [`validate_key_strength`].
pub fn generate_key(len: usize) -> Zeroizing<String> {
    loop {
        let key: Zeroizing<String> = Zeroizing::new(
            (0..len)
                .map(|_| KEY_ALPHABET[uniform_index(KEY_ALPHABET.len())] as char)
                .collect(),
        );
        if len < MIN_KEY_CHARS || validate_key_strength(&key).is_empty() {
            return key;
        }
    }
}

/// Unbiased index in `0..n` for `n <= 256`.
fn uniform_index(n: usize) -> usize {
    let zone = 256 - 256 % n;
    loop {
        let mut byte = [0u8; 1];
        OsRng.fill_bytes(&mut byte);
        let b = usize::from(byte[0]);
        if b < zone {
            return b % n;
        }
    }
}
