//! AES-256-GCM-SIV sealing and opening of individual field values.
//!
//! Every value gets its own random salt and nonce. The AES key for a value is
//! derived from the process passphrase with HKDF-SHA256 over that salt, so an
//! envelope carries everything needed to open it except the passphrase.

use std::str::FromStr;

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Byte length of a derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the per-value HKDF salt.
pub const SALT_LEN: usize = 16;

/// Byte length of the AEAD authentication tag appended to the ciphertext.
const TAG_LEN: usize = 16;

/// Marker at the start of every envelope string.
pub const ENVELOPE_PREFIX: &str = "enc.v1.";

const HKDF_INFO: &[u8] = b"record-vault/field/v1";

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The envelope string does not match `enc.v1.<salt>.<nonce>.<ciphertext>`.
    #[error("invalid envelope format")]
    InvalidFormat,

    /// HKDF could not produce a key of the requested length.
    #[error("key derivation failed")]
    KeyDerivation,

    /// AES-GCM-SIV sealing or opening failed (wrong key or tampered data).
    #[error("aead operation failed")]
    AeadFailure,

    /// The opened plaintext is not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    NotUtf8,
}

/// A parsed ciphertext envelope for one field value.
///
/// The string form is
/// `enc.v1.<base64url(salt)>.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// HKDF salt used to derive this value's key.
    pub salt: [u8; SALT_LEN],
    /// AEAD nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext followed by the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this envelope to its canonical string representation.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}{}.{}.{}",
            ENVELOPE_PREFIX,
            URL_SAFE_NO_PAD.encode(self.salt),
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }
}

impl FromStr for Envelope {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or(CipherError::InvalidFormat)?;
        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 3 {
            return Err(CipherError::InvalidFormat);
        }

        let salt = decode_fixed::<SALT_LEN>(parts[0])?;
        let nonce = decode_fixed::<NONCE_LEN>(parts[1])?;
        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::InvalidFormat)?;
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::InvalidFormat);
        }

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

fn decode_fixed<const N: usize>(part: &str) -> Result<[u8; N], CipherError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| CipherError::InvalidFormat)?;
    bytes.try_into().map_err(|_| CipherError::InvalidFormat)
}

/// Key-independent check for the envelope marker.
///
/// Only the prefix is inspected; a value that carries the marker but is not a
/// real envelope is caught later when opening it fails.
pub fn looks_encrypted(value: &str) -> bool {
    value.starts_with(ENVELOPE_PREFIX)
}

/// Seal `plaintext` under `passphrase` with a fresh salt and nonce.
///
/// # Errors
///
/// Returns [`CipherError::KeyDerivation`] or [`CipherError::AeadFailure`] on
/// internal failures; neither is expected with a non-empty passphrase.
pub fn seal(plaintext: &[u8], passphrase: &[u8]) -> Result<Envelope, CipherError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = build_cipher(passphrase, &salt)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    Ok(Envelope {
        salt,
        nonce,
        ciphertext,
    })
}

/// Open an [`Envelope`] with `passphrase`.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong
/// passphrase or tampered envelope).
pub fn open(envelope: &Envelope, passphrase: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(passphrase, &envelope.salt)?;
    cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_ref(),
        )
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Result<Aes256GcmSiv, CipherError> {
    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), passphrase);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(HKDF_INFO, &mut okm[..])
        .map_err(|_| CipherError::KeyDerivation)?;
    Aes256GcmSiv::new_from_slice(&okm[..]).map_err(|_| CipherError::KeyDerivation)
}
