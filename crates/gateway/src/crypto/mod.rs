//! AES-256-GCM-SIV envelope primitives for single field values.
//!
//! This module is free of HTTP and store dependencies.
//!
//! # Envelope format
//!
//! ```text
//! enc.v1.<base64url-no-pad(salt)>.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! ```
//!
//! The `enc.v1.` prefix is what [`looks_encrypted`] tests for, so detection
//! never needs the key.

pub mod cipher;

pub use cipher::{looks_encrypted, CipherError, Envelope, ENVELOPE_PREFIX};
