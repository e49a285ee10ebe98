//! Shared application state injected into every Axum handler.

use crate::gateway::Gateway;

/// Application state shared across all request handlers.
///
/// Cloned per request; the gateway's store, key, and registry are all behind
/// `Arc`s, so a clone copies no key material or records.
#[derive(Clone)]
pub struct AppState {
    /// Encryption-transparent access to the remote store.
    pub gateway: Gateway,
}

impl AppState {
    /// Create a new [`AppState`] around `gateway`.
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}
