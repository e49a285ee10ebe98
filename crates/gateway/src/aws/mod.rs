//! AWS SDK client initialisation for Secrets Manager.
//!
//! Used only at startup, and only when `ENCRYPTION_KEY_SECRET_ID` is set.

pub mod clients;

pub use clients::AwsClients;
