//! Record types, wire envelopes, and errors shared across the record vault crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
pub use protocol::{MatchCriteria, Record, SelectQuery};
