//! Shared value types for the capsule replication daemon.

mod error;
mod hash;
mod record;

pub use error::Error;
pub use hash::{Hash, HashParseError, HASH_LEN};
pub use record::{Metadatum, Record};
