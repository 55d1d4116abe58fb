//! LogStore: append/lookup/scan over persisted capsule records.
//!
//! Reads are point-in-time snapshots of whatever has already been
//! committed. Writes commit atomically per call, and are idempotent on
//! hash collision: inserting a record whose hash is already present is a
//! silent no-op, not an error (primary key conflict ignored, per the
//! on-disk schema's `ON CONFLICT IGNORE`).

mod stores;

use capsule_common::{Hash, Metadatum, Record};

pub use stores::memory::MemoryStore;
pub use stores::sqlite::{SqliteStore, SqliteStoreError};

/// Append/lookup/scan interface over a capsule's persisted records.
pub trait LogStore {
    /// Look up metadata (no `value`) for a set of hashes. Hashes not
    /// present in the store are simply absent from the result.
    fn read_metadata(&self, hashes: &[Hash]) -> Result<Vec<Metadatum>, capsule_common::Error>;

    /// All metadata currently in the store.
    fn read_all_metadata(&self) -> Result<Vec<Metadatum>, capsule_common::Error>;

    /// Look up full records for a set of hashes. Hashes not present in
    /// the store are simply absent from the result.
    fn read_records(&self, hashes: &[Hash]) -> Result<Vec<Record>, capsule_common::Error>;

    /// All records currently in the store.
    fn read_all_records(&self) -> Result<Vec<Record>, capsule_common::Error>;

    /// Write a batch of records. Commits atomically: either all records
    /// in the batch land, or none do. A record whose hash already exists
    /// is skipped rather than treated as an error, so calling this twice
    /// with the same batch is a no-op the second time.
    fn write_records(&self, records: &[Record]) -> Result<(), capsule_common::Error>;

    /// True if a record with this hash is present.
    fn contains(&self, hash: &Hash) -> Result<bool, capsule_common::Error>;
}
