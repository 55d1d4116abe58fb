//! Ephemeral, in-process store. Used by tests and by the harness that
//! wires up daemons without touching disk.

use std::collections::HashMap;
use std::sync::RwLock;

use capsule_common::{Hash, Metadatum, Record};

use crate::LogStore;

/// An in-memory [`LogStore`], keyed by hash.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Hash, Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryStore {
    fn read_metadata(&self, hashes: &[Hash]) -> Result<Vec<Metadatum>, capsule_common::Error> {
        let records = self.records.read().unwrap();
        Ok(hashes
            .iter()
            .filter_map(|h| records.get(h).map(Record::metadata))
            .collect())
    }

    fn read_all_metadata(&self) -> Result<Vec<Metadatum>, capsule_common::Error> {
        let records = self.records.read().unwrap();
        Ok(records.values().map(Record::metadata).collect())
    }

    fn read_records(&self, hashes: &[Hash]) -> Result<Vec<Record>, capsule_common::Error> {
        let records = self.records.read().unwrap();
        Ok(hashes.iter().filter_map(|h| records.get(h).cloned()).collect())
    }

    fn read_all_records(&self) -> Result<Vec<Record>, capsule_common::Error> {
        let records = self.records.read().unwrap();
        Ok(records.values().cloned().collect())
    }

    fn write_records(&self, batch: &[Record]) -> Result<(), capsule_common::Error> {
        let mut records = self.records.write().unwrap();
        for record in batch {
            records.entry(record.hash).or_insert_with(|| record.clone());
        }
        Ok(())
    }

    fn contains(&self, hash: &Hash) -> Result<bool, capsule_common::Error> {
        Ok(self.records.read().unwrap().contains_key(hash))
    }
}
