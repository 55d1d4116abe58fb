//! Opens whichever backend a [`Config`] names. Mirrors
//! `block::store::{File, Error}`'s split between a production backend
//! and an in-memory one used by tests, generalized to a config-selected
//! enum so `run()` stays generic over neither.

use capsule_common::{Hash, Metadatum, Record};
use capsule_store::{LogStore, MemoryStore, SqliteStore};

use crate::config::Config;
use crate::error::Error;

/// Either persisted backend a daemon can be pointed at.
pub enum AnyStore {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl LogStore for AnyStore {
    fn read_metadata(&self, hashes: &[Hash]) -> Result<Vec<Metadatum>, capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.read_metadata(hashes),
            AnyStore::Memory(store) => store.read_metadata(hashes),
        }
    }

    fn read_all_metadata(&self) -> Result<Vec<Metadatum>, capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.read_all_metadata(),
            AnyStore::Memory(store) => store.read_all_metadata(),
        }
    }

    fn read_records(&self, hashes: &[Hash]) -> Result<Vec<Record>, capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.read_records(hashes),
            AnyStore::Memory(store) => store.read_records(hashes),
        }
    }

    fn read_all_records(&self) -> Result<Vec<Record>, capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.read_all_records(),
            AnyStore::Memory(store) => store.read_all_records(),
        }
    }

    fn write_records(&self, records: &[Record]) -> Result<(), capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.write_records(records),
            AnyStore::Memory(store) => store.write_records(records),
        }
    }

    fn contains(&self, hash: &Hash) -> Result<bool, capsule_common::Error> {
        match self {
            AnyStore::Sqlite(store) => store.contains(hash),
            AnyStore::Memory(store) => store.contains(hash),
        }
    }
}

/// Open the backend named by `config.store_path`: a sqlite file if set,
/// an ephemeral in-memory store otherwise.
pub fn open_store(config: &Config) -> Result<AnyStore, Error> {
    match &config.store_path {
        Some(path) => {
            let store = SqliteStore::open(path).map_err(|e| Error::Store(e.to_string()))?;
            Ok(AnyStore::Sqlite(store))
        }
        None => Ok(AnyStore::Memory(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolChoice;
    use std::collections::HashMap;

    fn base_config() -> Config {
        Config {
            local_id: Hash::from_bytes([1u8; 32]),
            listen_addr: "127.0.0.1:0".to_string(),
            store_path: None,
            peers: HashMap::new(),
            protocol: ProtocolChoice::Naive,
            heartbeat_interval_ms: 100,
            fanout_degree: 1,
        }
    }

    #[test]
    fn no_store_path_opens_an_in_memory_store() {
        let store = open_store(&base_config()).unwrap();
        assert!(matches!(store, AnyStore::Memory(_)));
    }

    #[test]
    fn store_path_opens_a_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config();
        config.store_path = Some(dir.path().join("capsule.db"));
        let store = open_store(&config).unwrap();
        assert!(matches!(store, AnyStore::Sqlite(_)));
    }
}
