//! Persistent storage backend for capsule records, via this schema:
//!
//! ```sql
//! CREATE TABLE log_entry(
//!   hash BLOB(32) PRIMARY KEY ON CONFLICT IGNORE,
//!   recno INTEGER, timestamp INTEGER, accuracy FLOAT,
//!   prevhash BLOB(32), value BLOB, sig BLOB)
//! ```
//!
//! Hash columns are raw 32-byte blobs; lookups bind the hash directly
//! rather than hex-encoding it, since `sqlite` compares BLOB columns
//! byte-wise already.

use std::path::Path;
use std::sync::Mutex;

use capsule_common::{Hash, Metadatum, Record, HASH_LEN};
use sqlite::State;
use thiserror::Error;

use crate::LogStore;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS log_entry(
        hash BLOB(32) PRIMARY KEY ON CONFLICT IGNORE,
        recno INTEGER,
        timestamp INTEGER,
        accuracy FLOAT,
        prevhash BLOB(32),
        value BLOB,
        sig BLOB
    );
";

/// A store error from the sqlite backend.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying sqlite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),
    /// A row held a hash or prevhash column of the wrong length.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] capsule_common::HashParseError),
}

impl From<SqliteStoreError> for capsule_common::Error {
    fn from(err: SqliteStoreError) -> Self {
        capsule_common::Error::StorageIo(err.to_string())
    }
}

/// A [`LogStore`] backed by a single sqlite file (or `:memory:`).
pub struct SqliteStore {
    connection: Mutex<sqlite::Connection>,
}

impl SqliteStore {
    /// Open (creating if absent) a sqlite-backed store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteStoreError> {
        let connection = sqlite::open(path)?;
        connection.execute(CREATE_TABLE)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Open an ephemeral in-memory sqlite store, for tests.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        Self::open(":memory:")
    }

    fn row_to_record(statement: &sqlite::Statement) -> Result<Record, SqliteStoreError> {
        let hash_bytes = statement.read::<Vec<u8>, _>("hash")?;
        let prev_bytes = statement.read::<Vec<u8>, _>("prevhash")?;
        let value = statement.read::<Vec<u8>, _>("value").unwrap_or_default();
        let sig = statement.read::<Vec<u8>, _>("sig").unwrap_or_default();

        let prev_hash = if prev_bytes.len() == HASH_LEN {
            Hash::try_from(prev_bytes.as_slice())?
        } else {
            Hash::NULL
        };

        Ok(Record {
            hash: Hash::try_from(hash_bytes.as_slice())?,
            rec_no: statement.read::<i64, _>("recno")?,
            timestamp: statement.read::<i64, _>("timestamp")?,
            accuracy: statement.read::<f64, _>("accuracy")?,
            prev_hash,
            value,
            sig,
        })
    }
}

const SELECT_COLUMNS: &str = "hash, recno, timestamp, accuracy, prevhash, value, sig";

impl LogStore for SqliteStore {
    fn read_metadata(&self, hashes: &[Hash]) -> Result<Vec<Metadatum>, capsule_common::Error> {
        Ok(self
            .read_records(hashes)?
            .into_iter()
            .map(|r| r.metadata())
            .collect())
    }

    fn read_all_metadata(&self) -> Result<Vec<Metadatum>, capsule_common::Error> {
        Ok(self
            .read_all_records()?
            .into_iter()
            .map(|r| r.metadata())
            .collect())
    }

    fn read_records(&self, hashes: &[Hash]) -> Result<Vec<Record>, capsule_common::Error> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let connection = self.connection.lock().unwrap();
        let mut out = Vec::with_capacity(hashes.len());
        let query = format!("SELECT {SELECT_COLUMNS} FROM log_entry WHERE hash = ?");
        for hash in hashes {
            let mut statement = connection
                .prepare(&query)
                .map_err(SqliteStoreError::from)?;
            statement
                .bind((1, hash.as_bytes().as_slice()))
                .map_err(SqliteStoreError::from)?;
            while let State::Row = statement.next().map_err(SqliteStoreError::from)? {
                out.push(Self::row_to_record(&statement)?);
            }
        }
        Ok(out)
    }

    fn read_all_records(&self) -> Result<Vec<Record>, capsule_common::Error> {
        let connection = self.connection.lock().unwrap();
        let query = format!("SELECT {SELECT_COLUMNS} FROM log_entry");
        let mut statement = connection.prepare(query).map_err(SqliteStoreError::from)?;
        let mut out = Vec::new();
        while let State::Row = statement.next().map_err(SqliteStoreError::from)? {
            out.push(Self::row_to_record(&statement)?);
        }
        Ok(out)
    }

    fn write_records(&self, records: &[Record]) -> Result<(), capsule_common::Error> {
        if records.is_empty() {
            return Ok(());
        }
        let connection = self.connection.lock().unwrap();
        connection
            .execute("BEGIN TRANSACTION")
            .map_err(SqliteStoreError::from)?;

        let insert = "INSERT OR IGNORE INTO log_entry \
            (hash, recno, timestamp, accuracy, prevhash, value, sig) \
            VALUES (?, ?, ?, ?, ?, ?, ?)";

        let result = (|| -> Result<(), SqliteStoreError> {
            for record in records {
                let mut statement = connection.prepare(insert)?;
                statement.bind((1, record.hash.as_bytes().as_slice()))?;
                statement.bind((2, record.rec_no))?;
                statement.bind((3, record.timestamp))?;
                statement.bind((4, record.accuracy))?;
                statement.bind((5, record.prev_hash.as_bytes().as_slice()))?;
                statement.bind((6, record.value.as_slice()))?;
                statement.bind((7, record.sig.as_slice()))?;
                statement.next()?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                connection
                    .execute("COMMIT")
                    .map_err(SqliteStoreError::from)?;
                Ok(())
            }
            Err(err) => {
                let _ = connection.execute("ROLLBACK");
                Err(err.into())
            }
        }
    }

    fn contains(&self, hash: &Hash) -> Result<bool, capsule_common::Error> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection
            .prepare("SELECT COUNT(hash) AS n FROM log_entry WHERE hash = ?")
            .map_err(SqliteStoreError::from)?;
        statement
            .bind((1, hash.as_bytes().as_slice()))
            .map_err(SqliteStoreError::from)?;
        if let State::Row = statement.next().map_err(SqliteStoreError::from)? {
            let n = statement
                .read::<i64, _>("n")
                .map_err(SqliteStoreError::from)?;
            return Ok(n > 0);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: u8, prev: u8) -> Record {
        Record {
            hash: Hash::from_bytes([hash; 32]),
            rec_no: hash as i64,
            timestamp: 1_700_000_000,
            accuracy: 0.9,
            prev_hash: if prev == 0 {
                Hash::NULL
            } else {
                Hash::from_bytes([prev; 32])
            },
            value: vec![hash, hash],
            sig: vec![0xAA],
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record(1, 0);
        store.write_records(&[r.clone()]).unwrap();
        assert!(store.contains(&r.hash).unwrap());
        let got = store.read_records(&[r.hash]).unwrap();
        assert_eq!(got, vec![r]);
    }

    #[test]
    fn write_is_idempotent_on_duplicate_hash() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record(2, 1);
        store.write_records(&[r.clone(), r.clone()]).unwrap();
        let all = store.read_all_records().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn persists_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capsule.db");
        let r = record(3, 0);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.write_records(&[r.clone()]).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.read_all_records().unwrap(), vec![r]);
    }

    #[test]
    fn missing_hash_is_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let missing = Hash::from_bytes([9; 32]);
        assert!(!store.contains(&missing).unwrap());
        assert!(store.read_records(&[missing]).unwrap().is_empty());
    }
}
