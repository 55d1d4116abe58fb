use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// A single entry in a capsule's hash-chained log.
///
/// `hash` is the primary key; `prev_hash` links the record to its parent.
/// `prev_hash == Hash::NULL` means the record starts a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub hash: Hash,
    pub rec_no: i64,
    pub timestamp: i64,
    pub accuracy: f64,
    pub prev_hash: Hash,
    pub value: Vec<u8>,
    pub sig: Vec<u8>,
}

impl Record {
    /// Project this record down to its [`Metadatum`], dropping `value`.
    pub fn metadata(&self) -> Metadatum {
        Metadatum {
            hash: self.hash,
            rec_no: self.rec_no,
            timestamp: self.timestamp,
            accuracy: self.accuracy,
            prev_hash: self.prev_hash,
            sig: self.sig.clone(),
        }
    }
}

/// A [`Record`] projection without `value`, for bulk metadata exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadatum {
    pub hash: Hash,
    pub rec_no: i64,
    pub timestamp: i64,
    pub accuracy: f64,
    pub prev_hash: Hash,
    pub sig: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            hash: Hash::from_bytes([1u8; 32]),
            rec_no: 1,
            timestamp: 1_700_000_000,
            accuracy: 0.5,
            prev_hash: Hash::NULL,
            value: b"hello".to_vec(),
            sig: b"sig".to_vec(),
        }
    }

    #[test]
    fn metadata_drops_value() {
        let record = sample();
        let metadata = record.metadata();
        assert_eq!(metadata.hash, record.hash);
        assert_eq!(metadata.prev_hash, record.prev_hash);
    }

    #[test]
    fn json_roundtrip_preserves_all_fields() {
        let record = sample();
        let encoded = serde_json::to_vec(&record).unwrap();
        let decoded: Record = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(record, decoded);
    }
}
