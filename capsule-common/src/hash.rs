use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bytes in a content address.
pub const HASH_LEN: usize = 32;

/// A 32-byte content address.
///
/// The all-zero value is reserved as the "null" parent marker: a record
/// whose `prev_hash` is null starts a chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// The null/root parent marker.
    pub const NULL: Hash = Hash([0u8; HASH_LEN]);

    /// Construct a hash from raw bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// True if this is the null/root parent marker.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Short uppercase hex prefix, for log lines.
    ///
    /// Mirrors the source daemon's `Hash.Readable()`, which truncates a
    /// full hex dump to four characters.
    pub fn readable(&self) -> String {
        let full = hex::encode_upper(self.0);
        full[..4].to_string()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.readable())
    }
}

/// Error returned when a hash fails to parse from hex or raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    /// The byte slice wasn't exactly [`HASH_LEN`] bytes long.
    #[error("expected {HASH_LEN} bytes, got {0}")]
    WrongLength(usize),
    /// The hex string contained invalid hex digits.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl TryFrom<&[u8]> for Hash {
    type Error = HashParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != HASH_LEN {
            return Err(HashParseError::WrongLength(bytes.len()));
        }
        let mut buf = [0u8; HASH_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}
