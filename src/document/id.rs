//! Time-ordered document identifiers
//!
//! Layout (12 bytes, compared bytewise):
//! - UNIX seconds (u32 BE)
//! - process-unique random bytes (5)
//! - per-process counter (u24 BE)
//!
//! Because the timestamp leads, byte order is creation order at one-second
//! granularity, and the counter orders identifiers created in the same second.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Encoded size of a document identifier in bytes
pub const DOCUMENT_ID_LEN: usize = 12;

const COUNTER_MASK: u32 = 0x00ff_ffff;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

/// Errors produced when parsing an identifier from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIdError {
    #[error("document id must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("document id contains a non-hex character at position {0}")]
    InvalidHex(usize),
}

/// Globally unique (per collection) document identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId([u8; DOCUMENT_ID_LEN]);

impl DocumentId {
    /// Generates a fresh identifier stamped with the current time.
    pub fn generate() -> Self {
        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        Self::with_timestamp(seconds)
    }

    /// Generates an identifier for the given timestamp using the process
    /// counter and process-unique bytes.
    pub fn with_timestamp(seconds: u32) -> Self {
        let unique = PROCESS_UNIQUE.get_or_init(|| rand::thread_rng().gen());
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; DOCUMENT_ID_LEN];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Builds a deterministic identifier from a timestamp and counter.
    ///
    /// The process-unique bytes are zero. Used by tests and tooling that
    /// need reproducible identifiers.
    pub fn from_parts(seconds: u32, counter: u32) -> Self {
        let mut bytes = [0u8; DOCUMENT_ID_LEN];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[9..12].copy_from_slice(&(counter & COUNTER_MASK).to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; DOCUMENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DOCUMENT_ID_LEN] {
        &self.0
    }

    /// Returns the embedded UNIX timestamp in seconds
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Returns the 24-character lowercase hex rendering
    pub fn to_hex(&self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(DOCUMENT_ID_LEN * 2);
        for byte in self.0 {
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
        out
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DOCUMENT_ID_LEN * 2 {
            return Err(DocumentIdError::InvalidLength {
                expected: DOCUMENT_ID_LEN * 2,
                actual: s.len(),
            });
        }

        fn nibble(c: u8, pos: usize) -> Result<u8, DocumentIdError> {
            match c {
                b'0'..=b'9' => Ok(c - b'0'),
                b'a'..=b'f' => Ok(c - b'a' + 10),
                b'A'..=b'F' => Ok(c - b'A' + 10),
                _ => Err(DocumentIdError::InvalidHex(pos)),
            }
        }

        let raw = s.as_bytes();
        let mut bytes = [0u8; DOCUMENT_ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = nibble(raw[i * 2], i * 2)?;
            let lo = nibble(raw[i * 2 + 1], i * 2 + 1)?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.to_hex())
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
