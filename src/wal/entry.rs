//! WAL frame layout
//!
//! Each frame (all integers big-endian):
//! - CRC32 of payload (u32)
//! - Payload size (u16)
//! - Statement type (u8)
//! - Log sequence number (u64)
//! - Payload (payload size bytes):
//!   - CRC32 of the previous frame (u32, 0 for the first frame)
//!   - Statement (canonical JSON)
//!
//! The checksum covers the payload bytes only.

use super::checksum::{payload_checksum, verify_checksum};
use super::errors::{WalError, WalResult};
use super::statement::{Statement, StatementType};

/// Bytes preceding the payload
pub const FRAME_HEADER_LEN: usize = 4 + 2 + 1 + 8;

/// Largest payload the 16-bit size field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// One logged statement with its chain link and sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry {
    /// Checksum of the preceding frame
    pub last_crc32: u32,
    /// Log sequence number (starts at 1, gap-free)
    pub lsn: u64,
    pub statement: Statement,
}

/// Encoded frame ready to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFrame {
    pub bytes: Vec<u8>,
    /// Checksum of this frame's payload
    pub crc32: u32,
}

/// Frame decoded and verified from a byte buffer
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedFrame {
    pub entry: WalEntry,
    pub crc32: u32,
    /// Total encoded length, header included
    pub len: usize,
}

impl WalEntry {
    pub fn new(last_crc32: u32, lsn: u64, statement: Statement) -> Self {
        Self {
            last_crc32,
            lsn,
            statement,
        }
    }

    pub fn statement_type(&self) -> StatementType {
        self.statement.statement_type()
    }

    /// Encodes the entry into a frame.
    ///
    /// # Errors
    ///
    /// - `WAL_ENCODING` if the statement cannot be serialized
    /// - `WAL_PAYLOAD_TOO_LARGE` if the payload exceeds 65535 bytes
    pub fn pack(&self) -> WalResult<PackedFrame> {
        let statement = serde_json::to_vec(&self.statement)?;

        let payload_len = 4 + statement.len();
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(WalError::payload_too_large(payload_len, MAX_PAYLOAD_LEN));
        }

        let crc32 = payload_checksum(self.last_crc32, &statement);

        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + payload_len);
        bytes.extend_from_slice(&crc32.to_be_bytes());
        bytes.extend_from_slice(&(payload_len as u16).to_be_bytes());
        bytes.push(self.statement_type().as_u8());
        bytes.extend_from_slice(&self.lsn.to_be_bytes());
        bytes.extend_from_slice(&self.last_crc32.to_be_bytes());
        bytes.extend_from_slice(&statement);

        Ok(PackedFrame { bytes, crc32 })
    }

    /// Decodes and verifies the frame at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `WAL_CORRUPTION` if the frame is truncated, the checksum
    /// does not match, the type tag is unknown or disagrees with the
    /// statement, or the statement cannot be decoded.
    pub fn unpack(data: &[u8]) -> WalResult<VerifiedFrame> {
        if data.len() < FRAME_HEADER_LEN {
            return Err(WalError::corruption(format!(
                "truncated frame header: {} bytes",
                data.len()
            )));
        }

        let stored_crc = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let payload_len = u16::from_be_bytes([data[4], data[5]]) as usize;
        let type_byte = data[6];
        let mut lsn_bytes = [0u8; 8];
        lsn_bytes.copy_from_slice(&data[7..FRAME_HEADER_LEN]);
        let lsn = u64::from_be_bytes(lsn_bytes);

        let end = FRAME_HEADER_LEN + payload_len;
        if data.len() < end {
            return Err(WalError::corruption(format!(
                "truncated payload: expected {} bytes, got {}",
                payload_len,
                data.len() - FRAME_HEADER_LEN
            )));
        }
        let payload = &data[FRAME_HEADER_LEN..end];

        verify_checksum(payload, stored_crc, lsn)?;

        if payload.len() < 4 {
            return Err(WalError::corruption("payload shorter than chain link"));
        }
        let last_crc32 = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);

        let statement_type = StatementType::from_u8(type_byte).ok_or_else(|| {
            WalError::corruption(format!("unknown statement type: {}", type_byte))
        })?;
        let statement: Statement = serde_json::from_slice(&payload[4..])
            .map_err(|e| WalError::corruption(format!("undecodable statement: {}", e)))?;
        if statement.statement_type() != statement_type {
            return Err(WalError::corruption(format!(
                "statement type mismatch: header {}, payload {}",
                statement_type,
                statement.statement_type()
            )));
        }

        Ok(VerifiedFrame {
            entry: WalEntry {
                last_crc32,
                lsn,
                statement,
            },
            crc32: stored_crc,
            len: end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentId};
    use crate::storage::CollectionName;
    use crate::wal::{compute_checksum, WalErrorCode};
    use serde_json::json;

    fn insert_statement() -> Statement {
        Statement::InsertMany {
            collection: CollectionName::new("test_database", "test_collection"),
            documents: vec![],
        }
    }

    #[test]
    fn test_pack_unpack_preserves_header_fields() {
        let entry = WalEntry::new(42, 21, insert_statement());
        let packed = entry.pack().unwrap();
        let frame = WalEntry::unpack(&packed.bytes).unwrap();

        assert_eq!(frame.entry.last_crc32, 42);
        assert_eq!(frame.entry.lsn, 21);
        assert_eq!(frame.entry.statement_type(), StatementType::InsertMany);
        assert_eq!(frame.entry, entry);
        assert_eq!(frame.crc32, packed.crc32);
        assert_eq!(frame.len, packed.bytes.len());
    }

    #[test]
    fn test_header_layout_is_big_endian() {
        let packed = WalEntry::new(0, 0x0102, insert_statement()).pack().unwrap();
        let bytes = &packed.bytes;
        assert_eq!(&bytes[0..4], &packed.crc32.to_be_bytes());
        let payload_len = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        assert_eq!(payload_len, bytes.len() - FRAME_HEADER_LEN);
        assert_eq!(bytes[6], StatementType::InsertMany.as_u8());
        assert_eq!(&bytes[7..15], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(compute_checksum(&bytes[FRAME_HEADER_LEN..]), packed.crc32);
    }

    #[test]
    fn test_payload_corruption_detected() {
        let mut packed = WalEntry::new(0, 1, insert_statement()).pack().unwrap();
        let last = packed.bytes.len() - 2;
        packed.bytes[last] ^= 0xFF;

        let err = WalEntry::unpack(&packed.bytes).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::WalCorruption);
    }

    #[test]
    fn test_truncated_frame_detected() {
        let packed = WalEntry::new(0, 1, insert_statement()).pack().unwrap();
        assert!(WalEntry::unpack(&packed.bytes[..10]).is_err());
        assert!(WalEntry::unpack(&packed.bytes[..packed.bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_type_tag_mismatch_detected() {
        let mut packed = WalEntry::new(0, 1, insert_statement()).pack().unwrap();
        packed.bytes[6] = StatementType::DropCollection.as_u8();
        assert!(WalEntry::unpack(&packed.bytes).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let big = "x".repeat(MAX_PAYLOAD_LEN);
        let doc = Document::with_id(DocumentId::from_parts(1, 1), json!({ "blob": big })).unwrap();
        let entry = WalEntry::new(
            0,
            1,
            Statement::InsertMany {
                collection: CollectionName::new("db", "c"),
                documents: vec![doc],
            },
        );
        let err = entry.pack().unwrap_err();
        assert_eq!(err.code(), WalErrorCode::WalPayloadTooLarge);
    }
}
