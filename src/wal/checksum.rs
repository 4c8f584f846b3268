//! Frame checksums
//!
//! A frame's CRC32 (IEEE) covers its payload only: the 4-byte chain link
//! followed by the encoded statement. The header is protected indirectly,
//! since a damaged length or type tag breaks decoding of what follows.

use crc32fast::Hasher;

use super::errors::{WalError, WalResult};

/// CRC32 of `data`.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// CRC32 of the payload `last_crc32 | statement`, without building it.
pub fn payload_checksum(last_crc32: u32, statement: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&last_crc32.to_be_bytes());
    hasher.update(statement);
    hasher.finalize()
}

/// Checks a stored frame checksum against its payload.
///
/// # Errors
///
/// Returns `WAL_CORRUPTION` naming both values on mismatch.
pub fn verify_checksum(payload: &[u8], stored: u32, lsn: u64) -> WalResult<()> {
    let computed = compute_checksum(payload);
    if computed != stored {
        return Err(WalError::corruption(format!(
            "checksum mismatch at lsn {}: computed {:08x}, stored {:08x}",
            lsn, computed, stored
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::WalErrorCode;

    #[test]
    fn test_payload_checksum_matches_concatenation() {
        let statement = br#"{"type":"drop_index"}"#;
        let mut payload = 42u32.to_be_bytes().to_vec();
        payload.extend_from_slice(statement);
        assert_eq!(payload_checksum(42, statement), compute_checksum(&payload));
    }

    #[test]
    fn test_single_bit_flip_fails_verification() {
        let mut payload = vec![0x00, 0x01, 0x02, 0x03, 0x04];
        let stored = compute_checksum(&payload);
        assert!(verify_checksum(&payload, stored, 1).is_ok());

        payload[2] ^= 0x01;
        let err = verify_checksum(&payload, stored, 1).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::WalCorruption);
    }

    #[test]
    fn test_known_value() {
        assert_eq!(compute_checksum(b"123456789"), 0xCBF4_3926);
    }
}
