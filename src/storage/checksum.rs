//! Checksum validation
//!
//! CRC32 framing for the snapshot file, so a torn or bit-flipped payload is
//! reported as corruption instead of being decoded.
//!
//! Frame layout: `[data_len: u64][data][crc32: u32]`, little-endian.

use crate::GeoError;
use crc32fast::Hasher;

pub struct Checksum;

impl Checksum {
    pub fn compute(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn verify(data: &[u8], expected: u32) -> Result<(), ChecksumError> {
        let actual = Self::compute(data);
        if actual != expected {
            return Err(ChecksumError::Mismatch {
                expected,
                actual,
                data_len: data.len(),
            });
        }
        Ok(())
    }

    /// Encode `data` as a length-prefixed, checksummed frame
    pub fn encode_with_checksum(data: &[u8]) -> Vec<u8> {
        let checksum = Self::compute(data);
        let mut encoded = Vec::with_capacity(8 + data.len() + 4);
        encoded.extend_from_slice(&(data.len() as u64).to_le_bytes());
        encoded.extend_from_slice(data);
        encoded.extend_from_slice(&checksum.to_le_bytes());
        encoded
    }

    /// Decode and verify a frame produced by [`Checksum::encode_with_checksum`]
    pub fn decode_with_checksum(encoded: &[u8]) -> Result<&[u8], ChecksumError> {
        if encoded.len() < 12 {
            return Err(ChecksumError::InvalidFormat("frame too short".to_string()));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&encoded[..8]);
        let data_len = u64::from_le_bytes(len_bytes) as usize;

        let expected_len = data_len.checked_add(12).ok_or_else(|| {
            ChecksumError::InvalidFormat(format!("declared length {} overflows", data_len))
        })?;
        if encoded.len() != expected_len {
            return Err(ChecksumError::InvalidFormat(format!(
                "expected {} bytes, got {}",
                expected_len,
                encoded.len()
            )));
        }

        let data = &encoded[8..8 + data_len];
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&encoded[8 + data_len..]);
        Self::verify(data, u32::from_le_bytes(crc_bytes))?;

        Ok(data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x} (data_len={data_len})")]
    Mismatch {
        expected: u32,
        actual: u32,
        data_len: usize,
    },

    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),
}

impl From<ChecksumError> for GeoError {
    fn from(err: ChecksumError) -> Self {
        GeoError::Corruption(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_basic() {
        let data = b"polygon rows";
        let checksum = Checksum::compute(data);
        assert!(Checksum::verify(data, checksum).is_ok());
        assert!(Checksum::verify(b"polygon rowz", checksum).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let encoded = Checksum::encode_with_checksum(b"features");
        assert_eq!(encoded.len(), 8 + 8 + 4);
        assert_eq!(Checksum::decode_with_checksum(&encoded).unwrap(), b"features");
    }

    #[test]
    fn test_corruption_detection() {
        let mut encoded = Checksum::encode_with_checksum(b"features");
        encoded[10] ^= 0xFF;
        let err = Checksum::decode_with_checksum(&encoded).unwrap_err();
        assert!(matches!(err, ChecksumError::Mismatch { .. }));

        let truncated = &Checksum::encode_with_checksum(b"features")[..10];
        assert!(matches!(
            Checksum::decode_with_checksum(truncated),
            Err(ChecksumError::InvalidFormat(_))
        ));
    }
}
