//! Identity codec (no transformation).
//!
//! The default codec for stores opened without a crypt key. Payload
//! bytes pass through unchanged.

use super::traits::{CodecError, RegionCodec};

/// Identity codec - no transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl RegionCodec for IdentityCodec {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn codec_id(&self) -> &str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        let codec = IdentityCodec;
        let data = vec![0xFF, 0x00, 0xAB, 0xCD];

        let encoded = codec.encode(&data);
        assert_eq!(data, encoded);

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(data, decoded);
    }

    #[test]
    fn test_identity_empty() {
        let codec = IdentityCodec;
        let encoded = codec.encode(&[]);
        assert!(encoded.is_empty());
        assert!(codec.decode(&encoded).unwrap().is_empty());
    }
}
