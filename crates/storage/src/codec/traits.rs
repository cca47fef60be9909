//! Region codec trait definitions.

/// Region codec trait.
///
/// Value payloads pass through the codec on the way to and from the
/// mapped region. This provides the seam for at-rest protection without
/// the record format or store logic knowing about keys.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync` to allow concurrent use from multiple
/// threads.
///
/// # Codec Identity
///
/// Each codec has an identifier that is stored in the region header.
/// Reopening a region with a different codec (or a keyed codec with the
/// wrong key) is detected as a mismatch before any payload is decoded.
pub trait RegionCodec: Send + Sync {
    /// Encode a payload for storage.
    ///
    /// The returned bytes are what gets written to the region.
    fn encode(&self, data: &[u8]) -> Vec<u8>;

    /// Decode a payload read from the region.
    ///
    /// Reverses the encode operation.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Identifier recorded in the region header.
    fn codec_id(&self) -> &str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Decoding failed (truncated payload, invalid framing).
    #[error("decode error (codec={codec_id}): {detail}")]
    Decode {
        /// Human-readable error description
        detail: String,
        /// Codec id that attempted the decode
        codec_id: String,
    },
}
