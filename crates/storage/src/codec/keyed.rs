//! Keyed codec for stores opened with a crypt key.
//!
//! Each payload is XORed with a SHA-256-derived keystream seeded by the
//! key digest and a per-record random nonce. The nonce is stored ahead of
//! the payload, so identical plaintexts produce different region bytes.
//!
//! The codec id embeds a short verifier derived from the key. Opening an
//! encrypted region with the wrong key (or no key) fails the header codec
//! check instead of decoding garbage.
//!
//! This is obfuscation-grade at-rest protection behind the codec seam; a
//! real AEAD can replace it without touching the record format.

use rand::RngCore;
use sha2::{Digest, Sha256};

use super::traits::{CodecError, RegionCodec};

/// Nonce length stored ahead of each encoded payload.
const NONCE_LEN: usize = 8;

/// Keyed XOR codec with a SHA-256 keystream.
pub struct KeyedCodec {
    /// SHA-256 digest of the caller-supplied key
    key_digest: [u8; 32],
    /// Codec id including the key verifier
    id: String,
}

impl KeyedCodec {
    /// Create a codec from a caller-supplied key string.
    pub fn new(crypt_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"mapkv-key-v1");
        hasher.update(crypt_key.as_bytes());
        let digest = hasher.finalize();

        let mut key_digest = [0u8; 32];
        key_digest.copy_from_slice(&digest);

        // Verifier: first 4 bytes of a second hash, hex-encoded into the id.
        let mut verify = Sha256::new();
        verify.update(b"mapkv-verify-v1");
        verify.update(key_digest);
        let verifier = verify.finalize();
        let id = format!(
            "keyed-v1:{:02x}{:02x}{:02x}{:02x}",
            verifier[0], verifier[1], verifier[2], verifier[3]
        );

        KeyedCodec { key_digest, id }
    }

    /// XOR `data` in place with the keystream for `nonce`.
    fn apply_keystream(&self, nonce: &[u8], data: &mut [u8]) {
        let mut block_index: u64 = 0;
        let mut pos = 0;
        while pos < data.len() {
            let mut hasher = Sha256::new();
            hasher.update(self.key_digest);
            hasher.update(nonce);
            hasher.update(block_index.to_le_bytes());
            let block = hasher.finalize();

            let n = (data.len() - pos).min(block.len());
            for i in 0..n {
                data[pos + i] ^= block[i];
            }
            pos += n;
            block_index += 1;
        }
    }
}

impl RegionCodec for KeyedCodec {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut out = Vec::with_capacity(NONCE_LEN + data.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(data);
        let (nonce_part, body) = out.split_at_mut(NONCE_LEN);
        self.apply_keystream(nonce_part, body);
        out
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.len() < NONCE_LEN {
            return Err(CodecError::Decode {
                detail: "payload shorter than nonce".to_string(),
                codec_id: self.id.clone(),
            });
        }
        let (nonce, body) = data.split_at(NONCE_LEN);
        let mut out = body.to_vec();
        self.apply_keystream(nonce, &mut out);
        Ok(out)
    }

    fn codec_id(&self) -> &str {
        &self.id
    }
}
