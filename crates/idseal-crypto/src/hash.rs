//! Content digests: SHA-256 for integrity stamps, BLAKE3 for cache fingerprints

use sha2::{Digest, Sha256};

/// Number of hex characters in a short fingerprint
const FINGERPRINT_HEX_LEN: usize = 16;

/// SHA-256 digest of a byte buffer as a lowercase hex string.
///
/// Used to stamp the ciphertext at encryption time and re-verify it at
/// decryption time. Pure function; a mismatch downstream is an integrity
/// error, never a hasher failure.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Short BLAKE3 fingerprint (64-bit, hex) of a byte buffer.
///
/// Used only for cache keying, where a compact discriminator for the
/// authority's public parameters is enough; never as an integrity check.
pub fn fingerprint_hex(data: &[u8]) -> String {
    let digest = blake3::hash(data);
    digest.to_hex()[..FINGERPRINT_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_is_deterministic() {
        let data = b"hello test";
        assert_eq!(sha256_hex(data), sha256_hex(data));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let fp = fingerprint_hex(b"system public key bytes");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, fingerprint_hex(b"system public key bytes"));
        assert_ne!(fp, fingerprint_hex(b"different bytes"));
    }
}
