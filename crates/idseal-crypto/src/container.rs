//! Self-describing container envelope
//!
//! A container is the persisted/transmitted unit:
//! ```text
//! [4 bytes: big-endian u32 = metadata length N][N bytes: UTF-8 JSON][ciphertext]
//! ```
//!
//! The metadata block is serialized with sorted keys so that identical
//! records always frame to identical bytes. Containers are written once and
//! never mutated; parsing borrows the ciphertext region rather than copying.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hybrid::SCHEME_VERSION;

/// File extension for persisted containers
pub const CONTAINER_EXTENSION: &str = "enc";

/// Metadata version tag written by this implementation
pub const ENCRYPTION_VERSION_TAG: &str = "IBE-v1";

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Verifiable metadata stamped into every container.
///
/// Wire keys are camelCase. `finalEncryptedSize` is computed after framing
/// and therefore only appears on records returned to callers, never inside
/// the serialized block itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMeta {
    /// Original file name
    pub original_name: String,
    /// Plaintext size in bytes
    pub original_size: u64,
    /// Ciphertext region size in bytes (version byte included)
    pub encrypted_size: u64,
    /// Target identity the container is encrypted for
    pub user_id: String,
    /// Sender identity (advisory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_by: Option<String>,
    /// Creation time, nanoseconds since epoch
    pub timestamp: u64,
    /// SHA-256 of the ciphertext region (hex)
    pub hash: String,
    /// SHA-256 of the plaintext (hex, advisory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<String>,
    /// Scheme tag, currently "IBE-v1"
    pub encryption_version: String,
    /// Total container size including prefix and metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_encrypted_size: Option<u64>,
}

/// Serialize metadata to its canonical wire bytes (sorted keys).
pub fn serialize_meta(meta: &ContainerMeta) -> Result<Vec<u8>, CryptoError> {
    // Round-trip through Value: its BTreeMap backing sorts the keys, so the
    // same record always produces the same bytes
    let value = serde_json::to_value(meta)
        .map_err(|e| CryptoError::Metadata(format!("metadata to value: {e}")))?;
    serde_json::to_vec(&value).map_err(|e| CryptoError::Metadata(format!("metadata encode: {e}")))
}

/// Assemble a container from metadata and ciphertext.
///
/// The length prefix is exactly the serialized metadata byte count.
pub fn encode(meta: &ContainerMeta, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let meta_bytes = serialize_meta(meta)?;
    let meta_len = u32::try_from(meta_bytes.len())
        .map_err(|_| CryptoError::Metadata("metadata block exceeds u32 length".into()))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + meta_bytes.len() + ciphertext.len());
    out.extend_from_slice(&meta_len.to_be_bytes());
    out.extend_from_slice(&meta_bytes);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Split a container into its metadata record and ciphertext region.
///
/// Any structural shortfall — missing prefix, a declared metadata length
/// the buffer cannot satisfy, an undecodable metadata block, or an empty
/// ciphertext region — is a [`CryptoError::Format`] and is detected before
/// any cryptographic work.
pub fn decode(data: &[u8]) -> Result<(ContainerMeta, &[u8]), CryptoError> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(CryptoError::Format(format!(
            "container shorter than length prefix: {} bytes",
            data.len()
        )));
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&data[..LENGTH_PREFIX_SIZE]);
    let meta_len = u32::from_be_bytes(prefix) as usize;

    let rest = &data[LENGTH_PREFIX_SIZE..];
    if rest.len() < meta_len {
        return Err(CryptoError::Format(format!(
            "length prefix declares {} metadata bytes, only {} available",
            meta_len,
            rest.len()
        )));
    }

    let (meta_bytes, ciphertext) = rest.split_at(meta_len);
    let meta: ContainerMeta = serde_json::from_slice(meta_bytes)
        .map_err(|e| CryptoError::Format(format!("metadata block undecodable: {e}")))?;

    if ciphertext.is_empty() {
        return Err(CryptoError::Format("empty ciphertext region".into()));
    }

    Ok((meta, ciphertext))
}

/// Version dispatch: both the metadata tag and the ciphertext scheme byte
/// must be known before any decode path is selected.
pub fn check_versions(meta: &ContainerMeta, ciphertext: &[u8]) -> Result<(), CryptoError> {
    if meta.encryption_version != ENCRYPTION_VERSION_TAG {
        return Err(CryptoError::UnsupportedVersion(format!(
            "metadata version tag \"{}\"",
            meta.encryption_version
        )));
    }
    match ciphertext.first() {
        Some(&SCHEME_VERSION) => Ok(()),
        Some(&other) => Err(CryptoError::UnsupportedVersion(format!(
            "ciphertext scheme byte 0x{other:02x}"
        ))),
        None => Err(CryptoError::Format("empty ciphertext region".into())),
    }
}

/// Whether a path carries the container extension.
pub fn has_container_extension(path: &std::path::Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_meta() -> ContainerMeta {
        ContainerMeta {
            original_name: "report.pdf".into(),
            original_size: 10,
            encrypted_size: 42,
            user_id: "alice".into(),
            encrypted_by: Some("bob".into()),
            timestamp: 1_700_000_000_000_000_000,
            hash: "ab".repeat(32),
            original_hash: None,
            encryption_version: ENCRYPTION_VERSION_TAG.into(),
            final_encrypted_size: None,
        }
    }

    fn sample_ciphertext() -> Vec<u8> {
        let mut ct = vec![SCHEME_VERSION];
        ct.extend_from_slice(&[0xAA; 41]);
        ct
    }

    #[test]
    fn encode_decode_roundtrip() {
        let meta = sample_meta();
        let ct = sample_ciphertext();

        let container = encode(&meta, &ct).unwrap();
        let (parsed, parsed_ct) = decode(&container).unwrap();

        assert_eq!(parsed.original_name, meta.original_name);
        assert_eq!(parsed.user_id, "alice");
        assert_eq!(parsed.timestamp, meta.timestamp);
        assert_eq!(parsed_ct, &ct[..]);
    }

    #[test]
    fn length_prefix_matches_metadata_block() {
        let container = encode(&sample_meta(), &sample_ciphertext()).unwrap();

        let declared =
            u32::from_be_bytes(container[..4].try_into().unwrap()) as usize;
        let meta_bytes = serialize_meta(&sample_meta()).unwrap();
        assert_eq!(declared, meta_bytes.len());
        assert_eq!(
            container.len(),
            LENGTH_PREFIX_SIZE + declared + sample_ciphertext().len()
        );
    }

    #[test]
    fn metadata_keys_are_sorted() {
        let bytes = serialize_meta(&sample_meta()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let positions: Vec<usize> = [
            "\"encryptedBy\"",
            "\"encryptedSize\"",
            "\"encryptionVersion\"",
            "\"hash\"",
            "\"originalName\"",
            "\"originalSize\"",
            "\"timestamp\"",
            "\"userId\"",
        ]
        .iter()
        .map(|key| text.find(key).unwrap_or_else(|| panic!("missing {key}")))
        .collect();

        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "keys must appear in sorted order");
    }

    #[test]
    fn serialization_is_deterministic() {
        let a = serialize_meta(&sample_meta()).unwrap();
        let b = serialize_meta(&sample_meta()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_before_metadata_end_is_malformed() {
        let container = encode(&sample_meta(), &sample_ciphertext()).unwrap();
        let meta_len = u32::from_be_bytes(container[..4].try_into().unwrap()) as usize;

        // Keep the prefix and all but the last metadata byte
        let truncated = &container[..LENGTH_PREFIX_SIZE + meta_len - 1];
        assert!(matches!(decode(truncated), Err(CryptoError::Format(_))));
    }

    #[test]
    fn truncated_to_exact_metadata_end_is_malformed() {
        // Metadata parses, but the ciphertext region is empty
        let container = encode(&sample_meta(), &sample_ciphertext()).unwrap();
        let meta_len = u32::from_be_bytes(container[..4].try_into().unwrap()) as usize;

        let truncated = &container[..LENGTH_PREFIX_SIZE + meta_len];
        assert!(matches!(decode(truncated), Err(CryptoError::Format(_))));
    }

    #[test]
    fn inconsistent_length_prefix_is_malformed() {
        let mut container = encode(&sample_meta(), &sample_ciphertext()).unwrap();
        // Declare more metadata than the container holds
        let bogus = (container.len() as u32).to_be_bytes();
        container[..4].copy_from_slice(&bogus);

        assert!(matches!(decode(&container), Err(CryptoError::Format(_))));
    }

    #[test]
    fn garbage_metadata_is_malformed() {
        let mut data = Vec::new();
        data.extend_from_slice(&5u32.to_be_bytes());
        data.extend_from_slice(b"not{j");
        data.extend_from_slice(&sample_ciphertext());

        assert!(matches!(decode(&data), Err(CryptoError::Format(_))));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(decode(&[]), Err(CryptoError::Format(_))));
        assert!(matches!(decode(&[0, 0]), Err(CryptoError::Format(_))));
    }

    #[test]
    fn unknown_versions_are_distinct_errors() {
        let mut meta = sample_meta();
        meta.encryption_version = "IBE-v9".into();
        assert!(matches!(
            check_versions(&meta, &sample_ciphertext()),
            Err(CryptoError::UnsupportedVersion(_))
        ));

        let meta = sample_meta();
        let mut ct = sample_ciphertext();
        ct[0] = 0x02;
        assert!(matches!(
            check_versions(&meta, &ct),
            Err(CryptoError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn extension_gate() {
        use std::path::Path;
        assert!(has_container_extension(Path::new("report.pdf.enc")));
        assert!(has_container_extension(Path::new("UPPER.ENC")));
        assert!(!has_container_extension(Path::new("report.pdf")));
        assert!(!has_container_extension(Path::new("enc")));
    }

    proptest! {
        #[test]
        fn framing_roundtrip_any_payload(
            name in ".{0,64}",
            target in "[a-z0-9-]{1,32}",
            ct_body in proptest::collection::vec(any::<u8>(), 1..512),
        ) {
            let mut ct = vec![SCHEME_VERSION];
            ct.extend_from_slice(&ct_body);

            let meta = ContainerMeta {
                original_name: name.clone(),
                original_size: ct_body.len() as u64,
                encrypted_size: ct.len() as u64,
                user_id: target.clone(),
                encrypted_by: None,
                timestamp: 1,
                hash: "00".repeat(32),
                original_hash: None,
                encryption_version: ENCRYPTION_VERSION_TAG.into(),
                final_encrypted_size: None,
            };

            let container = encode(&meta, &ct).unwrap();
            let declared = u32::from_be_bytes(container[..4].try_into().unwrap()) as usize;
            prop_assert_eq!(declared, serialize_meta(&meta).unwrap().len());

            let (parsed, parsed_ct) = decode(&container).unwrap();
            prop_assert_eq!(parsed.original_name, name);
            prop_assert_eq!(parsed.user_id, target);
            prop_assert_eq!(parsed_ct, &ct[..]);
        }
    }
}
