//! End-to-end pipeline tests against an in-process authority.
//!
//! The test authority holds real master key material and answers the same
//! two operations the daemon serves, so every orchestration path below —
//! access gating, integrity policy, caching, version dispatch — runs the
//! production code.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use idseal_core::{SealError, SealResult};
use idseal_crypto::container;
use idseal_crypto::hybrid::{
    extract_identity_key, parse_master_secret_key, parse_public_key, serialize_master_secret_key,
    serialize_public_key, serialize_user_secret_key, setup_authority,
};
use idseal_crypto::transport::seal_response;
use idseal_engine::{EngineOptions, FileInfo, IntegrityPolicy, KeyAuthority, SealEngine};

struct TestAuthority {
    public_key: Vec<u8>,
    master_key: Vec<u8>,
    derivations: Arc<AtomicUsize>,
}

impl TestAuthority {
    fn new() -> Self {
        let (pk, msk) = setup_authority();
        Self {
            public_key: serialize_public_key(&pk),
            master_key: serialize_master_secret_key(&msk),
            derivations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl KeyAuthority for TestAuthority {
    async fn system_public_key(&self) -> SealResult<Vec<u8>> {
        Ok(self.public_key.clone())
    }

    async fn derive_key_material(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>> {
        self.derivations.fetch_add(1, Ordering::SeqCst);
        let pk = parse_public_key(&self.public_key)
            .map_err(|e| SealError::Authority(e.to_string()))?;
        let msk = parse_master_secret_key(&self.master_key)
            .map_err(|e| SealError::Authority(e.to_string()))?;
        let usk = extract_identity_key(&pk, &msk, identity);
        seal_response(
            identity,
            transport_public_key,
            &serialize_user_secret_key(&usk),
        )
        .map_err(|e| SealError::Authority(e.to_string()))
    }
}

fn engine_with(policy: IntegrityPolicy) -> (SealEngine<TestAuthority>, Arc<AtomicUsize>) {
    let authority = TestAuthority::new();
    let counter = authority.derivations.clone();
    let options = EngineOptions {
        integrity_policy: policy,
        ..Default::default()
    };
    (SealEngine::new(authority, options), counter)
}

fn info(name: &str) -> FileInfo {
    FileInfo {
        name: name.into(),
        original_hash: None,
    }
}

/// Byte offset of the ciphertext region within a container.
fn ciphertext_offset(data: &[u8]) -> usize {
    let meta_len = u32::from_be_bytes(data[..4].try_into().unwrap()) as usize;
    4 + meta_len
}

#[tokio::test]
async fn hello_test_roundtrip() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("greeting.txt"))
        .await
        .unwrap();

    assert_eq!(sealed.metadata.user_id, "alice");
    assert_eq!(sealed.metadata.original_size, 10);
    assert_eq!(
        sealed.metadata.final_encrypted_size,
        Some(sealed.data.len() as u64)
    );

    let outcome = engine.decrypt_file(&sealed.data, "alice").await.unwrap();
    assert_eq!(outcome.plaintext, b"hello test");
    assert_eq!(outcome.metadata.original_name, "greeting.txt");
    assert!(outcome.integrity.verified);
}

#[tokio::test]
async fn empty_plaintext_roundtrip() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"", "alice", &info("empty.bin"))
        .await
        .unwrap();
    assert_eq!(sealed.metadata.original_size, 0);

    let outcome = engine.decrypt_file(&sealed.data, "alice").await.unwrap();
    assert!(outcome.plaintext.is_empty());
}

#[tokio::test]
async fn access_isolation_denies_without_derivation() {
    let (engine, derivations) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("greeting.txt"))
        .await
        .unwrap();

    let err = engine.decrypt_file(&sealed.data, "bob").await.unwrap_err();
    match err {
        SealError::AccessDenied { target, caller } => {
            assert_eq!(target, "alice");
            assert_eq!(caller, "bob");
        }
        other => panic!("expected AccessDenied, got {other:?}"),
    }

    assert_eq!(
        derivations.load(Ordering::SeqCst),
        0,
        "denied caller must not trigger a derivation round-trip"
    );
}

#[tokio::test]
async fn tampered_ciphertext_blocked_by_hash_check() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"sensitive payload", "alice", &info("doc.txt"))
        .await
        .unwrap();

    let mut data = sealed.data.clone();
    let last = data.len() - 1;
    data[last] ^= 0x01;

    let err = engine.decrypt_file(&data, "alice").await.unwrap_err();
    assert!(matches!(err, SealError::IntegrityViolation { .. }));
}

#[tokio::test]
async fn tampered_ciphertext_never_yields_plaintext_under_warn() {
    let (engine, _) = engine_with(IntegrityPolicy::Warn);

    let sealed = engine
        .encrypt_file(b"sensitive payload", "alice", &info("doc.txt"))
        .await
        .unwrap();

    // Under Warn the hash mismatch does not block, so the flipped byte has
    // to be caught by the capsule decoding or the AEAD tag instead
    let mut data = sealed.data.clone();
    let last = data.len() - 1;
    data[last] ^= 0x01;

    let err = engine.decrypt_file(&data, "alice").await.unwrap_err();
    assert!(matches!(err, SealError::DecryptionFailure));
}

#[tokio::test]
async fn corrupted_hash_field_blocks_by_default() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"payload", "alice", &info("doc.txt"))
        .await
        .unwrap();

    // Rewrite the container with a wrong hash but intact ciphertext
    let (mut meta, ciphertext) = container::decode(&sealed.data).unwrap();
    meta.hash = "00".repeat(32);
    let forged = container::encode(&meta, ciphertext).unwrap();

    let err = engine.decrypt_file(&forged, "alice").await.unwrap_err();
    match err {
        SealError::IntegrityViolation { expected, actual } => {
            assert_eq!(expected, "00".repeat(32));
            assert_ne!(actual, expected);
        }
        other => panic!("expected IntegrityViolation, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupted_hash_field_warns_and_recovers_under_warn() {
    let (engine, _) = engine_with(IntegrityPolicy::Warn);

    let sealed = engine
        .encrypt_file(b"payload", "alice", &info("doc.txt"))
        .await
        .unwrap();

    let (mut meta, ciphertext) = container::decode(&sealed.data).unwrap();
    meta.hash = "00".repeat(32);
    let forged = container::encode(&meta, ciphertext).unwrap();

    let outcome = engine.decrypt_file(&forged, "alice").await.unwrap();
    assert_eq!(outcome.plaintext, b"payload");
    assert!(!outcome.integrity.verified);
    let detail = outcome.integrity.detail.unwrap();
    assert!(detail.contains(&"00".repeat(32)));
}

#[tokio::test]
async fn derived_keys_are_cached_and_cleared() {
    let (engine, derivations) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"cached", "alice", &info("doc.txt"))
        .await
        .unwrap();

    engine.decrypt_file(&sealed.data, "alice").await.unwrap();
    engine.decrypt_file(&sealed.data, "alice").await.unwrap();
    assert_eq!(
        derivations.load(Ordering::SeqCst),
        1,
        "second decrypt must hit the cache"
    );
    assert_eq!(engine.cached_keys(), 1);

    engine.clear_key_cache();
    assert_eq!(engine.cached_keys(), 0);

    engine.decrypt_file(&sealed.data, "alice").await.unwrap();
    assert_eq!(
        derivations.load(Ordering::SeqCst),
        2,
        "decrypt after clear must re-derive"
    );
}

#[tokio::test]
async fn truncated_container_is_malformed_before_any_crypto() {
    let (engine, derivations) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("doc.txt"))
        .await
        .unwrap();

    // Keep the prefix and all but the last metadata byte
    let cut = ciphertext_offset(&sealed.data) - 1;
    let err = engine
        .decrypt_file(&sealed.data[..cut], "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, SealError::MalformedContainer(_)));

    // Exactly at the metadata boundary: parses structurally up to an empty
    // ciphertext region, which is still malformed
    let cut = ciphertext_offset(&sealed.data);
    let err = engine
        .decrypt_file(&sealed.data[..cut], "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, SealError::MalformedContainer(_)));

    assert_eq!(derivations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_scheme_version_is_rejected() {
    let (engine, derivations) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("doc.txt"))
        .await
        .unwrap();

    // A future-scheme container: bumped version byte with a consistent
    // hash, so it passes the integrity check and fails only on dispatch
    let (mut meta, ciphertext) = container::decode(&sealed.data).unwrap();
    let mut ciphertext = ciphertext.to_vec();
    ciphertext[0] = 0x02;
    meta.hash = idseal_crypto::sha256_hex(&ciphertext);
    let future_scheme = container::encode(&meta, &ciphertext).unwrap();

    let err = engine
        .decrypt_file(&future_scheme, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, SealError::UnsupportedVersion(_)));
    assert_eq!(derivations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_metadata_version_tag_is_rejected() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("doc.txt"))
        .await
        .unwrap();

    let (mut meta, ciphertext) = container::decode(&sealed.data).unwrap();
    meta.encryption_version = "IBE-v9".into();
    let future_tag = container::encode(&meta, ciphertext).unwrap();

    let err = engine.decrypt_file(&future_tag, "alice").await.unwrap_err();
    assert!(matches!(err, SealError::UnsupportedVersion(_)));
}

#[tokio::test]
async fn flipped_version_byte_reads_as_tampering() {
    let (engine, _) = engine_with(IntegrityPolicy::Block);

    let sealed = engine
        .encrypt_file(b"hello test", "alice", &info("doc.txt"))
        .await
        .unwrap();

    // Without a matching hash, a corrupted version byte is caught by the
    // integrity check like any other ciphertext flip
    let mut data = sealed.data.clone();
    let offset = ciphertext_offset(&data);
    data[offset] = 0x02;

    let err = engine.decrypt_file(&data, "alice").await.unwrap_err();
    assert!(matches!(err, SealError::IntegrityViolation { .. }));
}

#[tokio::test]
async fn sender_identity_is_recorded() {
    let authority = TestAuthority::new();
    let options = EngineOptions {
        local_identity: Some("bob".into()),
        ..Default::default()
    };
    let engine = SealEngine::new(authority, options);

    let sealed = engine
        .encrypt_file(b"from bob", "alice", &info("note.txt"))
        .await
        .unwrap();

    assert_eq!(sealed.metadata.encrypted_by.as_deref(), Some("bob"));
}
