//! Encryption/decryption orchestrator

use std::time::{SystemTime, UNIX_EPOCH};

use idseal_core::{SealError, SealResult};
use idseal_crypto::{container, hash, hybrid};
use idseal_crypto::{ContainerMeta, ENCRYPTION_VERSION_TAG};

use crate::access;
use crate::authority::KeyAuthority;
use crate::cache::{KeyCache, DEFAULT_CACHE_CAPACITY};
use crate::crypto_err;
use crate::derivation::DerivationClient;

/// What to do when the stored ciphertext hash does not match.
///
/// The original system warned and kept decrypting; production posture is
/// to refuse. The choice is explicit configuration, never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Refuse to decrypt on a hash mismatch (default)
    #[default]
    Block,
    /// Log a warning, report the mismatch in the outcome, and continue —
    /// the AEAD tag remains the final arbiter
    Warn,
}

impl std::str::FromStr for IntegrityPolicy {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "warn" => Ok(Self::Warn),
            other => Err(SealError::Other(anyhow::anyhow!(
                "unknown integrity policy \"{other}\" (expected \"block\" or \"warn\")"
            ))),
        }
    }
}

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub integrity_policy: IntegrityPolicy,
    pub cache_capacity: usize,
    /// Identity recorded as `encryptedBy` on containers this engine seals
    pub local_identity: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            integrity_policy: IntegrityPolicy::Block,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            local_identity: None,
        }
    }
}

/// Caller-supplied facts about the plaintext being sealed.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    /// SHA-256 of the plaintext, if the caller computed one
    pub original_hash: Option<String>,
}

/// A freshly sealed container plus its metadata record (with
/// `finalEncryptedSize` filled in).
#[derive(Debug, Clone)]
pub struct SealedFile {
    pub data: Vec<u8>,
    pub metadata: ContainerMeta,
}

/// Result of the integrity recheck at decrypt time.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub verified: bool,
    pub detail: Option<String>,
}

/// A successful decryption: plaintext, the verified metadata it shipped
/// with, and the integrity recheck result.
#[derive(Debug, Clone)]
pub struct DecryptOutcome {
    pub plaintext: Vec<u8>,
    pub metadata: ContainerMeta,
    pub integrity: IntegrityReport,
}

/// The end-to-end orchestrator.
///
/// Owns the derivation client and key cache; generic over the authority so
/// tests and production share the exact same pipeline.
pub struct SealEngine<A> {
    derivation: DerivationClient<A>,
    cache: KeyCache,
    policy: IntegrityPolicy,
    local_identity: Option<String>,
}

impl<A: KeyAuthority> SealEngine<A> {
    pub fn new(authority: A, options: EngineOptions) -> Self {
        Self {
            derivation: DerivationClient::new(authority),
            cache: KeyCache::new(options.cache_capacity),
            policy: options.integrity_policy,
            local_identity: options.local_identity,
        }
    }

    /// Seal a plaintext for `target_identity`.
    ///
    /// Any step failure aborts the whole operation; no partial container
    /// is ever returned.
    pub async fn encrypt_file(
        &self,
        plaintext: &[u8],
        target_identity: &str,
        info: &FileInfo,
    ) -> SealResult<SealedFile> {
        let pk_bytes = self.derivation.system_public_key().await?;
        let pk = hybrid::parse_public_key(&pk_bytes).map_err(crypto_err)?;

        let ciphertext = hybrid::seal(&pk, target_identity, plaintext).map_err(crypto_err)?;
        let content_hash = hash::sha256_hex(&ciphertext);

        let mut metadata = ContainerMeta {
            original_name: info.name.clone(),
            original_size: plaintext.len() as u64,
            encrypted_size: ciphertext.len() as u64,
            user_id: target_identity.to_string(),
            encrypted_by: self.local_identity.clone(),
            timestamp: now_nanos(),
            hash: content_hash,
            original_hash: info.original_hash.clone(),
            encryption_version: ENCRYPTION_VERSION_TAG.to_string(),
            final_encrypted_size: None,
        };

        let data = container::encode(&metadata, &ciphertext).map_err(crypto_err)?;
        metadata.final_encrypted_size = Some(data.len() as u64);

        tracing::info!(
            target_identity,
            original_size = metadata.original_size,
            container_size = data.len(),
            "sealed container"
        );

        Ok(SealedFile { data, metadata })
    }

    /// Open a container on behalf of `caller_identity`.
    pub async fn decrypt_file(
        &self,
        data: &[u8],
        caller_identity: &str,
    ) -> SealResult<DecryptOutcome> {
        let (metadata, ciphertext) = container::decode(data).map_err(crypto_err)?;

        // Fail fast, before any derivation round-trip
        access::assert_authorized(caller_identity, &metadata)?;

        let actual_hash = hash::sha256_hex(ciphertext);
        let integrity = if actual_hash == metadata.hash {
            IntegrityReport {
                verified: true,
                detail: None,
            }
        } else {
            match self.policy {
                IntegrityPolicy::Block => {
                    return Err(SealError::IntegrityViolation {
                        expected: metadata.hash.clone(),
                        actual: actual_hash,
                    });
                }
                IntegrityPolicy::Warn => {
                    tracing::warn!(
                        expected = %metadata.hash,
                        actual = %actual_hash,
                        "ciphertext hash mismatch, continuing per policy"
                    );
                    IntegrityReport {
                        verified: false,
                        detail: Some(format!(
                            "ciphertext hash mismatch: expected {}, got {}",
                            metadata.hash, actual_hash
                        )),
                    }
                }
            }
        };

        // Version dispatch sits after the hash recheck so that a corrupted
        // version byte reads as tampering, not as a future scheme
        container::check_versions(&metadata, ciphertext).map_err(crypto_err)?;

        let derived = self.derive_cached(caller_identity).await?;
        let usk = derived
            .user_secret_key()
            .map_err(|e| SealError::KeyVerificationFailure(e.to_string()))?;

        let plaintext = hybrid::open(&usk, ciphertext).map_err(crypto_err)?;

        // The AEAD tag and content hash are the authoritative integrity
        // signals; a size mismatch alone is only worth a warning
        if plaintext.len() as u64 != metadata.original_size {
            tracing::warn!(
                declared = metadata.original_size,
                actual = plaintext.len(),
                "plaintext size differs from metadata"
            );
        }

        Ok(DecryptOutcome {
            plaintext,
            metadata,
            integrity,
        })
    }

    /// Purge every cached derived key. The next decrypt triggers a fresh
    /// authority round-trip.
    pub fn clear_key_cache(&self) {
        self.cache.clear();
        tracing::info!("key cache cleared");
    }

    /// Number of derived keys currently cached.
    pub fn cached_keys(&self) -> usize {
        self.cache.len()
    }

    async fn derive_cached(&self, identity: &str) -> SealResult<idseal_crypto::DerivedKey> {
        let pk_bytes = self.derivation.system_public_key().await?;
        let fingerprint = hash::fingerprint_hex(&pk_bytes);
        self.cache
            .get_or_derive(identity, &fingerprint, || {
                self.derivation.derive_key_for(identity)
            })
            .await
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
