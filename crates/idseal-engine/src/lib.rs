//! idseal-engine: the encrypt/decrypt orchestration layer
//!
//! Composes the codec and crypto primitives into the two end-to-end
//! operations callers see:
//!
//! ```text
//! encrypt: fetch system pk → IBE hybrid seal → hash ciphertext → frame container
//! decrypt: parse container → access gate → hash recheck → derive key → open
//! ```
//!
//! The authority is abstracted behind [`KeyAuthority`] so tests run against
//! an in-process master key holder and production runs against the gRPC
//! daemon, with identical orchestration either way.

pub mod access;
pub mod authority;
pub mod cache;
pub mod derivation;
pub mod engine;

pub use authority::KeyAuthority;
pub use cache::{KeyCache, DEFAULT_CACHE_CAPACITY};
pub use derivation::DerivationClient;
pub use engine::{
    DecryptOutcome, EngineOptions, FileInfo, IntegrityPolicy, IntegrityReport, SealEngine,
    SealedFile,
};

use idseal_core::SealError;
use idseal_crypto::CryptoError;

/// Map codec/cipher errors onto the protocol taxonomy.
pub(crate) fn crypto_err(e: CryptoError) -> SealError {
    match e {
        CryptoError::Format(msg) => SealError::MalformedContainer(msg),
        CryptoError::UnsupportedVersion(msg) => SealError::UnsupportedVersion(msg),
        CryptoError::Authentication => SealError::DecryptionFailure,
        CryptoError::KeyMaterial(msg) => SealError::KeyVerificationFailure(msg),
        CryptoError::Metadata(msg) => SealError::Metadata(msg),
    }
}
