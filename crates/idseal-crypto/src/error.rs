use thiserror::Error;

/// Errors raised by the codec and cipher layers.
///
/// The orchestrator maps these onto the protocol-level taxonomy: `Format`
/// becomes a malformed-container rejection, `Authentication` a decryption
/// failure, `KeyMaterial` a key-verification failure.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Structural violation: short buffer, inconsistent length prefix,
    /// undecodable metadata block.
    #[error("format error: {0}")]
    Format(String),

    /// Unknown ciphertext scheme byte or metadata version tag.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// AEAD tag check failed: wrong key, corrupted or truncated input.
    #[error("authentication failed: wrong key or corrupted data")]
    Authentication,

    /// Key material could not be deserialized or failed validation.
    #[error("bad key material: {0}")]
    KeyMaterial(String),

    /// Metadata (de)serialization failure.
    #[error("metadata serialization: {0}")]
    Metadata(String),
}
