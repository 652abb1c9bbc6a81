use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

/// Error taxonomy for the container protocol.
///
/// All five protocol variants are terminal for the current operation and
/// are never retried inside the core. Transient transport errors reaching
/// the authority are the surrounding layer's concern and surface here as
/// [`SealError::Authority`].
#[derive(Debug, Error)]
pub enum SealError {
    /// Structural/framing violation: short prefix, inconsistent
    /// metadataLength, undecodable metadata, empty ciphertext region.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// Caller identity does not match the identity the container was
    /// encrypted for. Checked before any key derivation is attempted.
    #[error("access denied: container is encrypted for \"{target}\", caller identity is \"{caller}\"")]
    AccessDenied { target: String, caller: String },

    /// Recomputed ciphertext hash differs from the hash stamped at
    /// encryption time. Signals corruption/tampering, not a key problem.
    #[error("integrity violation: ciphertext hash mismatch (expected {expected}, got {actual})")]
    IntegrityViolation { expected: String, actual: String },

    /// The authority's response failed cryptographic verification:
    /// undecryptable transport envelope, malformed key material, or a key
    /// that does not decapsulate for the requested identity.
    #[error("key verification failure: {0}")]
    KeyVerificationFailure(String),

    /// Authenticated decryption failed (bad tag). Strongly suggests a
    /// wrong key or corrupted ciphertext.
    #[error("decryption failure: authentication tag check failed")]
    DecryptionFailure,

    /// Unknown ciphertext scheme version byte or metadata version tag.
    #[error("unsupported container version: {0}")]
    UnsupportedVersion(String),

    /// Errors from the key-derivation authority or its transport.
    #[error("authority error: {0}")]
    Authority(String),

    /// Metadata (de)serialization error.
    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
