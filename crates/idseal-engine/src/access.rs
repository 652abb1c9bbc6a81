//! Access control gate

use idseal_core::{SealError, SealResult};
use idseal_crypto::ContainerMeta;

/// Refuse decryption unless the caller holds the identity the container
/// was encrypted for. Exact string equality, checked before any key
/// derivation is attempted, so unauthorized callers never trigger an
/// authority round-trip and get a clear error instead of a cryptographic
/// failure.
pub fn assert_authorized(caller_identity: &str, meta: &ContainerMeta) -> SealResult<()> {
    if caller_identity != meta.user_id {
        return Err(SealError::AccessDenied {
            target: meta.user_id.clone(),
            caller: caller_identity.to_string(),
        });
    }
    Ok(())
}
