//! Client-side view of the key-derivation authority

use idseal_core::SealResult;

/// The two operations the external key-derivation authority must provide.
///
/// Implementations are the in-process master key holder (tests, offline
/// use) and the gRPC client talking to the daemon. Transport concerns —
/// retries, deadlines, connection pooling — live behind the implementation;
/// the engine never retries on its own.
#[allow(async_fn_in_trait)]
pub trait KeyAuthority {
    /// Serialized long-lived public parameters. Idempotent and
    /// side-effect free; the derivation client caches the result for its
    /// own lifetime.
    async fn system_public_key(&self) -> SealResult<Vec<u8>>;

    /// Identity-bound key material, encrypted so that only the holder of
    /// the matching transport secret key can extract it.
    ///
    /// The authority must itself refuse identities other than the
    /// authenticated caller; the engine's access gate is the client-side
    /// half of that check.
    async fn derive_key_material(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>>;
}
