//! Key derivation client: transport keys, authority calls, response
//! verification

use std::sync::{Arc, Mutex};

use idseal_core::{SealError, SealResult};
use idseal_crypto::hybrid;
use idseal_crypto::{DerivedKey, TransportKeypair};

use crate::authority::KeyAuthority;
use crate::crypto_err;

/// Wraps an authority with per-session public-parameter caching and the
/// full derive-and-verify sequence.
pub struct DerivationClient<A> {
    authority: A,
    system_pk: Mutex<Option<Arc<Vec<u8>>>>,
}

impl<A: KeyAuthority> DerivationClient<A> {
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            system_pk: Mutex::new(None),
        }
    }

    /// The authority's public parameters, fetched at most once per client
    /// lifetime. A concurrent double-fetch is possible and harmless — the
    /// call is idempotent.
    pub async fn system_public_key(&self) -> SealResult<Arc<Vec<u8>>> {
        if let Some(cached) = self.system_pk.lock().unwrap().clone() {
            return Ok(cached);
        }

        let bytes = self.authority.system_public_key().await?;
        if bytes.is_empty() {
            return Err(SealError::Authority(
                "authority returned an empty system public key".into(),
            ));
        }
        tracing::debug!(len = bytes.len(), "fetched system public key");

        let shared = Arc::new(bytes);
        *self.system_pk.lock().unwrap() = Some(shared.clone());
        Ok(shared)
    }

    /// Obtain and verify the identity-bound key for `identity`.
    ///
    /// A fresh transport keypair binds the response to this one request;
    /// the recovered key is then checked against the system public key and
    /// the same identity string before it is handed out. Any failure along
    /// that path is a [`SealError::KeyVerificationFailure`].
    pub async fn derive_key_for(&self, identity: &str) -> SealResult<DerivedKey> {
        let pk_bytes = self.system_public_key().await?;
        let pk = hybrid::parse_public_key(&pk_bytes).map_err(crypto_err)?;

        let transport = TransportKeypair::generate();
        tracing::debug!(identity, "requesting key derivation");
        let response = self
            .authority
            .derive_key_material(identity, &transport.public_key_bytes())
            .await?;

        let usk_bytes = transport
            .open_response(identity, &response)
            .map_err(|e| SealError::KeyVerificationFailure(e.to_string()))?;
        let usk = hybrid::parse_user_secret_key(&usk_bytes)
            .map_err(|e| SealError::KeyVerificationFailure(e.to_string()))?;

        if !hybrid::verify_identity_key(&pk, identity, &usk) {
            return Err(SealError::KeyVerificationFailure(format!(
                "derived key does not decapsulate for identity \"{identity}\""
            )));
        }

        Ok(DerivedKey::from_bytes(usk_bytes))
    }
}
