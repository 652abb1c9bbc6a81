//! In-process authority holding the master key material

use idseal_core::{SealError, SealResult};
use idseal_crypto::hybrid::{
    extract_identity_key, parse_master_secret_key, parse_public_key, serialize_master_secret_key,
    serialize_public_key, serialize_user_secret_key, setup_authority,
};
use idseal_crypto::transport::seal_response;
use idseal_engine::KeyAuthority;

/// Master key holder.
///
/// Keys are kept in their serialized form and parsed per operation; the
/// compressed encodings double as the at-rest format for the key file.
pub struct LocalAuthority {
    public_key: Vec<u8>,
    master_key: Vec<u8>,
    authenticated_caller: Option<String>,
}

impl LocalAuthority {
    /// Run the master key ceremony: fresh public parameters and master
    /// secret.
    pub fn generate() -> Self {
        let (pk, msk) = setup_authority();
        Self {
            public_key: serialize_public_key(&pk),
            master_key: serialize_master_secret_key(&msk),
            authenticated_caller: None,
        }
    }

    /// Rebuild from serialized key material (e.g. a loaded key file).
    /// Both halves are validated by a parse before the authority is
    /// handed out.
    pub fn from_key_material(public_key: Vec<u8>, master_key: Vec<u8>) -> SealResult<Self> {
        parse_public_key(&public_key).map_err(|e| SealError::Authority(e.to_string()))?;
        parse_master_secret_key(&master_key).map_err(|e| SealError::Authority(e.to_string()))?;
        Ok(Self {
            public_key,
            master_key,
            authenticated_caller: None,
        })
    }

    /// Pin the authenticated caller identity. With a caller set, the
    /// [`KeyAuthority`] impl refuses derivations for any other identity —
    /// the in-process mirror of the daemon's metadata check.
    pub fn with_authenticated_caller(mut self, caller: impl Into<String>) -> Self {
        self.authenticated_caller = Some(caller.into());
        self
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    pub fn master_key_bytes(&self) -> &[u8] {
        &self.master_key
    }

    /// Derive and seal key material for `identity`, with no caller check.
    ///
    /// Callers of this method own the enforcement decision: the trait impl
    /// checks `authenticated_caller`, the gRPC service checks request
    /// metadata.
    pub fn derive_response(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>> {
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

impl std::fmt::Debug for LocalAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthority")
            .field("public_key_len", &self.public_key.len())
            .field("master_key", &"[REDACTED]")
            .field("authenticated_caller", &self.authenticated_caller)
            .finish()
    }
}

impl KeyAuthority for LocalAuthority {
    async fn system_public_key(&self) -> SealResult<Vec<u8>> {
        Ok(self.public_key.clone())
    }

    async fn derive_key_material(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>> {
        if let Some(caller) = &self.authenticated_caller {
            if caller != identity {
                return Err(SealError::Authority(format!(
                    "access denied: key material for \"{identity}\" requested by caller \"{caller}\""
                )));
            }
        }
        self.derive_response(identity, transport_public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idseal_crypto::TransportKeypair;

    #[tokio::test]
    async fn serves_public_key_and_derives() {
        let authority = LocalAuthority::generate();
        let pk = authority.system_public_key().await.unwrap();
        assert!(!pk.is_empty());

        let transport = TransportKeypair::generate();
        let response = authority
            .derive_key_material("alice", &transport.public_key_bytes())
            .await
            .unwrap();
        let usk_bytes = transport.open_response("alice", &response).unwrap();
        assert!(!usk_bytes.is_empty());
    }

    #[tokio::test]
    async fn pinned_caller_blocks_foreign_identities() {
        let authority = LocalAuthority::generate().with_authenticated_caller("alice");
        let transport = TransportKeypair::generate();

        let err = authority
            .derive_key_material("bob", &transport.public_key_bytes())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));

        let ok = authority
            .derive_key_material("alice", &transport.public_key_bytes())
            .await;
        assert!(ok.is_ok());
    }

    #[test]
    fn key_material_roundtrip() {
        let authority = LocalAuthority::generate();
        let rebuilt = LocalAuthority::from_key_material(
            authority.public_key_bytes().to_vec(),
            authority.master_key_bytes().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt.public_key_bytes(), authority.public_key_bytes());
    }

    #[test]
    fn garbage_key_material_rejected() {
        let result = LocalAuthority::from_key_material(vec![1, 2, 3], vec![4, 5, 6]);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_master_key() {
        let authority = LocalAuthority::generate();
        let rendered = format!("{authority:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
