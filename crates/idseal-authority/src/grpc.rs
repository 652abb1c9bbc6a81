//! tonic gRPC service over a Unix domain socket

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

use idseal_core::proto::key_authority_server::{
    KeyAuthority as KeyAuthorityGrpc, KeyAuthorityServer,
};
use idseal_core::proto::{DeriveKeyRequest, DeriveKeyResponse, Empty, PublicKeyResponse};
use idseal_core::CALLER_METADATA_KEY;

use crate::local::LocalAuthority;

/// gRPC surface over a [`LocalAuthority`].
///
/// Derivations are only issued for the authenticated caller identity
/// carried in request metadata — the server-side mirror of the engine's
/// access gate.
pub struct KeyAuthorityService {
    authority: Arc<LocalAuthority>,
}

impl KeyAuthorityService {
    pub fn new(authority: LocalAuthority) -> Self {
        Self {
            authority: Arc::new(authority),
        }
    }
}

#[tonic::async_trait]
impl KeyAuthorityGrpc for KeyAuthorityService {
    async fn get_system_public_key(
        &self,
        _request: tonic::Request<Empty>,
    ) -> Result<tonic::Response<PublicKeyResponse>, tonic::Status> {
        Ok(tonic::Response::new(PublicKeyResponse {
            public_key: self.authority.public_key_bytes().to_vec(),
        }))
    }

    async fn derive_key_material(
        &self,
        request: tonic::Request<DeriveKeyRequest>,
    ) -> Result<tonic::Response<DeriveKeyResponse>, tonic::Status> {
        let caller = request
            .metadata()
            .get(CALLER_METADATA_KEY)
            .ok_or_else(|| tonic::Status::unauthenticated("missing caller identity"))?
            .to_str()
            .map_err(|_| tonic::Status::unauthenticated("caller identity is not valid ASCII"))?
            .to_string();

        let req = request.into_inner();
        if caller != req.identity {
            warn!(
                requested = %req.identity,
                caller = %caller,
                "refusing cross-identity derivation"
            );
            return Err(tonic::Status::permission_denied(format!(
                "key material for \"{}\" may only be derived by that identity",
                req.identity
            )));
        }

        let encrypted_key = self
            .authority
            .derive_response(&req.identity, &req.transport_public_key)
            .map_err(|e| tonic::Status::invalid_argument(e.to_string()))?;

        info!(identity = %req.identity, "derived key material");
        Ok(tonic::Response::new(DeriveKeyResponse { encrypted_key }))
    }
}

/// Serve the authority on a Unix domain socket until the task is aborted.
pub async fn serve_unix(authority: LocalAuthority, socket_path: &Path) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("removing stale socket {}", socket_path.display()))?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), "authority listening");

    Server::builder()
        .add_service(KeyAuthorityServer::new(KeyAuthorityService::new(authority)))
        .serve_with_incoming(UnixListenerStream::new(listener))
        .await
        .context("serving gRPC")?;

    Ok(())
}
