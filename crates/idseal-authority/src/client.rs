//! tonic client over a Unix domain socket, engine-compatible

use std::path::Path;

use anyhow::{Context, Result};
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use idseal_core::proto::key_authority_client::KeyAuthorityClient;
use idseal_core::proto::{DeriveKeyRequest, Empty};
use idseal_core::{SealError, SealResult, CALLER_METADATA_KEY};
use idseal_engine::KeyAuthority;

/// Engine-side client for a remote authority daemon.
///
/// Every request carries the caller identity token in metadata; the daemon
/// enforces it. Transport deadlines/retries are the channel's concern, not
/// this client's — terminal errors surface unchanged.
pub struct RemoteAuthority {
    client: KeyAuthorityClient<Channel>,
    caller: String,
}

impl RemoteAuthority {
    /// Connect to the daemon's Unix socket.
    pub async fn connect(socket_path: &Path, caller: impl Into<String>) -> Result<Self> {
        let path = socket_path.to_path_buf();

        // tonic over Unix domain socket: use a tower service_fn connector
        let channel = Endpoint::from_static("http://[::]:0")
            .connect_with_connector(service_fn(move |_: Uri| {
                let path = path.clone();
                async move {
                    let stream = tokio::net::UnixStream::connect(&path).await?;
                    Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(stream))
                }
            }))
            .await
            .with_context(|| format!("connecting to idseald at {}", socket_path.display()))?;

        Ok(Self {
            client: KeyAuthorityClient::new(channel),
            caller: caller.into(),
        })
    }

    fn with_caller<T>(&self, message: T) -> SealResult<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        let value = self.caller.parse().map_err(|_| {
            SealError::Authority("caller identity is not a valid metadata value".into())
        })?;
        request.metadata_mut().insert(CALLER_METADATA_KEY, value);
        Ok(request)
    }
}

impl KeyAuthority for RemoteAuthority {
    async fn system_public_key(&self) -> SealResult<Vec<u8>> {
        let mut client = self.client.clone();
        let response = client
            .get_system_public_key(tonic::Request::new(Empty {}))
            .await
            .map_err(status_err)?;
        Ok(response.into_inner().public_key)
    }

    async fn derive_key_material(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>> {
        let mut client = self.client.clone();
        let request = self.with_caller(DeriveKeyRequest {
            identity: identity.to_string(),
            transport_public_key: transport_public_key.to_vec(),
        })?;
        let response = client.derive_key_material(request).await.map_err(status_err)?;
        Ok(response.into_inner().encrypted_key)
    }
}

fn status_err(status: tonic::Status) -> SealError {
    SealError::Authority(format!("{:?}: {}", status.code(), status.message()))
}
