//! One-time X25519 transport envelopes for authority responses
//!
//! A derivation request carries a fresh transport public key; the authority
//! answers with the derived key material sealed to it:
//! ```text
//! [32 bytes: authority ephemeral X25519 public key][12-byte nonce][AEAD ct+tag]
//! KEK = HKDF-SHA256(x25519(transport_sk, ephemeral_pk),
//!                   info = "idseal-transport-v1" || identity)
//! ```
//!
//! Binding the identity into the KEK info string means a response issued for
//! one identity cannot be replayed against a request for another, on top of
//! the one-time keypair already tying each response to a single request.

use x25519_dalek::{EphemeralSecret, PublicKey};

use hkdf::Hkdf;
use sha2::Sha256;

use crate::cipher;
use crate::error::CryptoError;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Size of a serialized X25519 public key
pub const TRANSPORT_PUBLIC_KEY_BYTES: usize = 32;

const TRANSPORT_DOMAIN: &[u8] = b"idseal-transport-v1";

/// An ephemeral transport keypair, generated fresh per derivation request.
///
/// [`TransportKeypair::open_response`] consumes `self`: a transport key
/// opens exactly one response and cannot be reused across requests.
pub struct TransportKeypair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl TransportKeypair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, as sent to the authority with the request.
    pub fn public_key_bytes(&self) -> [u8; TRANSPORT_PUBLIC_KEY_BYTES] {
        self.public.to_bytes()
    }

    /// Unwrap an authority response, recovering the raw key material.
    ///
    /// `identity` must be the same string the derivation was requested for.
    pub fn open_response(self, identity: &str, response: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if response.len() < TRANSPORT_PUBLIC_KEY_BYTES + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::KeyMaterial(format!(
                "authority response too short: {} bytes",
                response.len()
            )));
        }

        let (eph_bytes, framed) = response.split_at(TRANSPORT_PUBLIC_KEY_BYTES);
        let eph_arr: [u8; TRANSPORT_PUBLIC_KEY_BYTES] = eph_bytes
            .try_into()
            .map_err(|_| CryptoError::KeyMaterial("bad ephemeral key length".into()))?;

        let shared = self.secret.diffie_hellman(&PublicKey::from(eph_arr));
        let kek = derive_transport_kek(shared.as_bytes(), identity)?;

        cipher::decrypt_payload(&kek, framed).map_err(|_| {
            CryptoError::KeyMaterial(
                "authority response failed to decrypt under transport key".into(),
            )
        })
    }
}

impl std::fmt::Debug for TransportKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeypair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Authority side: seal derived key material to a caller's transport
/// public key.
pub fn seal_response(
    identity: &str,
    transport_public_key: &[u8],
    key_material: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let tp_arr: [u8; TRANSPORT_PUBLIC_KEY_BYTES] =
        transport_public_key.try_into().map_err(|_| {
            CryptoError::KeyMaterial(format!(
                "transport public key must be {} bytes, got {}",
                TRANSPORT_PUBLIC_KEY_BYTES,
                transport_public_key.len()
            ))
        })?;

    let eph = EphemeralSecret::random_from_rng(rand::thread_rng());
    let eph_public = PublicKey::from(&eph);
    let shared = eph.diffie_hellman(&PublicKey::from(tp_arr));
    let kek = derive_transport_kek(shared.as_bytes(), identity)?;

    let framed = cipher::encrypt_payload(&kek, key_material)?;

    let mut out = Vec::with_capacity(TRANSPORT_PUBLIC_KEY_BYTES + framed.len());
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&framed);
    Ok(out)
}

fn derive_transport_kek(
    shared: &[u8; 32],
    identity: &str,
) -> Result<[u8; KEY_SIZE], CryptoError> {
    let mut info = Vec::with_capacity(TRANSPORT_DOMAIN.len() + identity.len());
    info.extend_from_slice(TRANSPORT_DOMAIN);
    info.extend_from_slice(identity.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut kek = [0u8; KEY_SIZE];
    hkdf.expand(&info, &mut kek)
        .map_err(|e| CryptoError::KeyMaterial(format!("HKDF expand failed: {e}")))?;
    Ok(kek)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let transport = TransportKeypair::generate();
        let material = b"pretend user secret key bytes";

        let response =
            seal_response("alice", &transport.public_key_bytes(), material).unwrap();
        let opened = transport.open_response("alice", &response).unwrap();

        assert_eq!(opened, material);
    }

    #[test]
    fn identity_is_bound_into_envelope() {
        let transport = TransportKeypair::generate();
        let response =
            seal_response("alice", &transport.public_key_bytes(), b"material").unwrap();

        // Opening with a different identity string derives a different KEK
        let result = transport.open_response("mallory", &response);
        assert!(matches!(result, Err(CryptoError::KeyMaterial(_))));
    }

    #[test]
    fn response_for_other_transport_key_fails() {
        let intended = TransportKeypair::generate();
        let other = TransportKeypair::generate();

        let response =
            seal_response("alice", &intended.public_key_bytes(), b"material").unwrap();

        let result = other.open_response("alice", &response);
        assert!(matches!(result, Err(CryptoError::KeyMaterial(_))));
    }

    #[test]
    fn tampered_response_fails() {
        let transport = TransportKeypair::generate();
        let mut response =
            seal_response("alice", &transport.public_key_bytes(), b"material").unwrap();
        let last = response.len() - 1;
        response[last] ^= 0xFF;

        assert!(transport.open_response("alice", &response).is_err());
    }

    #[test]
    fn short_response_rejected() {
        let transport = TransportKeypair::generate();
        let result = transport.open_response("alice", &[0u8; 10]);
        assert!(matches!(result, Err(CryptoError::KeyMaterial(_))));
    }

    #[test]
    fn bad_transport_key_length_rejected() {
        let result = seal_response("alice", &[0u8; 31], b"material");
        assert!(matches!(result, Err(CryptoError::KeyMaterial(_))));
    }
}
