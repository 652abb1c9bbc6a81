//! Identity-based hybrid encryption: Kiltz-Vahlis-1 KEM + AES-256-GCM DEM
//!
//! The IBE scheme itself (pairing math, master-key ceremony) comes from the
//! `ibe` crate; this module confines every call into that library so the
//! rest of the workspace only sees byte slices and [`DerivedKey`]s.
//!
//! Ciphertext layout (scheme version 0x01):
//! ```text
//! [1 byte: scheme version][KEM capsule, compressed][12-byte nonce][AEAD ct+tag]
//! ```
//!
//! The KEM shared secret never leaves this module; it is stretched into the
//! DEM key via HKDF-SHA256 under the domain string "idseal-dem-v1".

use hkdf::Hkdf;
use ibe::kem::kiltz_vahlis_one::{CipherText, KV1};
use ibe::kem::IBKEM;
use ibe::{Compress, Derive};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::cipher;
use crate::error::CryptoError;
use crate::KEY_SIZE;
use crate::{NONCE_SIZE, TAG_SIZE};

pub use ibe::kem::kiltz_vahlis_one::{
    PublicKey as SystemPublicKey, SecretKey as MasterSecretKey, UserSecretKey,
};

/// The KEM identity type (the scheme's associated `Id`).
type Identity = <KV1 as IBKEM>::Id;

/// Scheme version byte prefixed to every ciphertext
pub const SCHEME_VERSION: u8 = 0x01;

/// Compressed size of a KEM capsule
pub const CAPSULE_BYTES: usize = <CipherText as Compress>::OUTPUT_SIZE;

/// Compressed size of the system public parameters
pub const SYSTEM_PUBLIC_KEY_BYTES: usize = <SystemPublicKey as Compress>::OUTPUT_SIZE;

/// Compressed size of the master secret key
pub const MASTER_SECRET_KEY_BYTES: usize = <MasterSecretKey as Compress>::OUTPUT_SIZE;

/// Compressed size of an identity-bound user secret key
pub const USER_SECRET_KEY_BYTES: usize = <UserSecretKey as Compress>::OUTPUT_SIZE;

const DEM_DOMAIN: &[u8] = b"idseal-dem-v1";

/// Deserialize a compressed artifact, with a size check first.
macro_rules! parse_compressed {
    ($ty:ty, $bytes:expr, $what:expr, $err:ident) => {{
        let bytes: &[u8] = $bytes;
        let arr: [u8; <$ty as Compress>::OUTPUT_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::$err(format!(
                "{} must be {} bytes, got {}",
                $what,
                <$ty as Compress>::OUTPUT_SIZE,
                bytes.len()
            ))
        })?;
        Option::from(<$ty as Compress>::from_bytes(&arr))
            .ok_or_else(|| CryptoError::$err(format!("{} failed to deserialize", $what)))
    }};
}

/// An identity-bound user secret key as issued by the authority.
///
/// Never persisted or logged; zeroized on drop.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Deserialize into the usable KEM key.
    pub fn user_secret_key(&self) -> Result<UserSecretKey, CryptoError> {
        parse_compressed!(UserSecretKey, &self.bytes, "user secret key", KeyMaterial)
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate fresh master key material (authority-side ceremony).
pub fn setup_authority() -> (SystemPublicKey, MasterSecretKey) {
    KV1::setup(&mut rand::thread_rng())
}

/// Extract the user secret key for an identity (authority-side).
///
/// The identity string is bound into the derivation itself: the same
/// identity always yields a key for the same decapsulation slot, and no
/// other identity's key opens it.
pub fn extract_identity_key(
    pk: &SystemPublicKey,
    msk: &MasterSecretKey,
    identity: &str,
) -> UserSecretKey {
    let kid = Identity::derive(identity.as_bytes());
    KV1::extract_usk(Some(pk), msk, &kid, &mut rand::thread_rng())
}

pub fn serialize_public_key(pk: &SystemPublicKey) -> Vec<u8> {
    pk.to_bytes().to_vec()
}

pub fn serialize_master_secret_key(msk: &MasterSecretKey) -> Vec<u8> {
    msk.to_bytes().to_vec()
}

pub fn serialize_user_secret_key(usk: &UserSecretKey) -> Vec<u8> {
    usk.to_bytes().to_vec()
}

pub fn parse_public_key(bytes: &[u8]) -> Result<SystemPublicKey, CryptoError> {
    parse_compressed!(SystemPublicKey, bytes, "system public key", KeyMaterial)
}

pub fn parse_master_secret_key(bytes: &[u8]) -> Result<MasterSecretKey, CryptoError> {
    parse_compressed!(MasterSecretKey, bytes, "master secret key", KeyMaterial)
}

pub fn parse_user_secret_key(bytes: &[u8]) -> Result<UserSecretKey, CryptoError> {
    parse_compressed!(UserSecretKey, bytes, "user secret key", KeyMaterial)
}

/// Encrypt a plaintext for `identity` under the system public parameters.
///
/// Anyone holding the public parameters can seal for any identity; only the
/// holder of that identity's derived key can open the result.
pub fn seal(
    pk: &SystemPublicKey,
    identity: &str,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let kid = Identity::derive(identity.as_bytes());
    let (capsule, shared) = KV1::encaps(pk, &kid, &mut rand::thread_rng());

    let mut ss = shared.0;
    let dem_key = derive_dem_key(&ss[..])?;
    ss.zeroize();

    let body = cipher::encrypt_payload(&dem_key, plaintext)?;

    let mut out = Vec::with_capacity(1 + CAPSULE_BYTES + body.len());
    out.push(SCHEME_VERSION);
    out.extend_from_slice(&capsule.to_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Open a sealed ciphertext with an identity-bound user secret key.
///
/// A corrupted capsule or a key for the wrong identity both surface as
/// [`CryptoError::Authentication`] — the DEM tag is the arbiter, garbage
/// plaintext is never returned.
pub fn open(usk: &UserSecretKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let Some((&version, rest)) = ciphertext.split_first() else {
        return Err(CryptoError::Format("empty ciphertext".into()));
    };
    if version != SCHEME_VERSION {
        return Err(CryptoError::UnsupportedVersion(format!(
            "ciphertext scheme byte 0x{version:02x}"
        )));
    }
    if rest.len() < CAPSULE_BYTES + NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Format(format!(
            "ciphertext too short: {} bytes after version (minimum {})",
            rest.len(),
            CAPSULE_BYTES + NONCE_SIZE + TAG_SIZE
        )));
    }

    let (capsule_bytes, body) = rest.split_at(CAPSULE_BYTES);
    // A capsule that fails point decoding is tampered ciphertext, not a
    // framing error
    let capsule: CipherText =
        parse_compressed!(CipherText, capsule_bytes, "KEM capsule", KeyMaterial)
            .map_err(|_| CryptoError::Authentication)?;

    let shared = KV1::decaps(None, usk, &capsule).map_err(|_| CryptoError::Authentication)?;
    let mut ss = shared.0;
    let dem_key = derive_dem_key(&ss[..])?;
    ss.zeroize();

    cipher::decrypt_payload(&dem_key, body)
}

/// Check that a user secret key actually decapsulates for `identity` under
/// the given public parameters.
///
/// A test encapsulation must round-trip to the same shared secret; anything
/// else means the authority response was forged, replayed, or derived for a
/// different identity.
pub fn verify_identity_key(
    pk: &SystemPublicKey,
    identity: &str,
    usk: &UserSecretKey,
) -> bool {
    let kid = Identity::derive(identity.as_bytes());
    let (capsule, expected) = KV1::encaps(pk, &kid, &mut rand::thread_rng());
    let actual = KV1::decaps(None, usk, &capsule);
    actual.is_ok_and(|a| a == expected)
}

fn derive_dem_key(shared_secret: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(DEM_DOMAIN, &mut okm)
        .map_err(|e| CryptoError::KeyMaterial(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}
