//! idseal-crypto: container codec and hybrid identity-based encryption
//!
//! Container wire format:
//! ```text
//! [4 bytes: big-endian u32 = metadata length N]
//! [N bytes: UTF-8 JSON metadata, sorted keys]
//! [remaining: ciphertext]
//!   ciphertext[0]  = scheme version (currently 0x01)
//!   ciphertext[1..] = IBE KEM capsule || [12-byte nonce][AES-GCM ct+tag]
//! ```
//!
//! Key flow:
//! ```text
//! encrypt: KV1 encaps(system pk, identity) → shared secret
//!            └── HKDF-SHA256 (domain "idseal-dem-v1") → AES-256-GCM key
//! decrypt: authority-issued user secret key → KV1 decaps(capsule)
//!            └── same HKDF → same AES-256-GCM key
//! transport: authority response wrapped under X25519(one-time transport key)
//!            └── HKDF-SHA256 (domain "idseal-transport-v1" || identity)
//! ```

pub mod cipher;
pub mod container;
pub mod error;
pub mod hash;
pub mod hybrid;
pub mod transport;

pub use cipher::{decrypt_payload, encrypt_payload};
pub use container::{ContainerMeta, CONTAINER_EXTENSION, ENCRYPTION_VERSION_TAG};
pub use error::CryptoError;
pub use hash::{fingerprint_hex, sha256_hex};
pub use hybrid::{DerivedKey, SCHEME_VERSION};
pub use transport::TransportKeypair;

/// Size of a DEM (bulk encryption) key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
