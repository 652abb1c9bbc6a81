//! idseal-authority: the key-derivation authority and its client
//!
//! The authority holds the IBE master secret and answers exactly two
//! operations: hand out the system public parameters, and derive
//! identity-bound key material sealed to a one-time transport key.
//!
//! Three front doors, one core:
//! - [`LocalAuthority`] — in-process, for tests and offline/dev use
//! - [`serve_unix`] + [`KeyAuthorityService`] — the daemon's gRPC surface
//! - [`RemoteAuthority`] — tonic client over a Unix socket, implementing
//!   the same [`idseal_engine::KeyAuthority`] trait as the local form

pub mod client;
pub mod grpc;
pub mod keyfile;
pub mod local;

pub use client::RemoteAuthority;
pub use grpc::{serve_unix, KeyAuthorityService};
pub use keyfile::MasterKeyFile;
pub use local::LocalAuthority;
