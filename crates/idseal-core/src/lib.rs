pub mod config;
pub mod error;

pub use error::{SealError, SealResult};

/// Generated gRPC types and service traits (from idseal.proto)
pub mod proto {
    tonic::include_proto!("idseal");
}

/// Request metadata key carrying the authenticated caller identity token.
///
/// The authentication protocol itself is out of scope; whatever session
/// layer fronts the daemon is expected to place a stable, comparable
/// identity token under this key.
pub const CALLER_METADATA_KEY: &str = "x-idseal-caller";
