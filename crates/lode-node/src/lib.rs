//! # lode-node
//!
//! The lode DHT engine: everything between the local API and the UDP
//! socket.
//!
//! This crate implements:
//! - RPC correlation: matching response datagrams to waiting requesters
//!   by random 160-bit RPC id, with bounded timeouts
//! - The four primitive RPCs (PING, FIND_NODE, FIND_VALUE, STORE), client
//!   and server side
//! - The iterative lookup algorithms (node lookup, value lookup with
//!   opportunistic caching, value store) and the join/refresh procedure
//! - [`Node`]: the assembly owning the routing table task, the value
//!   store, the transport, and the correlator
//!
//! ## Key Parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | RPC timeout | 3 seconds |
//! | K (result size) | 20 |
//! | alpha (lookup parallelism) | 3 |
//! | Content key | SHA-1 of the value |

pub mod correlator;
mod handlers;
mod iterative;
mod node;
mod rpc;

pub use node::Node;
pub use rpc::RPC_TIMEOUT;

use lode_types::{NodeId, ID_LENGTH};
use sha1::{Digest, Sha1};

/// Error types for node assembly.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The transport could not be set up.
    #[error("transport error: {0}")]
    Transport(#[from] lode_transport::TransportError),
}

/// Convenience result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// The content key of a value: its SHA-1 digest as a 160-bit id.
///
/// Both the storing side and every STORE handler derive the key this way;
/// it never travels in a payload.
pub fn content_key(value: &str) -> NodeId {
    let digest = Sha1::digest(value.as_bytes());
    let mut bytes = [0u8; ID_LENGTH];
    bytes.copy_from_slice(&digest);
    NodeId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_matches_known_sha1() {
        assert_eq!(
            content_key("hello").to_hex(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn test_content_key_is_deterministic() {
        assert_eq!(content_key("abc"), content_key("abc"));
        assert_ne!(content_key("abc"), content_key("abd"));
    }
}
