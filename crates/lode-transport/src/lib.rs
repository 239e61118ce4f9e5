//! # lode-transport
//!
//! UDP datagram transport for the lode DHT.
//!
//! This crate provides:
//!
//! - **Wire protocol** message envelope (JSON-serialized) via [`wire`]
//! - **UDP socket** management with advertised-address discovery and a
//!   receive loop via [`udp`]
//!
//! ## Architecture
//!
//! ```text
//! RPC layer
//!     |
//!     v
//! Message (wire.rs)   -- JSON envelope with Type, From, To, Payload, RPCID
//!     |
//!     v
//! UdpTransport (udp.rs) -- one datagram per message, handler task per inbound
//!     |
//!     v
//! UDP socket
//! ```

pub mod udp;
pub mod wire;

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The UDP socket could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// JSON deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Protocol violation (oversized datagram, wrong payload shape).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenience result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
