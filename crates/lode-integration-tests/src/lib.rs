//! Integration test crate for the lode DHT.
//!
//! This crate has no library code; it only contains integration tests
//! that exercise multi-node protocol flows over real loopback UDP
//! sockets bound to ephemeral ports.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p lode-integration-tests
//! ```
