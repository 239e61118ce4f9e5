//! # lode-dht
//!
//! Kademlia routing state for the lode DHT: k-buckets, the routing table
//! with its single owning task, and the shortlist state machine that drives
//! iterative lookups.
//!
//! ## Key Parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | K (bucket size, result size) | 20 |
//! | alpha (lookup parallelism) | 3 |
//! | Buckets | 160 (one per bit of the key space) |
//!
//! ## Ownership
//!
//! The routing table is mutable shared state touched by every inbound
//! message and every lookup round. It is owned by exactly one long-lived
//! task; all other components hold a [`routing::RoutingHandle`] and talk to
//! it over a request channel. No lock is ever taken on routing state.

pub mod bucket;
pub mod lookup;
pub mod routing;

/// Bucket capacity and lookup result size.
pub const K: usize = 20;

/// Lookup parallelism factor.
pub const ALPHA: usize = 3;

/// Number of buckets in the routing table, one per bit of the 160-bit
/// key space.
pub const NUM_BUCKETS: usize = lode_types::ID_BITS;
