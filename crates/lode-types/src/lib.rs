//! # lode-types
//!
//! Shared domain types for the lode DHT: the 160-bit node identifier and
//! the contact record every other crate routes by.
//!
//! ## Key Parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | Identifier width | 160 bits (20 bytes) |
//! | Hex form | 40 lowercase characters |
//! | Distance metric | XOR, compared as a 160-bit unsigned integer |

pub mod contact;
pub mod id;

pub use contact::Contact;
pub use id::{NodeId, ID_BITS, ID_LENGTH};

/// Error types for identifier parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The input is not a valid 40-character hex identifier.
    #[error("malformed node id: expected {ID_LENGTH} bytes as 40 hex characters, got {0:?}")]
    MalformedId(String),
}

/// Convenience result type for identifier operations.
pub type Result<T> = std::result::Result<T, TypesError>;
