//! The 160-bit node identifier and its XOR metric.
//!
//! Identifiers address both nodes and stored values: a node picks a random
//! ID at startup, and a value lives at the SHA-1 of its content. Distance
//! between two identifiers is their bytewise XOR interpreted as a 160-bit
//! unsigned integer, so lexicographic byte comparison orders distances
//! correctly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TypesError;

/// Identifier length in bytes.
pub const ID_LENGTH: usize = 20;

/// Identifier length in bits (one routing bucket per bit).
pub const ID_BITS: usize = ID_LENGTH * 8;

/// A 160-bit identifier in the DHT key space.
///
/// Equality and ordering are lexicographic over the 20 bytes. On the wire
/// an identifier is always its 40-character lowercase hex form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId([u8; ID_LENGTH]);

impl NodeId {
    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a 40-character hex string (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::MalformedId`] if the input is not exactly 40
    /// hex characters.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != ID_LENGTH * 2 {
            return Err(TypesError::MalformedId(s.to_string()));
        }
        let raw = hex::decode(s).map_err(|_| TypesError::MalformedId(s.to_string()))?;
        let mut bytes = [0u8; ID_LENGTH];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Generate a uniformly random identifier.
    ///
    /// Uses the thread-local PRNG; identifiers are routing handles, not
    /// secrets, so non-cryptographic randomness is sufficient.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_LENGTH];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// XOR distance to another identifier.
    pub fn xor(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; ID_LENGTH];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        NodeId(out)
    }

    /// Index of the most significant set bit, numbered 0 (MSB) to 159 (LSB).
    ///
    /// A zero value maps to 159 by convention, so a node's own ID lands in
    /// the last bucket.
    pub fn msb_index(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }
        ID_BITS - 1
    }

    /// Lowercase 40-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NodeId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_known_bytes() {
        let id = NodeId::from_hex("4142434445464748494a4b4c4d4e4f5051525354").expect("valid hex");
        assert_eq!(&id.as_bytes()[..4], &[0x41, 0x42, 0x43, 0x44]);
        assert_eq!(id.as_bytes()[19], 0x54);
    }

    #[test]
    fn test_from_hex_case_insensitive() {
        let lower = NodeId::from_hex("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef").expect("lower");
        let upper = NodeId::from_hex("DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF").expect("upper");
        assert_eq!(lower, upper);
        assert_eq!(upper.to_hex(), "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(NodeId::from_hex("").is_err());
        assert!(NodeId::from_hex("abcd").is_err());
        // 39 characters
        assert!(NodeId::from_hex(&"a".repeat(39)).is_err());
        // 41 characters
        assert!(NodeId::from_hex(&"a".repeat(41)).is_err());
        // Right length, not hex
        assert!(NodeId::from_hex(&"g".repeat(40)).is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let s = "00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff";
        let id = NodeId::from_hex(s).expect("valid hex");
        assert_eq!(id.to_hex(), s);
    }

    #[test]
    fn test_random_ids_differ() {
        let a = NodeId::random();
        let b = NodeId::random();
        // Two identical 160-bit draws in a row would be astronomically
        // unlikely.
        assert_ne!(a, b);
    }

    #[test]
    fn test_xor_properties() {
        let a = NodeId::from_hex("ffffffffffffffffffffffffffffffffffffffff").expect("valid hex");
        let zero = NodeId::from_bytes([0u8; ID_LENGTH]);
        assert_eq!(a.xor(&a), zero);
        assert_eq!(a.xor(&zero), a);

        let b = NodeId::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").expect("valid hex");
        let c = NodeId::from_hex("5555555555555555555555555555555555555555").expect("valid hex");
        assert_eq!(b.xor(&c), a);
        assert_eq!(b.xor(&c), c.xor(&b));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let small = NodeId::from_hex("000000000000000000000000000000000000000a").expect("valid");
        let big = NodeId::from_hex("000000000000000000000000000000000000000b").expect("valid");
        assert!(small < big);
        assert!(!(big < small));
        assert!(!(small < small));
    }

    #[test]
    fn test_msb_index() {
        let mut bytes = [0u8; ID_LENGTH];
        assert_eq!(NodeId::from_bytes(bytes).msb_index(), 159);

        bytes[0] = 0x80;
        assert_eq!(NodeId::from_bytes(bytes).msb_index(), 0);

        bytes[0] = 0x01;
        assert_eq!(NodeId::from_bytes(bytes).msb_index(), 7);

        let mut second = [0u8; ID_LENGTH];
        second[1] = 0x01;
        assert_eq!(NodeId::from_bytes(second).msb_index(), 15);

        let mut last = [0u8; ID_LENGTH];
        last[19] = 0x01;
        assert_eq!(NodeId::from_bytes(last).msb_index(), 159);
    }

    #[test]
    fn test_serde_hex_string() {
        let id = NodeId::from_hex("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d").expect("valid hex");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\"");

        let restored: NodeId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, id);

        let bad: std::result::Result<NodeId, _> = serde_json::from_str("\"zz\"");
        assert!(bad.is_err());
    }
}
