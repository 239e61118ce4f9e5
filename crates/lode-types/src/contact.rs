//! Contact records: the `(id, address)` pairs the routing layer trades in.

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A peer known to this node.
///
/// Identity is the `id` field alone: two contacts with the same id are the
/// same peer even when their addresses differ (the most recently observed
/// address wins). The `distance` field is transient scratch space, populated
/// only while a contact is being ranked against a lookup target; it never
/// crosses the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    /// The peer's 160-bit identifier.
    #[serde(rename = "ID")]
    pub id: NodeId,
    /// UDP endpoint as `host:port`.
    #[serde(rename = "Address")]
    pub address: String,
    /// Cached XOR distance to the current lookup target, if any.
    #[serde(skip)]
    pub distance: Option<NodeId>,
}

impl Contact {
    /// Create a contact with no cached distance.
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            distance: None,
        }
    }

    /// XOR distance from this contact's id to `target`.
    pub fn distance_to(&self, target: &NodeId) -> NodeId {
        self.id.xor(target)
    }

    /// Cache the distance to `target` on this contact.
    pub fn set_distance(&mut self, target: &NodeId) {
        self.distance = Some(self.distance_to(target));
    }

    /// Whether this contact's cached distance is smaller than `other`'s.
    ///
    /// Contacts without a cached distance sort last.
    pub fn is_closer_than(&self, other: &Contact) -> bool {
        match (&self.distance, &other.distance) {
            (Some(a), Some(b)) => a < b,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}
