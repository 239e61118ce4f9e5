//! A single k-bucket: a recency-ordered list of up to K contacts.

use lode_types::{Contact, NodeId};

use crate::K;

/// A bounded list of contacts sharing one distance-prefix class.
///
/// Index 0 is the most recently observed contact. Re-observing a known id
/// moves it to the front and adopts its latest address. When the bucket is
/// full a newcomer is dropped rather than evicting a long-lived entry
/// (Kademlia's preference for old nodes).
#[derive(Clone, Debug, Default)]
pub struct Bucket {
    contacts: Vec<Contact>,
}

impl Bucket {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self {
            contacts: Vec::with_capacity(K),
        }
    }

    /// Apply the insertion policy for an observed contact.
    pub fn add(&mut self, contact: Contact) {
        if let Some(pos) = self.contacts.iter().position(|c| c.id == contact.id) {
            let mut existing = self.contacts.remove(pos);
            // Last-seen address wins.
            existing.address = contact.address;
            self.contacts.insert(0, existing);
            return;
        }

        if self.contacts.len() < K {
            self.contacts.insert(0, contact);
        }
    }

    /// Copy every contact with its distance to `target` populated.
    pub fn snapshot_with_distance(&self, target: &NodeId) -> Vec<Contact> {
        self.contacts
            .iter()
            .map(|c| {
                let mut copy = c.clone();
                copy.set_distance(target);
                copy
            })
            .collect()
    }

    /// Number of contacts held.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the bucket holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Pick one contact uniformly at random, for bucket refresh.
    ///
    /// Returns `None` for an empty bucket so the caller can skip the
    /// refresh lookup.
    pub fn random_contact(&self) -> Option<Contact> {
        if self.contacts.is_empty() {
            return None;
        }
        let idx = rand::Rng::gen_range(&mut rand::thread_rng(), 0..self.contacts.len());
        self.contacts.get(idx).cloned()
    }
}
