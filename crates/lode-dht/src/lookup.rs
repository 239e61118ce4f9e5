//! Shortlist state for iterative lookups.
//!
//! An iterative lookup proceeds in rounds: pick up to alpha un-queried
//! contacts from the front of the shortlist, fan out RPCs, merge whatever
//! comes back, and stop when a round inserts nothing new. [`LookupState`]
//! holds the shortlist, the queried set, and (for value lookups) the
//! closest responder that did not have the value, so the round logic is
//! testable without any network.

use std::collections::HashSet;

use lode_types::{Contact, NodeId};

use crate::{ALPHA, K};

/// The evolving candidate set of one iterative lookup.
pub struct LookupState {
    target: NodeId,
    shortlist: Vec<Contact>,
    queried: HashSet<NodeId>,
    closest_without_value: Option<Contact>,
}

impl LookupState {
    /// Seed the shortlist, typically with the local table's closest
    /// contacts to `target`.
    pub fn new(target: NodeId, seeds: Vec<Contact>) -> Self {
        let mut state = Self {
            target,
            shortlist: Vec::new(),
            queried: HashSet::new(),
            closest_without_value: None,
        };
        state.merge(seeds);
        state
    }

    /// The lookup target.
    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Take up to alpha un-queried contacts from the front of the
    /// shortlist and mark them queried.
    ///
    /// An empty batch means the lookup has exhausted its candidates.
    pub fn pick_alpha(&mut self) -> Vec<Contact> {
        let mut batch = Vec::with_capacity(ALPHA);
        for contact in &self.shortlist {
            if batch.len() >= ALPHA {
                break;
            }
            if !self.queried.contains(&contact.id) {
                batch.push(contact.clone());
            }
        }
        for contact in &batch {
            self.queried.insert(contact.id);
        }
        batch
    }

    /// Merge a round's returned contacts into the shortlist.
    ///
    /// Each new id gets its distance to the target computed, the list is
    /// re-sorted ascending and truncated to K. Returns whether anything
    /// new was inserted, which is the lookup's progress condition.
    pub fn merge(&mut self, contacts: Vec<Contact>) -> bool {
        let mut progress = false;
        for mut contact in contacts {
            if self.shortlist.iter().any(|c| c.id == contact.id) {
                continue;
            }
            contact.set_distance(&self.target);
            self.shortlist.push(contact);
            progress = true;
        }

        self.shortlist.sort_by(|a, b| a.distance.cmp(&b.distance));
        self.shortlist.truncate(K);
        progress
    }

    /// Record a responder that did not hold the looked-up value, keeping
    /// only the closest such contact to the target.
    pub fn note_without_value(&mut self, contact: &Contact) {
        let mut candidate = contact.clone();
        candidate.set_distance(&self.target);
        match &self.closest_without_value {
            Some(best) if !candidate.is_closer_than(best) => {}
            _ => self.closest_without_value = Some(candidate),
        }
    }

    /// The closest responder seen so far without the value, if any. This
    /// is where a found value gets cached.
    pub fn cache_candidate(&self) -> Option<&Contact> {
        self.closest_without_value.as_ref()
    }

    /// The first `count` contacts of the shortlist.
    pub fn results(&self, count: usize) -> Vec<Contact> {
        self.shortlist.iter().take(count).cloned().collect()
    }
}
