//! Iterative lookups: the node-level operations built from rounds of
//! primitive RPCs.
//!
//! Each round takes up to alpha un-queried contacts from the front of the
//! shortlist, fans the RPCs out concurrently, and waits for all of them
//! (timeouts included) before merging. A round that inserts nothing new
//! ends the lookup, which bounds every operation: each round either
//! queries a fresh node or terminates, and the set of reachable nodes is
//! finite.

use lode_dht::lookup::LookupState;
use lode_dht::{ALPHA, K, NUM_BUCKETS};
use lode_transport::wire::FindValueReply;
use lode_types::{Contact, NodeId};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::node::Node;

impl Node {
    /// Locate the `K` closest reachable contacts to `target`.
    pub async fn iterative_find_node(&self, target: &NodeId) -> Vec<Contact> {
        let seeds = self.inner.routing.find_closest(target, ALPHA).await;
        let mut state = LookupState::new(*target, seeds);

        loop {
            let batch = state.pick_alpha();
            if batch.is_empty() {
                break;
            }

            let mut round = JoinSet::new();
            for contact in batch {
                let inner = self.inner.clone();
                let target = *target;
                round.spawn(async move { inner.find_node(&contact, &target).await });
            }

            let mut progress = false;
            while let Some(outcome) = round.join_next().await {
                let contacts = outcome.unwrap_or_default();
                if state.merge(self.without_self(contacts)) {
                    progress = true;
                }
            }

            if !progress {
                break;
            }
        }

        state.results(K)
    }

    /// Locate the value stored under `target`.
    ///
    /// On a hit, the value comes back with an empty contact list and a
    /// copy is cached (fire and forget) at the closest responder that did
    /// not have it. On a miss, the `K` closest contacts come back
    /// instead.
    pub async fn iterative_find_value(&self, target: &NodeId) -> (Vec<Contact>, Option<String>) {
        let seeds = self.inner.routing.find_closest(target, ALPHA).await;
        let mut state = LookupState::new(*target, seeds);

        loop {
            let batch = state.pick_alpha();
            if batch.is_empty() {
                break;
            }

            let mut round = JoinSet::new();
            for contact in batch {
                let inner = self.inner.clone();
                let target = *target;
                round.spawn(async move {
                    let reply = inner.find_value(&contact, &target).await;
                    (contact, reply)
                });
            }

            let mut progress = false;
            let mut found: Option<String> = None;
            while let Some(outcome) = round.join_next().await {
                let Ok((contact, reply)) = outcome else {
                    continue;
                };
                match reply {
                    Some(FindValueReply::Value(value)) => {
                        found = Some(value);
                    }
                    Some(FindValueReply::Contacts(contacts)) => {
                        // A responder without the value is a caching
                        // candidate.
                        state.note_without_value(&contact);
                        if state.merge(self.without_self(contacts)) {
                            progress = true;
                        }
                    }
                    None => {}
                }
            }

            if let Some(value) = found {
                self.cache_at_closest_miss(&state, &value);
                return (Vec::new(), Some(value));
            }

            if !progress {
                break;
            }
        }

        (state.results(K), None)
    }

    /// Store `value` on the `K` nodes closest to its content key.
    ///
    /// Returns the key's hex form and whether at least one peer accepted.
    pub async fn iterative_store(&self, value: &str) -> (String, bool) {
        let key = crate::content_key(value);
        let closest = self.iterative_find_node(&key).await;

        let mut successes = 0usize;
        for contact in &closest {
            if self.inner.store_at(contact, value).await {
                successes += 1;
            }
        }

        info!(key = %key, successes, candidates = closest.len(), "iterative store done");
        (key.to_hex(), successes > 0)
    }

    /// Enter the overlay through a known contact: learn neighbors by
    /// looking up our own id, then refresh every bucket farther out than
    /// the nearest neighbor.
    pub async fn join(&self, bootstrap: Contact) {
        info!(bootstrap = %bootstrap.address, "joining network");
        self.inner.routing.add_contact(bootstrap).await;

        let self_id = self.inner.self_contact.id;
        self.iterative_find_node(&self_id).await;

        let nearest = self.inner.routing.find_closest(&self_id, 1).await;
        if let Some(neighbor) = nearest.first() {
            let start = self.inner.routing.bucket_index(&neighbor.id);
            for index in (start + 1)..NUM_BUCKETS {
                self.refresh_bucket(index).await;
            }
        }
    }

    /// Refresh bucket `index` by looking up a random contact it holds.
    /// Empty buckets are skipped.
    pub async fn refresh_bucket(&self, index: usize) {
        if let Some(contact) = self.inner.routing.refresh_candidate(index).await {
            debug!(bucket = index, via = %contact.id, "refreshing bucket");
            self.iterative_find_node(&contact.id).await;
        }
    }

    /// Peers echo us back in their contact lists; the shortlist must hold
    /// only other nodes.
    fn without_self(&self, contacts: Vec<Contact>) -> Vec<Contact> {
        let self_id = self.inner.self_contact.id;
        contacts.into_iter().filter(|c| c.id != self_id).collect()
    }

    /// Spawn the opportunistic cache write so the caller gets its value
    /// without waiting on another STORE round trip.
    fn cache_at_closest_miss(&self, state: &LookupState, value: &str) {
        let Some(cache_target) = state.cache_candidate().cloned() else {
            return;
        };
        let inner = self.inner.clone();
        let value = value.to_string();
        tokio::spawn(async move {
            let ok = inner.store_at(&cache_target, &value).await;
            debug!(peer = %cache_target.address, ok, "opportunistic cache store");
        });
    }
}
