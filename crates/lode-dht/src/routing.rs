//! The routing table and the task that owns it.
//!
//! [`RoutingTable`] is plain synchronous state: 160 buckets indexed by the
//! position of the most significant bit of the XOR distance to the local
//! node. [`RoutingTable::spawn`] moves the table into a dedicated task and
//! returns a cloneable [`RoutingHandle`]; every mutation and query travels
//! through the handle's request channel, so the table needs no lock and can
//! never be observed mid-update.

use lode_types::{Contact, NodeId};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::bucket::Bucket;
use crate::NUM_BUCKETS;

/// Depth of the request channel feeding the routing task.
const REQUEST_CHANNEL_DEPTH: usize = 64;

/// The Kademlia routing table.
pub struct RoutingTable {
    me: Contact,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Create a routing table that knows only the local contact.
    pub fn new(me: Contact) -> Self {
        let mut buckets = Vec::with_capacity(NUM_BUCKETS);
        for _ in 0..NUM_BUCKETS {
            buckets.push(Bucket::new());
        }
        Self { me, buckets }
    }

    /// The local contact.
    pub fn me(&self) -> &Contact {
        &self.me
    }

    /// Bucket index for an id: the MSB position of its distance to the
    /// local node, 0 (farthest class) through 159. The local id itself
    /// maps to 159.
    pub fn bucket_index(&self, id: &NodeId) -> usize {
        id.xor(&self.me.id).msb_index()
    }

    /// Insert or refresh a contact per the bucket policy.
    ///
    /// The local node is never stored in its own table.
    pub fn add_contact(&mut self, contact: Contact) {
        if contact.id == self.me.id {
            return;
        }
        let idx = self.bucket_index(&contact.id);
        self.buckets[idx].add(contact);
    }

    /// The `count` closest known contacts to `target`, ascending by XOR
    /// distance, each with its distance populated.
    ///
    /// Buckets are visited starting at the target's own index and walking
    /// outward (±1, ±2, …) until enough candidates are gathered; the final
    /// sort restores strict distance order across bucket boundaries. An
    /// empty table yields an empty list.
    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        if count == 0 {
            return Vec::new();
        }

        let start = self.bucket_index(target);
        let mut candidates = self.buckets[start].snapshot_with_distance(target);

        let mut offset = 1;
        while (start >= offset || start + offset < NUM_BUCKETS) && candidates.len() < count {
            if start >= offset {
                candidates.extend(self.buckets[start - offset].snapshot_with_distance(target));
            }
            if start + offset < NUM_BUCKETS {
                candidates.extend(self.buckets[start + offset].snapshot_with_distance(target));
            }
            offset += 1;
        }

        candidates.sort_by(|a, b| a.distance.cmp(&b.distance));
        candidates.truncate(count);
        candidates
    }

    /// A random member of bucket `index`, if the bucket is non-empty.
    pub fn refresh_candidate(&self, index: usize) -> Option<Contact> {
        self.buckets.get(index).and_then(Bucket::random_contact)
    }

    /// Total number of contacts across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Whether the table holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the table into its owning task and return a handle to it.
    pub fn spawn(self) -> RoutingHandle {
        let me = self.me.clone();
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_DEPTH);
        tokio::spawn(run(self, rx));
        RoutingHandle { tx, me }
    }
}

/// Requests accepted by the routing task.
enum RoutingRequest {
    AddContact(Contact),
    FindClosest {
        target: NodeId,
        count: usize,
        reply: oneshot::Sender<Vec<Contact>>,
    },
    RefreshCandidate {
        index: usize,
        reply: oneshot::Sender<Option<Contact>>,
    },
}

/// The routing task: drains requests until every handle is dropped.
async fn run(mut table: RoutingTable, mut rx: mpsc::Receiver<RoutingRequest>) {
    while let Some(req) = rx.recv().await {
        match req {
            RoutingRequest::AddContact(contact) => table.add_contact(contact),
            RoutingRequest::FindClosest {
                target,
                count,
                reply,
            } => {
                let _ = reply.send(table.find_closest(&target, count));
            }
            RoutingRequest::RefreshCandidate { index, reply } => {
                let _ = reply.send(table.refresh_candidate(index));
            }
        }
    }
}

/// Cloneable front to the routing task.
#[derive(Clone)]
pub struct RoutingHandle {
    tx: mpsc::Sender<RoutingRequest>,
    me: Contact,
}

impl RoutingHandle {
    /// The local contact.
    pub fn me(&self) -> &Contact {
        &self.me
    }

    /// Bucket index for an id relative to the local node.
    pub fn bucket_index(&self, id: &NodeId) -> usize {
        id.xor(&self.me.id).msb_index()
    }

    /// Submit a contact observation.
    pub async fn add_contact(&self, contact: Contact) {
        if self.tx.send(RoutingRequest::AddContact(contact)).await.is_err() {
            warn!("routing task gone, dropping contact observation");
        }
    }

    /// Query the `count` closest known contacts to `target`.
    ///
    /// Never fails: if the routing task is gone the result is empty.
    pub async fn find_closest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        let (reply, rx) = oneshot::channel();
        let req = RoutingRequest::FindClosest {
            target: *target,
            count,
            reply,
        };
        if self.tx.send(req).await.is_err() {
            warn!("routing task gone, find_closest returns empty");
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Pick a random contact from bucket `index` for a refresh lookup.
    pub async fn refresh_candidate(&self, index: usize) -> Option<Contact> {
        let (reply, rx) = oneshot::channel();
        let req = RoutingRequest::RefreshCandidate { index, reply };
        if self.tx.send(req).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::K;

    fn id(hex: &str) -> NodeId {
        NodeId::from_hex(hex).expect("valid hex")
    }

    fn zero_me() -> Contact {
        Contact::new(
            id("0000000000000000000000000000000000000000"),
            "localhost:8000",
        )
    }

    #[test]
    fn test_bucket_index_by_prefix() {
        let table = RoutingTable::new(zero_me());

        assert_eq!(
            table.bucket_index(&id("8000000000000000000000000000000000000000")),
            0
        );
        assert_eq!(
            table.bucket_index(&id("4000000000000000000000000000000000000000")),
            1
        );
        assert_eq!(
            table.bucket_index(&id("0100000000000000000000000000000000000000")),
            7
        );
        assert_eq!(
            table.bucket_index(&id("0000000000000000000000000000000000000001")),
            159
        );
        // Zero distance maps to the last bucket by convention.
        assert_eq!(
            table.bucket_index(&id("0000000000000000000000000000000000000000")),
            159
        );
    }

    #[test]
    fn test_add_contact_then_find_it() {
        let mut table = RoutingTable::new(zero_me());
        let c = Contact::new(id("8000000000000000000000000000000000000001"), "peer:1");
        table.add_contact(c.clone());

        let found = table.find_closest(&c.id, 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, c.id);
    }

    #[test]
    fn test_self_is_never_stored() {
        let mut table = RoutingTable::new(zero_me());
        table.add_contact(zero_me());
        assert!(table.is_empty());
    }

    #[test]
    fn test_find_closest_prefix_ordering() {
        let mut table = RoutingTable::new(zero_me());
        let far = Contact::new(id("f000000000000000000000000000000000000003"), "f:1");
        let mid = Contact::new(id("8000000000000000000000000000000000000001"), "8:1");
        let near = Contact::new(id("4000000000000000000000000000000000000002"), "4:1");
        table.add_contact(mid.clone());
        table.add_contact(near.clone());
        table.add_contact(far.clone());

        let target = id("f000000000000000000000000000000000000003");
        let found = table.find_closest(&target, 3);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].id, far.id);
        assert_eq!(found[1].id, mid.id);
        assert_eq!(found[2].id, near.id);
    }

    #[test]
    fn test_find_closest_on_empty_table() {
        let table = RoutingTable::new(zero_me());
        assert!(table.find_closest(&NodeId::random(), K).is_empty());
    }

    #[test]
    fn test_find_closest_returns_exact_k_smallest_sorted() {
        let mut table = RoutingTable::new(zero_me());
        let mut all: Vec<Contact> = Vec::new();
        for i in 0..100u32 {
            let c = Contact::new(NodeId::random(), format!("peer:{i}"));
            all.push(c.clone());
            table.add_contact(c);
        }

        let target = NodeId::random();
        let found = table.find_closest(&target, K);
        assert_eq!(found.len(), K);

        // Ascending by distance.
        for pair in found.windows(2) {
            let a = pair[0].id.xor(&target);
            let b = pair[1].id.xor(&target);
            assert!(a <= b, "results not sorted by distance");
        }

        // Exactly the K globally closest. Contacts landing in the same
        // bucket past capacity were dropped, so compare against what the
        // table actually retained.
        let mut retained = table.find_closest(&target, table.len());
        retained.sort_by_key(|c| c.id.xor(&target));
        let expected: Vec<NodeId> = retained.iter().take(K).map(|c| c.id).collect();
        let got: Vec<NodeId> = found.iter().map(|c| c.id).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_handle_roundtrip() {
        let handle = RoutingTable::new(zero_me()).spawn();
        let c = Contact::new(id("8000000000000000000000000000000000000001"), "peer:1");
        handle.add_contact(c.clone()).await;

        let found = handle.find_closest(&c.id, 1).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, c.id);

        let idx = handle.bucket_index(&c.id);
        let candidate = handle.refresh_candidate(idx).await;
        assert_eq!(candidate.map(|x| x.id), Some(c.id));
        assert!(handle.refresh_candidate(42).await.is_none());
    }
}
