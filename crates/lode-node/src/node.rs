//! Node assembly: one UDP socket, one routing task, one store, one
//! correlator.

use std::sync::Arc;
use std::time::Duration;

use lode_dht::routing::{RoutingHandle, RoutingTable};
use lode_store::KvStore;
use lode_transport::udp::UdpTransport;
use lode_types::{Contact, NodeId};
use tracing::info;

use crate::correlator::CorrelatorHandle;
use crate::handlers;

/// How often expired store entries are swept.
const STORE_CLEAN_INTERVAL: Duration = Duration::from_secs(3600);

/// Shared state behind every task a node runs. Handlers and lookups hold
/// an `Arc` of this; nothing points back at them.
pub(crate) struct NodeInner {
    pub(crate) self_contact: Contact,
    pub(crate) routing: RoutingHandle,
    pub(crate) store: KvStore,
    pub(crate) transport: Arc<UdpTransport>,
    pub(crate) correlator: CorrelatorHandle,
}

/// A running DHT node.
///
/// Cloning is cheap; all clones drive the same underlying node.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Arc<NodeInner>,
}

impl Node {
    /// Bind a node on `port` (0 for an ephemeral port), pick a random id,
    /// and start the receive loop, routing task, and correlator.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the UDP socket cannot be bound.
    pub async fn bind(port: u16) -> crate::Result<Self> {
        let transport = Arc::new(UdpTransport::bind(port).await?);
        let self_contact = Contact::new(NodeId::random(), transport.advertised_address());

        let routing = RoutingTable::new(self_contact.clone()).spawn();
        let correlator = CorrelatorHandle::spawn();

        let inner = Arc::new(NodeInner {
            self_contact: self_contact.clone(),
            routing,
            store: KvStore::new(),
            transport: transport.clone(),
            correlator,
        });

        let dispatch_target = inner.clone();
        tokio::spawn(
            transport.run(move |msg| handlers::dispatch(dispatch_target.clone(), msg)),
        );

        let janitor = inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STORE_CLEAN_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                janitor.store.clean();
            }
        });

        info!(id = %self_contact.id, address = %self_contact.address, "node up");
        Ok(Self { inner })
    }

    /// This node's own contact record.
    pub fn contact(&self) -> &Contact {
        &self.inner.self_contact
    }

    /// This node's identifier.
    pub fn id(&self) -> &NodeId {
        &self.inner.self_contact.id
    }

    /// The local value store.
    pub fn store(&self) -> &KvStore {
        &self.inner.store
    }

    /// PING a peer. Resolves to the peer's contact as learned from the
    /// PONG envelope, or `None` on timeout.
    pub async fn ping(&self, to: &Contact) -> Option<Contact> {
        self.inner.ping(to).await
    }

    /// Feed a known peer into the routing table.
    pub async fn add_contact(&self, contact: Contact) {
        self.inner.routing.add_contact(contact).await;
    }
}
