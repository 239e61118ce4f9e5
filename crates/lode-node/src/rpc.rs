//! Client side of the four primitive RPCs.
//!
//! Every primitive follows the same skeleton: register a fresh random RPC
//! id with the correlator, transmit the request datagram, then await the
//! waiter under a 3-second deadline. A timeout deregisters the entry and
//! yields the operation's empty result (no contact, empty list, `false`);
//! primitives never fail the lookup that issued them.

use std::time::Duration;

use lode_transport::wire::{FindValueReply, Message, MessageType};
use lode_types::{Contact, NodeId};
use tracing::{debug, warn};

use crate::node::NodeInner;

/// Deadline for a single request/response exchange.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(3);

impl NodeInner {
    /// Run one register → send → await exchange. `None` means timeout,
    /// send failure, or a response of the wrong type.
    async fn call(&self, to: &Contact, request: Message, expect: MessageType) -> Option<Message> {
        let rpc_id = request.rpc_id;
        let waiter = self.correlator.register(rpc_id).await;

        if let Err(e) = self.transport.send(&to.address, &request).await {
            warn!(peer = %to.address, error = %e, "request send failed");
            self.correlator.deregister(rpc_id).await;
            return None;
        }

        match tokio::time::timeout(RPC_TIMEOUT, waiter).await {
            Ok(Ok(response)) if response.message_type == expect => Some(response),
            Ok(Ok(response)) => {
                debug!(
                    peer = %to.address,
                    got = ?response.message_type,
                    "response of unexpected type"
                );
                None
            }
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(peer = %to.address, rpc_id = %rpc_id, "rpc timed out");
                self.correlator.deregister(rpc_id).await;
                None
            }
        }
    }

    /// PING: resolves to the peer's contact from the PONG envelope.
    pub(crate) async fn ping(&self, to: &Contact) -> Option<Contact> {
        let rpc_id = NodeId::random();
        let request = Message::ping(self.self_contact.clone(), rpc_id, to.clone());
        let response = self.call(to, request, MessageType::Pong).await?;
        Some(response.from)
    }

    /// FIND_NODE: the peer's closest known contacts to `target`. Empty on
    /// timeout or malformed response.
    pub(crate) async fn find_node(&self, to: &Contact, target: &NodeId) -> Vec<Contact> {
        let rpc_id = NodeId::random();
        let request =
            Message::find_node_request(self.self_contact.clone(), rpc_id, to.clone(), target);
        let Some(response) = self.call(to, request, MessageType::FindNodeResponse).await else {
            return Vec::new();
        };

        match response.contacts() {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(peer = %to.address, error = %e, "unreadable FIND_NODE response");
                Vec::new()
            }
        }
    }

    /// FIND_VALUE: either the value or closer contacts. `None` on timeout
    /// or malformed response.
    pub(crate) async fn find_value(
        &self,
        to: &Contact,
        target: &NodeId,
    ) -> Option<FindValueReply> {
        let rpc_id = NodeId::random();
        let request = Message::find_value(self.self_contact.clone(), rpc_id, to.clone(), target);
        let response = self
            .call(to, request, MessageType::FindValueResponse)
            .await?;

        match response.find_value_reply() {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(peer = %to.address, error = %e, "unreadable FIND_VALUE response");
                None
            }
        }
    }

    /// STORE: ship the raw value; the receiver derives the key itself.
    /// `false` on timeout or rejection.
    pub(crate) async fn store_at(&self, to: &Contact, value: &str) -> bool {
        let rpc_id = NodeId::random();
        let request = Message::store(self.self_contact.clone(), rpc_id, to.clone(), value);
        let Some(response) = self.call(to, request, MessageType::StoreResponse).await else {
            return false;
        };

        response.store_ok().unwrap_or(false)
    }
}
