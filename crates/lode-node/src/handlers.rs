//! Server side of the RPC protocol.
//!
//! Every inbound message first feeds the sender's contact to the routing
//! table, then either answers a request or completes a pending one. Each
//! message arrives on its own task (spawned by the transport's receive
//! loop), so a slow peer cannot stall the node. Requests that cannot be
//! parsed are logged and dropped; the remote waiter times out on its own.

use std::sync::Arc;

use lode_dht::K;
use lode_transport::wire::{Message, MessageType};
use tracing::{debug, warn};

use crate::content_key;
use crate::node::NodeInner;

/// Route one inbound message.
pub(crate) async fn dispatch(inner: Arc<NodeInner>, msg: Message) {
    inner.routing.add_contact(msg.from.clone()).await;

    match msg.message_type {
        MessageType::Ping => handle_ping(&inner, msg).await,
        MessageType::FindNodeRequest => handle_find_node(&inner, msg).await,
        MessageType::FindValue => handle_find_value(&inner, msg).await,
        MessageType::Store => handle_store(&inner, msg).await,
        MessageType::Pong
        | MessageType::FindNodeResponse
        | MessageType::FindValueResponse
        | MessageType::StoreResponse => {
            inner.correlator.deliver(msg.rpc_id, msg).await;
        }
    }
}

async fn handle_ping(inner: &NodeInner, msg: Message) {
    debug!(peer = %msg.from.address, "PING");
    let pong = Message::pong(inner.self_contact.clone(), msg.rpc_id, msg.from.clone());
    reply(inner, &msg.from.address, &pong).await;
}

async fn handle_find_node(inner: &NodeInner, msg: Message) {
    let target = match msg.target() {
        Ok(target) => target,
        Err(e) => {
            warn!(peer = %msg.from.address, error = %e, "dropping FIND_NODE with bad target");
            return;
        }
    };

    let closest = inner.routing.find_closest(&target, K).await;
    match Message::find_node_response(
        inner.self_contact.clone(),
        msg.rpc_id,
        msg.from.clone(),
        &closest,
    ) {
        Ok(response) => reply(inner, &msg.from.address, &response).await,
        Err(e) => warn!(error = %e, "could not encode FIND_NODE response"),
    }
}

async fn handle_find_value(inner: &NodeInner, msg: Message) {
    let target = match msg.target() {
        Ok(target) => target,
        Err(e) => {
            warn!(peer = %msg.from.address, error = %e, "dropping FIND_VALUE with bad target");
            return;
        }
    };

    // Serve from the local store when we hold the value; otherwise hand
    // back the closest contacts we know, exactly like FIND_NODE.
    match inner.store.get(&target.to_hex()) {
        Ok(value) => {
            let response = Message::find_value_response_with_value(
                inner.self_contact.clone(),
                msg.rpc_id,
                msg.from.clone(),
                &value,
            );
            reply(inner, &msg.from.address, &response).await;
        }
        Err(_) => {
            let closest = inner.routing.find_closest(&target, K).await;
            match Message::find_value_response_with_contacts(
                inner.self_contact.clone(),
                msg.rpc_id,
                msg.from.clone(),
                &closest,
            ) {
                Ok(response) => reply(inner, &msg.from.address, &response).await,
                Err(e) => warn!(error = %e, "could not encode FIND_VALUE response"),
            }
        }
    }
}

async fn handle_store(inner: &NodeInner, msg: Message) {
    let value = match msg.value() {
        Ok(value) => value,
        Err(e) => {
            warn!(peer = %msg.from.address, error = %e, "dropping STORE with bad payload");
            return;
        }
    };

    // The key is derived here, never taken from the payload.
    let key = content_key(&value);
    let ok = match inner.store.put(&key.to_hex(), &value) {
        Ok(()) => true,
        Err(e) => {
            warn!(peer = %msg.from.address, key = %key, error = %e, "store rejected");
            false
        }
    };

    let response =
        Message::store_response(inner.self_contact.clone(), msg.rpc_id, msg.from.clone(), ok);
    reply(inner, &msg.from.address, &response).await;
}

async fn reply(inner: &NodeInner, addr: &str, msg: &Message) {
    if let Err(e) = inner.transport.send(addr, msg).await {
        warn!(peer = %addr, error = %e, "reply send failed");
    }
}
