//! RPC correlation: fanning response datagrams back to their requesters.
//!
//! A single long-lived task owns the map from in-flight RPC id to waiter.
//! Requesters register a fresh random id and receive a one-shot channel;
//! the receive path delivers any response envelope to the matching waiter
//! and removes the entry. The first response wins: duplicates and
//! responses arriving after a timeout find no entry and are dropped.
//!
//! Requesters deregister on timeout, so sustained packet loss cannot grow
//! the pending map.

use std::collections::HashMap;

use lode_types::NodeId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use lode_transport::wire::Message;

/// Depth of the request channel feeding the correlator task.
const REQUEST_CHANNEL_DEPTH: usize = 64;

enum CorrelatorRequest {
    Register {
        rpc_id: NodeId,
        waiter: oneshot::Sender<Message>,
    },
    Deliver {
        rpc_id: NodeId,
        message: Message,
    },
    Deregister {
        rpc_id: NodeId,
    },
}

/// Cloneable front to the correlator task.
#[derive(Clone)]
pub struct CorrelatorHandle {
    tx: mpsc::Sender<CorrelatorRequest>,
}

impl CorrelatorHandle {
    /// Start the correlator task and return a handle to it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_DEPTH);
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Register a waiter for `rpc_id` and return the channel its response
    /// will arrive on.
    ///
    /// Exactly one waiter exists per id: ids are fresh 160-bit random
    /// values, so collisions do not occur in practice.
    pub async fn register(&self, rpc_id: NodeId) -> oneshot::Receiver<Message> {
        let (waiter, rx) = oneshot::channel();
        let req = CorrelatorRequest::Register { rpc_id, waiter };
        if self.tx.send(req).await.is_err() {
            warn!("correlator task gone, request will time out");
        }
        rx
    }

    /// Route a response envelope to the waiter registered for its id, if
    /// any. Unmatched responses are dropped.
    pub async fn deliver(&self, rpc_id: NodeId, message: Message) {
        let req = CorrelatorRequest::Deliver { rpc_id, message };
        if self.tx.send(req).await.is_err() {
            warn!("correlator task gone, dropping response");
        }
    }

    /// Remove the waiter for `rpc_id`. Called on the timeout branch of
    /// every primitive RPC so abandoned entries do not accumulate.
    pub async fn deregister(&self, rpc_id: NodeId) {
        let _ = self.tx.send(CorrelatorRequest::Deregister { rpc_id }).await;
    }
}

/// The correlator task: sole owner of the pending map.
async fn run(mut rx: mpsc::Receiver<CorrelatorRequest>) {
    let mut pending: HashMap<NodeId, oneshot::Sender<Message>> = HashMap::new();

    while let Some(req) = rx.recv().await {
        match req {
            CorrelatorRequest::Register { rpc_id, waiter } => {
                pending.insert(rpc_id, waiter);
            }
            CorrelatorRequest::Deliver { rpc_id, message } => {
                match pending.remove(&rpc_id) {
                    // The waiter may have given up between timeout and
                    // deregistration; a failed send is fine.
                    Some(waiter) => {
                        let _ = waiter.send(message);
                    }
                    None => {
                        debug!(rpc_id = %rpc_id, "dropping response with no waiter");
                    }
                }
            }
            CorrelatorRequest::Deregister { rpc_id } => {
                pending.remove(&rpc_id);
            }
        }
    }
}
