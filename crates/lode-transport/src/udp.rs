//! UDP socket management and the receive loop.
//!
//! One [`UdpTransport`] wraps the node's single UDP socket. Sends may come
//! from any task; `tokio::net::UdpSocket` tolerates concurrent `send_to`.
//! The receive loop decodes each datagram and hands it to the dispatcher as
//! a freshly spawned task, so one slow handler never stalls reception.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::wire::Message;
use crate::TransportError;

/// Receive buffer size per datagram. Matches the wire layer's maximum
/// datagram size.
pub const RECV_BUFFER_SIZE: usize = crate::wire::MAX_DATAGRAM_SIZE;

/// Probe destination for advertised-address discovery. No packet is ever
/// sent to it; connecting a UDP socket only fixes the local endpoint.
const DISCOVERY_PROBE_ADDR: &str = "8.8.8.8:80";

/// The node's UDP endpoint.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    advertised: String,
}

impl UdpTransport {
    /// Bind `0.0.0.0:port` (port 0 for an ephemeral port) and discover the
    /// address to advertise in outgoing contacts.
    ///
    /// Discovery opens a dummy outbound socket and reads its local
    /// endpoint; if that fails the node advertises `127.0.0.1:port`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the socket cannot be bound.
    pub async fn bind(port: u16) -> crate::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|e| TransportError::Bind(format!("0.0.0.0:{port}: {e}")))?;

        let local_port = socket
            .local_addr()
            .map_err(|e| TransportError::Bind(e.to_string()))?
            .port();

        let ip = discover_local_ip()
            .await
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let advertised = format!("{ip}:{local_port}");
        debug!(%advertised, "udp transport bound");

        Ok(Self {
            socket: Arc::new(socket),
            advertised,
        })
    }

    /// The `host:port` this node puts in outgoing `Contact.address`. Fixed
    /// at construction, never renegotiated.
    pub fn advertised_address(&self) -> &str {
        &self.advertised
    }

    /// Serialize and send one message as a single datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the datagram cannot be sent, or a
    /// wire error if it cannot be encoded.
    pub async fn send(&self, addr: &str, msg: &Message) -> crate::Result<()> {
        let bytes = msg.to_bytes()?;
        self.socket
            .send_to(&bytes, addr)
            .await
            .map_err(|e| TransportError::Io(format!("send to {addr}: {e}")))?;
        Ok(())
    }

    /// Run the receive loop until the socket fails permanently.
    ///
    /// Each decoded message is dispatched on its own task. Malformed
    /// datagrams are logged and dropped.
    pub async fn run<F, Fut>(self: Arc<Self>, on_message: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "udp receive failed, stopping loop");
                    return;
                }
            };

            match Message::from_bytes(&buf[..len]) {
                Ok(msg) => {
                    tokio::spawn(on_message(msg));
                }
                Err(e) => {
                    warn!(%peer, error = %e, "dropping malformed datagram");
                }
            }
        }
    }
}

/// Local IP as seen by the routing table of the host, via a connected dummy
/// socket.
async fn discover_local_ip() -> Option<IpAddr> {
    let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    probe.connect(DISCOVERY_PROBE_ADDR).await.ok()?;
    probe.local_addr().ok().map(|addr| addr.ip())
}
