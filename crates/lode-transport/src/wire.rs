//! Wire-protocol message envelope for the lode DHT.
//!
//! Every datagram carries exactly one [`Message`] envelope, serialized as a
//! single JSON object.
//!
//! ## Wire format
//!
//! ```text
//! Message {
//!     Type:    "PING" | "PONG" | "FIND_NODE_REQUEST" | "FIND_NODE_RESPONSE"
//!            | "STORE" | "STORE_RESPONSE" | "FIND_VALUE" | "FIND_VALUE_RESPONSE",
//!     From:    Contact { ID: hex40, Address: "host:port" },
//!     To:      Contact,
//!     Payload: per-type JSON value (absent for PING/PONG),
//!     RPCID:   hex40,
//! }
//! ```
//!
//! Payload shapes: lookup requests carry the target as a 40-character
//! lowercase hex string; `FIND_NODE_RESPONSE` carries a JSON array of
//! contacts; `STORE` carries the raw value string and `STORE_RESPONSE` a
//! boolean; `FIND_VALUE_RESPONSE` carries either a string (the value) or a
//! contact array, and the receiver distinguishes by shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lode_types::{Contact, NodeId};

use crate::TransportError;

/// Maximum serialized datagram size. Large enough for a
/// `FIND_NODE_RESPONSE` carrying 20 contacts or a STORE of an 8 KiB value
/// with JSON overhead.
pub const MAX_DATAGRAM_SIZE: usize = 16 * 1024;

/// The eight message kinds of the RPC protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "PONG")]
    Pong,
    #[serde(rename = "FIND_NODE_REQUEST")]
    FindNodeRequest,
    #[serde(rename = "FIND_NODE_RESPONSE")]
    FindNodeResponse,
    #[serde(rename = "STORE")]
    Store,
    #[serde(rename = "STORE_RESPONSE")]
    StoreResponse,
    #[serde(rename = "FIND_VALUE")]
    FindValue,
    #[serde(rename = "FIND_VALUE_RESPONSE")]
    FindValueResponse,
}

/// The shape a `FIND_VALUE_RESPONSE` payload resolved to.
#[derive(Clone, Debug)]
pub enum FindValueReply {
    /// The responder had the value.
    Value(String),
    /// The responder did not have the value and returned closer contacts.
    Contacts(Vec<Contact>),
}

/// One wire message. Requests and responses share the envelope; a response
/// echoes the request's `RPCID`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message kind.
    #[serde(rename = "Type")]
    pub message_type: MessageType,
    /// The sender's contact, used by the receiver to populate its routing
    /// table.
    #[serde(rename = "From")]
    pub from: Contact,
    /// The intended recipient.
    #[serde(rename = "To")]
    pub to: Contact,
    /// Per-type payload; `Null` for PING and PONG.
    #[serde(rename = "Payload", default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Correlation id, fresh and random per request.
    #[serde(rename = "RPCID")]
    pub rpc_id: NodeId,
}

impl Message {
    fn envelope(message_type: MessageType, from: Contact, to: Contact, rpc_id: NodeId) -> Self {
        Self {
            message_type,
            from,
            to,
            payload: Value::Null,
            rpc_id,
        }
    }

    /// Build a PING request.
    pub fn ping(from: Contact, rpc_id: NodeId, to: Contact) -> Self {
        Self::envelope(MessageType::Ping, from, to, rpc_id)
    }

    /// Build the PONG reply to a PING, echoing its `rpc_id`.
    pub fn pong(from: Contact, rpc_id: NodeId, to: Contact) -> Self {
        Self::envelope(MessageType::Pong, from, to, rpc_id)
    }

    /// Build a FIND_NODE request for `target`.
    pub fn find_node_request(
        from: Contact,
        rpc_id: NodeId,
        to: Contact,
        target: &NodeId,
    ) -> Self {
        let mut msg = Self::envelope(MessageType::FindNodeRequest, from, to, rpc_id);
        msg.payload = Value::String(target.to_hex());
        msg
    }

    /// Build a FIND_NODE response carrying the closest known contacts.
    pub fn find_node_response(
        from: Contact,
        rpc_id: NodeId,
        to: Contact,
        contacts: &[Contact],
    ) -> crate::Result<Self> {
        let mut msg = Self::envelope(MessageType::FindNodeResponse, from, to, rpc_id);
        msg.payload = serde_json::to_value(contacts)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(msg)
    }

    /// Build a FIND_VALUE request for `target`.
    pub fn find_value(from: Contact, rpc_id: NodeId, to: Contact, target: &NodeId) -> Self {
        let mut msg = Self::envelope(MessageType::FindValue, from, to, rpc_id);
        msg.payload = Value::String(target.to_hex());
        msg
    }

    /// Build a FIND_VALUE response carrying the value itself.
    pub fn find_value_response_with_value(
        from: Contact,
        rpc_id: NodeId,
        to: Contact,
        value: &str,
    ) -> Self {
        let mut msg = Self::envelope(MessageType::FindValueResponse, from, to, rpc_id);
        msg.payload = Value::String(value.to_string());
        msg
    }

    /// Build a FIND_VALUE response carrying closer contacts instead of the
    /// value.
    pub fn find_value_response_with_contacts(
        from: Contact,
        rpc_id: NodeId,
        to: Contact,
        contacts: &[Contact],
    ) -> crate::Result<Self> {
        let mut msg = Self::envelope(MessageType::FindValueResponse, from, to, rpc_id);
        msg.payload = serde_json::to_value(contacts)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(msg)
    }

    /// Build a STORE request carrying the raw value.
    pub fn store(from: Contact, rpc_id: NodeId, to: Contact, value: &str) -> Self {
        let mut msg = Self::envelope(MessageType::Store, from, to, rpc_id);
        msg.payload = Value::String(value.to_string());
        msg
    }

    /// Build a STORE response.
    pub fn store_response(from: Contact, rpc_id: NodeId, to: Contact, ok: bool) -> Self {
        let mut msg = Self::envelope(MessageType::StoreResponse, from, to, rpc_id);
        msg.payload = Value::Bool(ok);
        msg
    }

    /// Decode the payload of a lookup request as a target id.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if the payload is not a
    /// 40-character hex string.
    pub fn target(&self) -> crate::Result<NodeId> {
        let s = self
            .payload
            .as_str()
            .ok_or_else(|| TransportError::Deserialization("target payload is not a string".to_string()))?;
        NodeId::from_hex(s).map_err(|e| TransportError::Deserialization(e.to_string()))
    }

    /// Decode the payload as a contact list.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if the payload is not a
    /// contact array.
    pub fn contacts(&self) -> crate::Result<Vec<Contact>> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| TransportError::Deserialization(e.to_string()))
    }

    /// Decode the payload as a raw value string.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if the payload is not a
    /// string.
    pub fn value(&self) -> crate::Result<String> {
        self.payload
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TransportError::Deserialization("value payload is not a string".to_string()))
    }

    /// Decode a STORE_RESPONSE payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if the payload is not a
    /// boolean.
    pub fn store_ok(&self) -> crate::Result<bool> {
        self.payload
            .as_bool()
            .ok_or_else(|| TransportError::Deserialization("store payload is not a bool".to_string()))
    }

    /// Resolve a FIND_VALUE_RESPONSE payload by shape: a string is the
    /// value, anything else must parse as a contact array.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if neither shape fits.
    pub fn find_value_reply(&self) -> crate::Result<FindValueReply> {
        if let Some(value) = self.payload.as_str() {
            return Ok(FindValueReply::Value(value.to_string()));
        }
        self.contacts().map(FindValueReply::Contacts)
    }

    /// Serialize for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serialization`] on encoder failure and
    /// [`TransportError::ProtocolViolation`] if the result exceeds
    /// [`MAX_DATAGRAM_SIZE`].
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::ProtocolViolation(format!(
                "datagram too large: {} bytes, max {MAX_DATAGRAM_SIZE}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Deserialize a received datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deserialization`] if the bytes are not a
    /// valid envelope.
    pub fn from_bytes(data: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(data).map_err(|e| TransportError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(hex: &str, addr: &str) -> Contact {
        Contact::new(NodeId::from_hex(hex).expect("valid hex"), addr)
    }

    fn endpoints() -> (Contact, Contact) {
        (
            contact("1111111111111111111111111111111111111111", "10.0.0.1:8000"),
            contact("2222222222222222222222222222222222222222", "10.0.0.2:8000"),
        )
    }

    #[test]
    fn test_ping_roundtrip_and_field_names() {
        let (from, to) = endpoints();
        let rpc_id = NodeId::random();
        let msg = Message::ping(from.clone(), rpc_id, to);

        let bytes = msg.to_bytes().expect("serialize");
        let json: Value = serde_json::from_slice(&bytes).expect("valid json");
        assert_eq!(json["Type"], "PING");
        assert_eq!(json["From"]["ID"], from.id.to_hex());
        assert_eq!(json["RPCID"], rpc_id.to_hex());
        assert!(json.get("Payload").is_none(), "empty payload is omitted");

        let restored = Message::from_bytes(&bytes).expect("deserialize");
        assert_eq!(restored.message_type, MessageType::Ping);
        assert_eq!(restored.rpc_id, rpc_id);
    }

    #[test]
    fn test_find_node_request_target() {
        let (from, to) = endpoints();
        let target = NodeId::from_hex("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d").expect("hex");
        let msg = Message::find_node_request(from, NodeId::random(), to, &target);

        assert_eq!(msg.payload, Value::String(target.to_hex()));
        let bytes = msg.to_bytes().expect("serialize");
        let restored = Message::from_bytes(&bytes).expect("deserialize");
        assert_eq!(restored.target().expect("target"), target);
    }

    #[test]
    fn test_find_node_response_contacts() {
        let (from, to) = endpoints();
        let peers = vec![
            contact("3333333333333333333333333333333333333333", "10.0.0.3:8000"),
            contact("4444444444444444444444444444444444444444", "10.0.0.4:8000"),
        ];
        let msg = Message::find_node_response(from, NodeId::random(), to, &peers)
            .expect("build response");

        let bytes = msg.to_bytes().expect("serialize");
        let restored = Message::from_bytes(&bytes).expect("deserialize");
        let decoded = restored.contacts().expect("contacts");
        assert_eq!(decoded, peers);
    }

    #[test]
    fn test_find_value_reply_both_shapes() {
        let (from, to) = endpoints();

        let with_value = Message::find_value_response_with_value(
            from.clone(),
            NodeId::random(),
            to.clone(),
            "hello",
        );
        let reply = with_value.find_value_reply().expect("reply");
        assert!(matches!(reply, FindValueReply::Value(ref v) if v == "hello"));

        let peers = vec![contact(
            "3333333333333333333333333333333333333333",
            "10.0.0.3:8000",
        )];
        let with_contacts =
            Message::find_value_response_with_contacts(from, NodeId::random(), to, &peers)
                .expect("build response");
        let reply = with_contacts.find_value_reply().expect("reply");
        assert!(matches!(reply, FindValueReply::Contacts(ref c) if *c == peers));
    }

    #[test]
    fn test_store_roundtrip() {
        let (from, to) = endpoints();
        let msg = Message::store(from.clone(), NodeId::random(), to.clone(), "payload");
        assert_eq!(msg.value().expect("value"), "payload");

        let reply = Message::store_response(to, msg.rpc_id, from, true);
        assert!(reply.store_ok().expect("ok"));
    }

    #[test]
    fn test_oversized_datagram_rejected() {
        let (from, to) = endpoints();
        let huge = "x".repeat(MAX_DATAGRAM_SIZE);
        let msg = Message::store(from, NodeId::random(), to, &huge);
        assert!(matches!(
            msg.to_bytes(),
            Err(TransportError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_malformed_payload_shapes() {
        let (from, to) = endpoints();
        let msg = Message::ping(from, NodeId::random(), to);
        assert!(msg.target().is_err());
        assert!(msg.value().is_err());
        assert!(msg.store_ok().is_err());
        assert!(msg.contacts().is_err());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(Message::from_bytes(b"not json at all").is_err());
        assert!(Message::from_bytes(b"{\"Type\":\"NOPE\"}").is_err());
    }
}
