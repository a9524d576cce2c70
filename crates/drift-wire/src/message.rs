//! Message type and codec

use serde::{Deserialize, Serialize};

use drift_core::{DriftError, DriftResult, NodeId};

/// Node-to-node message carrying the sender's logical clock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    /// `None` when the payload did not name its sender
    pub sender: Option<NodeId>,
    pub clock: u64,
}

/// JSON shape on the wire. Missing fields decode as absent sender and clock 0.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<u64>,
    #[serde(default)]
    clock: u64,
}

impl Message {
    pub fn new(sender: NodeId, clock: u64) -> Self {
        Message {
            sender: Some(sender),
            clock,
        }
    }

    /// A message with no sender id
    pub fn anonymous(clock: u64) -> Self {
        Message {
            sender: None,
            clock,
        }
    }

    /// Serialize to the UTF-8 JSON payload
    pub fn encode(&self) -> DriftResult<Vec<u8>> {
        let wire = WireMessage {
            sender: self.sender.map(NodeId::as_u64),
            clock: self.clock,
        };
        serde_json::to_vec(&wire).map_err(|e| DriftError::Encode(e.to_string()))
    }

    /// Decode a complete connection payload.
    /// Unknown fields are ignored.
    pub fn decode(payload: &[u8]) -> DriftResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|e| DriftError::Decode(e.to_string()))?;
        let text = text.trim();
        // serde also accepts `[sender, clock]` for structs; the wire only allows objects
        if !text.starts_with('{') {
            return Err(DriftError::Decode("expected a JSON object".into()));
        }
        let wire: WireMessage =
            serde_json::from_str(text).map_err(|e| DriftError::Decode(e.to_string()))?;
        Ok(Message {
            sender: wire.sender.map(NodeId::new),
            clock: wire.clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_format() {
        let bytes = Message::new(NodeId::new(2), 41).encode().unwrap();
        assert_eq!(bytes, br#"{"sender":2,"clock":41}"#);
    }

    #[test]
    fn test_decode_with_whitespace() {
        let msg = Message::decode(b"{\"sender\": 1, \"clock\": 7}\n").unwrap();
        assert_eq!(msg, Message::new(NodeId::new(1), 7));
    }

    #[test]
    fn test_missing_clock_defaults_to_zero() {
        let msg = Message::decode(br#"{"sender":4}"#).unwrap();
        assert_eq!(msg.clock, 0);
        assert_eq!(msg.sender, Some(NodeId::new(4)));
    }

    #[test]
    fn test_missing_sender_decodes_as_anonymous() {
        assert_eq!(Message::decode(br#"{"clock":3}"#).unwrap(), Message::anonymous(3));
        assert_eq!(Message::decode(b"{}").unwrap(), Message::anonymous(0));
    }

    #[test]
    fn test_anonymous_encodes_without_sender() {
        let bytes = Message::anonymous(9).encode().unwrap();
        assert_eq!(bytes, br#"{"clock":9}"#);
        assert_eq!(Message::decode(&bytes).unwrap(), Message::anonymous(9));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let msg = Message::decode(br#"{"sender":1,"clock":3,"kind":"ping"}"#).unwrap();
        assert_eq!(msg, Message::new(NodeId::new(1), 3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Message::decode(b""), Err(DriftError::Decode(_))));
        assert!(matches!(Message::decode(b"not json"), Err(DriftError::Decode(_))));
        assert!(matches!(Message::decode(&[0xff, 0xfe]), Err(DriftError::Decode(_))));
        assert!(matches!(Message::decode(b"[1, 2]"), Err(DriftError::Decode(_))));
        assert!(matches!(
            Message::decode(br#"{"sender":"a","clock":3}"#),
            Err(DriftError::Decode(_))
        ));
        assert!(matches!(
            Message::decode(br#"{"sender":1,"clock":-3}"#),
            Err(DriftError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_two_messages_in_one_payload() {
        let payload = br#"{"sender":1,"clock":1}{"sender":1,"clock":2}"#;
        assert!(Message::decode(payload).is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(sender in any::<u64>(), clock in any::<u64>()) {
            let msg = Message::new(NodeId::new(sender), clock);
            let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
