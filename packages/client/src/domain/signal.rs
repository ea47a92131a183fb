//! Signaling wire protocol.
//!
//! Every message on the bus is a JSON object:
//!
//! ```json
//! {"sender_id":"alice","timestamp":1700000000000,"type":"offer","payload":{...}}
//! ```
//!
//! The bus delivers messages to every subscriber of a room, the sender
//! included, so receivers discard messages carrying their own `sender_id`.

use serde::{Deserialize, Serialize};

use super::value_object::{DisplayName, NegotiationId, ParticipantId, Timestamp};

/// Which side of the exchange produced a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description produced by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

/// Network-path candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceKind {
    /// Entered the room
    Join,
    /// Left the room
    Leave,
    /// Tore down its side of the call but stays in the room
    CallEnded,
}

/// Type-specific body of a [`SignalMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SignalPayload {
    Offer {
        negotiation_id: NegotiationId,
        description: SessionDescription,
    },
    Answer {
        negotiation_id: NegotiationId,
        description: SessionDescription,
    },
    IceCandidate {
        negotiation_id: NegotiationId,
        candidate: IceCandidate,
    },
    Chat {
        message_id: String,
        display_name: DisplayName,
        text: String,
    },
    Presence {
        presence: PresenceKind,
        display_name: DisplayName,
    },
}

impl SignalPayload {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Chat { .. } => "chat",
            Self::Presence { .. } => "presence",
        }
    }
}

/// A message published on the signaling bus. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub sender_id: ParticipantId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl SignalMessage {
    /// Stamp a payload with the sender and the current time.
    pub fn new(sender_id: ParticipantId, payload: SignalPayload) -> Self {
        Self {
            sender_id,
            timestamp: Timestamp::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::new("alice".to_string()).unwrap()
    }

    #[test]
    fn test_offer_wire_format() {
        // テスト項目: Offer が type / payload 形式の JSON になる
        // given (前提条件):
        let message = SignalMessage {
            sender_id: alice(),
            timestamp: Timestamp::new(1000),
            payload: SignalPayload::Offer {
                negotiation_id: NegotiationId::generate(),
                description: SessionDescription {
                    kind: SdpKind::Offer,
                    sdp: "v=0".to_string(),
                },
            },
        };

        // when (操作):
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "offer");
        assert_eq!(json["sender_id"], "alice");
        assert_eq!(json["timestamp"], 1000);
        assert_eq!(json["payload"]["description"]["kind"], "offer");
        assert_eq!(json["payload"]["description"]["sdp"], "v=0");
        assert!(json["payload"]["negotiation_id"].is_string());
    }

    #[test]
    fn test_presence_parses_from_json() {
        // テスト項目: 他の実装が送った Presence を解析できる
        // given (前提条件):
        let raw = r#"{
            "sender_id": "bob",
            "timestamp": 42,
            "type": "presence",
            "payload": {"presence": "call-ended", "display_name": "Bob"}
        }"#;

        // when (操作):
        let message: SignalMessage = serde_json::from_str(raw).unwrap();

        // then (期待する結果):
        assert_eq!(message.sender_id.as_str(), "bob");
        assert_eq!(
            message.payload,
            SignalPayload::Presence {
                presence: PresenceKind::CallEnded,
                display_name: DisplayName::new("Bob".to_string()).unwrap(),
            }
        );
    }

    #[test]
    fn test_candidate_optional_fields_omitted() {
        // テスト項目: 省略可能な候補フィールドは JSON に含まれない
        // given (前提条件):
        let candidate = IceCandidate {
            candidate: "candidate:1 1 udp 1 192.0.2.1 5000 typ host".to_string(),
            sdp_mid: None,
            sdp_m_line_index: None,
        };

        // when (操作):
        let json = serde_json::to_value(&candidate).unwrap();

        // then (期待する結果):
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_message_with_empty_sender_rejected() {
        // テスト項目: 送信者 ID が空のメッセージは解析エラーになる
        // given (前提条件):
        let raw = r#"{"sender_id":"","timestamp":1,"type":"chat",
            "payload":{"message_id":"m1","display_name":"Eve","text":"hi"}}"#;

        // when (操作):
        let result: Result<SignalMessage, _> = serde_json::from_str(raw);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
