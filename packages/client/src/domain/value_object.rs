//! Value Objects for the call domain.
//!
//! Every identifier and user-supplied text is validated once, on construction,
//! so the negotiation engine never has to re-check it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum length of participant ids, room ids and display names.
pub const MAX_ID_LENGTH: usize = 100;

/// Maximum length of a chat message in characters.
pub const MAX_CHAT_LENGTH: usize = 10_000;

fn validate_bounded(
    value: &str,
    empty: ValueObjectError,
    too_long: impl FnOnce(usize) -> ValueObjectError,
) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(empty);
    }
    let len = value.chars().count();
    if len > MAX_ID_LENGTH {
        return Err(too_long(len));
    }
    Ok(())
}

/// Stable participant identifier.
///
/// Participant ids are totally ordered; the order decides which side keeps the
/// offerer role when both participants offer at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        validate_bounded(&id, ValueObjectError::ParticipantIdEmpty, |actual| {
            ValueObjectError::ParticipantIdTooLong {
                max: MAX_ID_LENGTH,
                actual,
            }
        })?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier, the only addressing primitive of the signaling bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        validate_bounded(&id, ValueObjectError::RoomIdEmpty, |actual| {
            ValueObjectError::RoomIdTooLong {
                max: MAX_ID_LENGTH,
                actual,
            }
        })?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable name shown next to chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        validate_bounded(&name, ValueObjectError::DisplayNameEmpty, |actual| {
            ValueObjectError::DisplayNameTooLong {
                max: MAX_ID_LENGTH,
                actual,
            }
        })?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat message text.
///
/// Blank text (empty or whitespace only) is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatText(String);

impl ChatText {
    pub fn new(text: String) -> Result<Self, ValueObjectError> {
        if text.trim().is_empty() {
            return Err(ValueObjectError::ChatTextBlank);
        }
        let len = text.chars().count();
        if len > MAX_CHAT_LENGTH {
            return Err(ValueObjectError::ChatTextTooLong {
                max: MAX_CHAT_LENGTH,
                actual: len,
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Identifier of one offer/answer exchange.
///
/// Minted by the offerer; answers and candidates carry it so that messages
/// belonging to an abandoned exchange can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NegotiationId(Uuid);

impl NegotiationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn now() -> Self {
        Self(tsunagu_shared::time::get_jst_timestamp())
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_new_empty_fails() {
        // テスト項目: 空の参加者 ID は作成できない
        // when (操作):
        let result = ParticipantId::new(String::new());

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), ValueObjectError::ParticipantIdEmpty);
    }

    #[test]
    fn test_participant_id_ordering() {
        // テスト項目: 参加者 ID は辞書順で比較できる
        // given (前提条件):
        let alice = ParticipantId::new("alice".to_string()).unwrap();
        let bob = ParticipantId::new("bob".to_string()).unwrap();

        // then (期待する結果):
        assert!(alice < bob);
    }

    #[test]
    fn test_participant_id_deserialize_validates() {
        // テスト項目: デシリアライズ時にも検証が行われる
        // when (操作):
        let ok: Result<ParticipantId, _> = serde_json::from_str(r#""alice""#);
        let empty: Result<ParticipantId, _> = serde_json::from_str(r#""""#);

        // then (期待する結果):
        assert_eq!(ok.unwrap().as_str(), "alice");
        assert!(empty.is_err());
    }

    #[test]
    fn test_room_id_too_long_fails() {
        // テスト項目: 101 文字以上のルーム ID は作成できない
        // when (操作):
        let result = RoomId::new("r".repeat(101));

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            ValueObjectError::RoomIdTooLong {
                max: 100,
                actual: 101
            }
        );
    }

    #[test]
    fn test_chat_text_rejects_blank() {
        // テスト項目: 空白のみのチャットは作成できない
        // when (操作):
        let empty = ChatText::new(String::new());
        let blank = ChatText::new("  \n\t".to_string());

        // then (期待する結果):
        assert_eq!(empty.unwrap_err(), ValueObjectError::ChatTextBlank);
        assert_eq!(blank.unwrap_err(), ValueObjectError::ChatTextBlank);
    }

    #[test]
    fn test_chat_text_keeps_surrounding_whitespace() {
        // テスト項目: 有効なチャットは前後の空白も含めてそのまま保持される
        // when (操作):
        let text = ChatText::new(" hello ".to_string()).unwrap();

        // then (期待する結果):
        assert_eq!(text.as_str(), " hello ");
    }

    #[test]
    fn test_negotiation_ids_are_unique() {
        // テスト項目: ネゴシエーション ID は毎回異なる値が生成される
        // then (期待する結果):
        assert_ne!(NegotiationId::generate(), NegotiationId::generate());
    }
}
