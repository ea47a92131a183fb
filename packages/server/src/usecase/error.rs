//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{RepositoryError, RoomError};

/// 参加者接続時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// 同じ client_id が既にルームに接続している
    #[error("Client '{0}' is already connected to the room")]
    DuplicateClientId(String),

    /// ルームの参加者上限に達している
    #[error("Room '{0}' is full")]
    RoomCapacityExceeded(String),

    /// 上記以外の Repository エラー
    #[error(transparent)]
    Repository(RepositoryError),
}

/// 参加者切断時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisconnectError {
    /// ルームまたは参加者が見つからない
    #[error("Participant '{client_id}' is not in room '{room_id}'")]
    NotConnected { room_id: String, client_id: String },
}

/// シグナリング中継時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// 送信者がルームに参加していない
    #[error("Sender '{client_id}' is not in room '{room_id}'")]
    SenderNotInRoom { room_id: String, client_id: String },
}

impl ConnectError {
    /// Repository のエラーを接続エラーに変換
    pub(crate) fn from_repository(room_id: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::Room(RoomError::DuplicateParticipant(id)) => {
                Self::DuplicateClientId(id)
            }
            RepositoryError::Room(RoomError::CapacityExceeded { .. }) => {
                Self::RoomCapacityExceeded(room_id.to_string())
            }
            other => Self::Repository(other),
        }
    }
}
