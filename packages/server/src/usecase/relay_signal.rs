//! UseCase: シグナリングフレーム中継処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelaySignalUseCase::execute() メソッド
//! - 受信したフレームを同じルームの他の参加者へそのまま転送する処理
//!
//! ### なぜこのテストが必要か
//! - 中継サーバーはフレームの中身を解釈しない（変更せずに届ける）
//! - 送信者自身や他のルームへ漏れないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：相手参加者への転送
//! - エッジケース：相手がいない（転送先 0 件）、相手の送信チャンネルが閉じている
//! - 異常系：ルームに参加していない送信者

use std::sync::Arc;

use crate::domain::{ClientId, RoomId, RoomRepository, SignalFrame};

use super::error::RelayError;

/// 中継結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    /// フレームを受け渡せた参加者
    pub delivered: Vec<ClientId>,
    /// 送信チャンネルが閉じていた参加者
    pub failed: Vec<ClientId>,
}

/// シグナリング中継のユースケース
pub struct RelaySignalUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl RelaySignalUseCase {
    /// 新しい RelaySignalUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// フレームの中継を実行
    ///
    /// # Arguments
    ///
    /// * `room_id` - 送信者が参加しているルーム
    /// * `from` - 送信者
    /// * `frame` - 受信したフレーム（変更せずに転送される）
    pub async fn execute(
        &self,
        room_id: &RoomId,
        from: &ClientId,
        frame: SignalFrame,
    ) -> Result<RelayOutcome, RelayError> {
        let in_room = self
            .repository
            .get_room(room_id)
            .await
            .map(|room| room.get_participant(from).is_some())
            .unwrap_or(false);
        if !in_room {
            return Err(RelayError::SenderNotInRoom {
                room_id: room_id.to_string(),
                client_id: from.to_string(),
            });
        }

        let frame = frame.into_string();
        let mut outcome = RelayOutcome::default();
        for (peer_id, sender) in self.repository.get_peer_senders(room_id, from).await {
            if sender.send(frame.clone()).is_ok() {
                outcome.delivered.push(peer_id);
            } else {
                outcome.failed.push(peer_id);
            }
        }
        Ok(outcome)
    }
}
