//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 参加者の切断処理（参加者削除、空ルームの破棄）
//!
//! ### なぜこのテストが必要か
//! - 切断後も参加者が残ると、同じ client_id で再接続できなくなる
//! - 空になったルームが残り続けないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加者の切断
//! - エッジケース：最後の参加者の切断（ルーム破棄）
//! - 異常系：存在しない参加者の切断試行

use std::sync::Arc;

use crate::domain::{ClientId, RoomId, RoomRepository};

use super::error::DisconnectError;

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// 参加者切断を実行
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - ルームに残っている参加者数
    /// * `Err(DisconnectError)` - 参加者がルームにいなかった
    pub async fn execute(
        &self,
        room_id: &RoomId,
        client_id: &ClientId,
    ) -> Result<usize, DisconnectError> {
        self.repository
            .remove_participant(room_id, client_id)
            .await
            .map_err(|_| DisconnectError::NotConnected {
                room_id: room_id.to_string(),
                client_id: client_id.to_string(),
            })
    }
}
