//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - ルームへの参加処理（ルーム作成、重複チェック、定員チェック）
//!
//! ### なぜこのテストが必要か
//! - 通話は 2 者間に限定されるため、3 人目の参加を確実に拒否する必要がある
//! - 同じ client_id の二重接続はシグナリングの宛先を曖昧にする
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規ルームへの参加、既存ルームへの参加
//! - 異常系：重複した client_id での接続試行
//! - エッジケース：ルームの定員超過

use std::sync::Arc;

use crate::domain::{ClientId, ClientSender, RoomId, RoomRepository, Timestamp};

use super::error::ConnectError;

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// 参加者接続を実行
    ///
    /// ルームが存在しない場合は作成されます。
    ///
    /// # Arguments
    ///
    /// * `room_id` - 参加するルームの ID
    /// * `client_id` - 接続するクライアントの ID
    /// * `sender` - 中継されたフレームをこのクライアントへ送るチャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(Timestamp)` - 接続成功（接続時刻）
    /// * `Err(ConnectError)` - 接続失敗
    pub async fn execute(
        &self,
        room_id: RoomId,
        client_id: ClientId,
        sender: ClientSender,
    ) -> Result<Timestamp, ConnectError> {
        let connected_at = Timestamp::now();
        let room_label = room_id.to_string();

        self.repository
            .add_participant(room_id, client_id, sender, connected_at)
            .await
            .map_err(|e| ConnectError::from_repository(&room_label, e))?;

        Ok(connected_at)
    }
}
