//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! ルームは最初の参加者が接続した時点で作成され、最後の参加者が切断した時点で破棄されます。
//! シグナリングメッセージは保存しません（中継のみ）。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ClientId, ClientSender, DEFAULT_PARTICIPANT_CAPACITY, Participant, RepositoryError, Room,
    RoomId, RoomRepository, Timestamp,
};

/// 接続中のクライアント情報
pub struct ClientInfo {
    /// Message sender channel
    pub sender: ClientSender,
    /// Unix timestamp when connected (in JST, milliseconds)
    pub connected_at: Timestamp,
}

/// ルーム 1 つ分の状態（ドメインモデル + WebSocket sender）
struct RoomEntry {
    room: Room,
    clients: HashMap<ClientId, ClientInfo>,
}

/// インメモリ Room Repository 実装
///
/// ドメイン層の RoomRepository trait を実装します（依存性の逆転）。
pub struct InMemoryRoomRepository {
    rooms: Arc<Mutex<HashMap<RoomId, RoomEntry>>>,
    /// 新規ルームの参加者上限
    participant_capacity: usize,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PARTICIPANT_CAPACITY)
    }

    /// 参加者上限を指定して InMemoryRoomRepository を作成
    pub fn with_capacity(participant_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            participant_capacity,
        }
    }
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|entry| entry.room.clone())
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))
    }

    async fn get_rooms(&self) -> Vec<Room> {
        let rooms = self.rooms.lock().await;
        let mut list: Vec<Room> = rooms.values().map(|entry| entry.room.clone()).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    async fn add_participant(
        &self,
        room_id: RoomId,
        client_id: ClientId,
        sender: ClientSender,
        connected_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let entry = rooms.entry(room_id.clone()).or_insert_with(|| RoomEntry {
            room: Room::with_capacity(room_id.clone(), connected_at, self.participant_capacity),
            clients: HashMap::new(),
        });

        // First, try to add to room (domain model will handle validation)
        let result = entry
            .room
            .add_participant(Participant::new(client_id.clone(), connected_at));
        if let Err(e) = result {
            // Do not leave an empty room behind when the very first join fails
            if entry.room.is_empty() {
                rooms.remove(&room_id);
            }
            return Err(e.into());
        }

        // Only if room addition succeeds, register the sender
        entry.clients.insert(
            client_id,
            ClientInfo {
                sender,
                connected_at,
            },
        );
        Ok(())
    }

    async fn remove_participant(
        &self,
        room_id: &RoomId,
        client_id: &ClientId,
    ) -> Result<usize, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let entry = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;

        entry.clients.remove(client_id);
        if !entry.room.remove_participant(client_id) {
            return Err(RepositoryError::ParticipantNotFound(client_id.to_string()));
        }

        let remaining = entry.room.participants.len();
        if remaining == 0 {
            rooms.remove(room_id);
        }
        Ok(remaining)
    }

    async fn get_peer_senders(
        &self,
        room_id: &RoomId,
        exclude: &ClientId,
    ) -> Vec<(ClientId, ClientSender)> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|entry| {
                entry
                    .clients
                    .iter()
                    .filter(|(id, _)| *id != exclude)
                    .map(|(id, info)| (id.clone(), info.sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
