//! HTTP API integration tests.
//!
//! Tests for REST API endpoints (health check, room list, room details).

mod fixtures;
use std::time::Duration;

use fixtures::TestServer;
use tokio_tungstenite::connect_async;

#[tokio::test]
async fn test_health_endpoint() {
    // テスト項目: /api/health エンドポイントが正常に動作する
    // given (前提条件):
    let port = 19180;
    let server = TestServer::start(port);
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/health", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_rooms_list_empty_without_participants() {
    // テスト項目: 誰も接続していない場合、/api/rooms は空配列を返す
    // given (前提条件):
    let port = 19181;
    let server = TestServer::start(port);
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/rooms", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn test_rooms_list_and_detail_with_participant() {
    // テスト項目: 接続中の参加者がいるルームが一覧と詳細に現れる
    // given (前提条件):
    let port = 19182;
    let server = TestServer::start(port);
    let client = reqwest::Client::new();
    let (_ws, _) = connect_async(server.ws_url("consultation-1", "dr-sato"))
        .await
        .expect("Failed to connect");

    // when (操作):
    let rooms: serde_json::Value = client
        .get(format!("{}/api/rooms", server.base_url()))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    let detail = client
        .get(format!("{}/api/rooms/consultation-1", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    let rooms = rooms.as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], "consultation-1");
    assert_eq!(rooms[0]["participants"], serde_json::json!(["dr-sato"]));
    assert_eq!(rooms[0]["participant_capacity"], 2);
    assert!(rooms[0]["created_at"].is_string());

    assert_eq!(detail.status(), 200);
    let body: serde_json::Value = detail.json().await.expect("Failed to parse JSON");
    assert_eq!(body["id"], "consultation-1");
    let participants = body["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["client_id"], "dr-sato");
    // JST の RFC 3339 表記
    assert!(
        participants[0]["connected_at"]
            .as_str()
            .unwrap()
            .ends_with("+09:00")
    );
}

#[tokio::test]
async fn test_room_removed_after_last_participant_leaves() {
    // テスト項目: 最後の参加者が切断するとルームが一覧から消える
    // given (前提条件):
    let port = 19183;
    let server = TestServer::start(port);
    let client = reqwest::Client::new();
    let (mut ws, _) = connect_async(server.ws_url("R1", "alice"))
        .await
        .expect("Failed to connect");

    // when (操作):
    ws.close(None).await.expect("Failed to close");
    drop(ws);

    // then (期待する結果):
    let mut emptied = false;
    for _ in 0..50 {
        let body: serde_json::Value = client
            .get(format!("{}/api/rooms", server.base_url()))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        if body.as_array().is_some_and(|rooms| rooms.is_empty()) {
            emptied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(emptied, "room should be removed once empty");
}

#[tokio::test]
async fn test_room_detail_endpoint_not_found() {
    // テスト項目: /api/rooms/{room_id} エンドポイントが存在しないルームに対して404を返す
    // given (前提条件):
    let port = 19184;
    let server = TestServer::start(port);
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/rooms/nonexistent", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 404);
}
