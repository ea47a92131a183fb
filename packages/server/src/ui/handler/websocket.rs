//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{ClientId, RoomId, RoomRepository, SignalFrame},
    infrastructure::dto::websocket::ConnectQuery,
    ui::state::AppState,
    usecase::{
        ConnectError, ConnectParticipantUseCase, DisconnectParticipantUseCase, RelaySignalUseCase,
    },
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> Domain Models
    let room_id = RoomId::try_from(query.room_id.clone()).map_err(|e| {
        tracing::warn!("Invalid room_id '{}': {}", query.room_id, e);
        StatusCode::BAD_REQUEST
    })?;
    let client_id = ClientId::try_from(query.client_id.clone()).map_err(|e| {
        tracing::warn!("Invalid client_id '{}': {}", query.client_id, e);
        StatusCode::BAD_REQUEST
    })?;

    // Create a channel for this client to receive relayed frames
    let (tx, rx) = mpsc::unbounded_channel();

    let connect_usecase = ConnectParticipantUseCase::new(state.repository.clone());
    match connect_usecase
        .execute(room_id.clone(), client_id.clone(), tx)
        .await
    {
        Ok(_) => {
            tracing::info!(room_id = %room_id, client_id = %client_id, "Client joined room");
        }
        Err(ConnectError::DuplicateClientId(_)) => {
            tracing::warn!(
                room_id = %room_id,
                client_id = %client_id,
                "Client is already connected. Rejecting connection."
            );
            return Err(StatusCode::CONFLICT);
        }
        Err(ConnectError::RoomCapacityExceeded(_)) => {
            tracing::warn!(
                room_id = %room_id,
                client_id = %client_id,
                "Room is full. Rejecting connection."
            );
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        Err(e @ ConnectError::Repository(_)) => {
            tracing::error!(
                room_id = %room_id,
                client_id = %client_id,
                "Failed to register participant: {}",
                e
            );
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    // The participant is registered before the upgrade completes, so a failed
    // handshake must release the slot.
    let repository = state.repository.clone();
    let (failed_room, failed_client) = (room_id.clone(), client_id.clone());
    let ws = ws.on_failed_upgrade(move |e| {
        tracing::warn!(client_id = %failed_client, "WebSocket upgrade failed: {}", e);
        tokio::spawn(async move {
            disconnect(repository, &failed_room, &failed_client).await;
        });
    });

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, client_id, rx)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
    client_id: ClientId,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let relay_usecase = RelaySignalUseCase::new(state.repository.clone());
    let (recv_room, recv_client) = (room_id.clone(), client_id.clone());

    // Spawn a task to receive frames from this client and relay them
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(client_id = %recv_client, "WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let frame = match SignalFrame::try_from(text.to_string()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(client_id = %recv_client, "Dropping frame: {}", e);
                            continue;
                        }
                    };

                    match relay_usecase.execute(&recv_room, &recv_client, frame).await {
                        Ok(outcome) => {
                            tracing::debug!(
                                room_id = %recv_room,
                                from = %recv_client,
                                delivered = outcome.delivered.len(),
                                "Relayed frame"
                            );
                            for peer in outcome.failed {
                                tracing::warn!(
                                    room_id = %recv_room,
                                    peer = %peer,
                                    "Failed to relay frame to peer"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to relay frame: {}", e);
                        }
                    }
                }
                Message::Binary(_) => {
                    tracing::warn!(client_id = %recv_client, "Ignoring binary frame");
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %recv_client, "Client requested close");
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    });

    // Spawn a task to forward relayed frames to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    disconnect(state.repository.clone(), &room_id, &client_id).await;
}

async fn disconnect(repository: Arc<dyn RoomRepository>, room_id: &RoomId, client_id: &ClientId) {
    let disconnect_usecase = DisconnectParticipantUseCase::new(repository);
    match disconnect_usecase.execute(room_id, client_id).await {
        Ok(remaining) => {
            tracing::info!(
                room_id = %room_id,
                client_id = %client_id,
                remaining,
                "Client left room"
            );
        }
        Err(e) => {
            tracing::warn!("Failed to disconnect participant: {}", e);
        }
    }
}
