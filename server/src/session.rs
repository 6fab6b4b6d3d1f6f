use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::messages::{ClientMessage, ServerMessage};
use crate::room::{self, RoomRegistry};

/// Runs one connection: assigns it an identity, forwards outbound
/// events, dispatches inbound commands, and cleans up on disconnect.
pub async fn start(ws: WebSocket, registry: RoomRegistry) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let participant_id = room::generate_participant_id();
    log::info!("Connection established: {}", participant_id);

    // Forward server events to the socket.
    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(encoded) => {
                    if ws_tx.send(Message::text(encoded)).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::error!("Failed to encode server event: {}", e),
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("websocket receive error: {}", e);
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        let Ok(text) = msg.to_str() else {
            // Not a text message, ignoring
            continue;
        };
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(command) => dispatch(&registry, &participant_id, &tx, command).await,
            Err(e) => {
                // Unrecognized commands are dropped, with a diagnostic
                // for the sender.
                log::warn!("Undecodable command from {}: {}", participant_id, e);
                let _ = tx.send(ServerMessage::Error {
                    message: "Unrecognized command".to_string(),
                });
            }
        }
    }

    // Departure is a state transition, not an error.
    registry.remove_participant(&participant_id).await;
    forward_task.abort();
    log::info!("Connection closed: {}", participant_id);
}

async fn dispatch(
    registry: &RoomRegistry,
    participant_id: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    command: ClientMessage,
) {
    let result: anyhow::Result<()> = match command {
        ClientMessage::CreateRoom { player_name } => {
            match registry
                .create_room(participant_id.to_string(), player_name, tx.clone())
                .await
            {
                Ok((room_code, players)) => {
                    let _ = tx.send(ServerMessage::RoomCreated {
                        room_code,
                        player_number: 1,
                        players,
                    });
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => registry
            .join_room(&room_code, participant_id.to_string(), player_name, tx.clone())
            .await
            .map_err(Into::into),

        ClientMessage::StartRace { room_code } => registry
            .start_race(&room_code, participant_id)
            .await
            .map_err(Into::into),

        ClientMessage::UpdateProgress {
            room_code,
            typed_text,
        } => registry
            .apply_typed_snapshot(&room_code, participant_id, typed_text)
            .await
            .map_err(Into::into),

        ClientMessage::ResetRace { room_code } => registry
            .reset_race(&room_code, participant_id)
            .await
            .map_err(Into::into),
    };

    // Rejected commands produce an error event for the sender only;
    // the connection stays up and room state is untouched.
    if let Err(error) = result {
        log::warn!(
            "Command from {} rejected: {}",
            participant_id,
            error.to_string()
        );
        let _ = tx.send(ServerMessage::Error {
            message: error.to_string(),
        });
    }
}
