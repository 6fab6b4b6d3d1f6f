use serde::{Deserialize, Serialize};

/// Commands sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    StartRace {
        room_code: String,
    },
    UpdateProgress {
        room_code: String,
        typed_text: String,
    },
    ResetRace {
        room_code: String,
    },
}

/// Events sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomCreated {
        room_code: String,
        player_number: usize,
        players: Vec<ParticipantInfo>,
    },
    PlayerJoined {
        players: Vec<ParticipantInfo>,
        player_number: usize,
        creator: String,
    },
    RaceStarted {
        text_to_type: String,
        players: Vec<ParticipantInfo>,
    },
    ProgressUpdate {
        players: Vec<ParticipantInfo>,
    },
    PlayerFinished {
        player_id: String,
        stats: ParticipantInfo,
    },
    RaceFinished {
        winner: String,
        players: Vec<ParticipantInfo>,
    },
    RaceReset {
        players: Vec<ParticipantInfo>,
    },
    PlayerLeft {
        players: Vec<ParticipantInfo>,
    },
    Error {
        message: String,
    },
}

/// Per-participant state as broadcast to room members. Metrics are
/// always the server-recomputed values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub progress: f64,
    pub wpm: u32,
    pub accuracy: u32,
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_create_room() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"create-room","playerName":"Alice"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom { player_name } if player_name == "Alice"));
    }

    #[test]
    fn test_decode_update_progress() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"update-progress","roomCode":"ABC123","typedText":"the quick"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::UpdateProgress {
                room_code,
                typed_text,
            } => {
                assert_eq!(room_code, "ABC123");
                assert_eq!(typed_text, "the quick");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_command_fails() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"self-destruct"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_error_event() {
        let json = serde_json::to_string(&ServerMessage::Error {
            message: "Room is full".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"error","message":"Room is full"}"#);
    }

    #[test]
    fn test_encode_race_started_event() {
        let json = serde_json::to_string(&ServerMessage::RaceStarted {
            text_to_type: "cat".to_string(),
            players: vec![],
        })
        .unwrap();
        assert!(json.contains(r#""type":"race-started""#));
        assert!(json.contains(r#""textToType":"cat""#));
    }
}
